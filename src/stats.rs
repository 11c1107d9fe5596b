use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford's algorithm).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn n_vals(&self) -> usize {
        self.n_vals
    }

    pub fn mean(&self) -> f64 {
        if self.n_vals == 0 {
            return f64::NAN;
        }
        self.mean
    }

    /// Sample variance, NaN with fewer than two values.
    pub fn var(&self) -> f64 {
        if self.n_vals < 2 {
            return f64::NAN;
        }
        self.diff_2_sum / (self.n_vals - 1) as f64
    }

    pub fn report(&self) -> AccumulatorReport {
        let std_dev = self.var().sqrt();
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: self.mean(),
            std_dev,
            sem: std_dev / (self.n_vals as f64).sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_two_pass_statistics() {
        let vals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut acc = Accumulator::new();
        vals.iter().for_each(|&val| acc.add(val));

        let mean = vals.iter().sum::<f64>() / vals.len() as f64;
        let var = vals.iter().map(|val| (val - mean).powi(2)).sum::<f64>() / 7.0;

        let report = acc.report();
        assert_eq!(report.n_vals, 8);
        assert!((report.mean - 5.0).abs() < 1e-12);
        assert!((report.std_dev - var.sqrt()).abs() < 1e-12);
        assert!((report.sem - var.sqrt() / 8.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn undefined_statistics_are_nan() {
        let mut acc = Accumulator::new();
        assert!(acc.report().mean.is_nan());
        acc.add(3.0);
        let report = acc.report();
        assert_eq!(report.mean, 3.0);
        assert!(report.std_dev.is_nan());
    }
}
