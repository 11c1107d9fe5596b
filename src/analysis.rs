use crate::config::Config;
use crate::stats::Accumulator;
use crate::types::{Run, StepReport, Trial};
use anyhow::{Context, Result, bail};
use rmp_serde::encode;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Averages the population series of many trials step by step.
pub struct Analyzer {
    total_acc_vec: Vec<Accumulator>,
    resist_acc_vec: Option<Vec<Accumulator>>,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Self {
        let n_steps = cfg.output.n_steps;
        let mut total_acc_vec = Vec::new();
        total_acc_vec.resize_with(n_steps, Accumulator::new);
        let resist_acc_vec = cfg
            .resistance
            .as_ref()
            .map(|_| vec![Accumulator::new(); n_steps]);
        Self {
            total_acc_vec,
            resist_acc_vec,
        }
    }

    pub fn add_run(&mut self, run: &Run) -> Result<()> {
        for (i_trial, trial) in run.trials.iter().enumerate() {
            self.add_trial(trial)
                .with_context(|| format!("failed to add trial {i_trial}"))?;
        }
        Ok(())
    }

    pub fn add_trial(&mut self, trial: &Trial) -> Result<()> {
        let n_steps = self.total_acc_vec.len();
        if trial.total_pop.len() != n_steps {
            bail!(
                "trial must have {n_steps} steps, but has {}",
                trial.total_pop.len()
            );
        }

        let resist_pairs = match (&mut self.resist_acc_vec, &trial.resist_pop) {
            (None, None) => None,
            (Some(acc_vec), Some(resist_pop)) if resist_pop.len() == n_steps => {
                Some((acc_vec, resist_pop))
            }
            (Some(_), Some(resist_pop)) => bail!(
                "resistant series must have {n_steps} steps, but has {}",
                resist_pop.len()
            ),
            _ => bail!("trial does not match the configured model"),
        };

        for (acc, &val) in self.total_acc_vec.iter_mut().zip(&trial.total_pop) {
            acc.add(val as f64);
        }
        if let Some((acc_vec, resist_pop)) = resist_pairs {
            for (acc, &val) in acc_vec.iter_mut().zip(resist_pop) {
                acc.add(val as f64);
            }
        }

        Ok(())
    }

    pub fn n_trials(&self) -> usize {
        self.total_acc_vec.first().map_or(0, Accumulator::n_vals)
    }

    pub fn reports(&self) -> Vec<StepReport> {
        self.total_acc_vec
            .iter()
            .enumerate()
            .map(|(step, acc)| StepReport {
                step,
                total_pop: acc.report(),
                resist_pop: self
                    .resist_acc_vec
                    .as_ref()
                    .map(|acc_vec| acc_vec[step].report()),
            })
            .collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        encode::write(&mut writer, &self.reports()).context("failed to serialize reports")?;
        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(resistance: bool) -> Config {
        let mut contents = String::from(
            "[virus]\nmax_birth_prob = 0.1\nclear_prob = 0.05\n\
             [patient]\nn_viruses = 10\nmax_pop = 100\n\
             [output]\nn_trials = 2\nn_steps = 3\n",
        );
        if resistance {
            contents += "[resistance]\nmut_prob = 0.0\ntraits = { d = false }\n";
        }
        Config::from_toml(&contents).unwrap()
    }

    #[test]
    fn averages_each_step_across_trials() {
        let mut analyzer = Analyzer::new(&config(true));
        let run = Run {
            seed: 0,
            trials: vec![
                Trial {
                    total_pop: vec![10, 20, 30],
                    resist_pop: Some(vec![0, 1, 2]),
                },
                Trial {
                    total_pop: vec![30, 40, 50],
                    resist_pop: Some(vec![2, 3, 4]),
                },
            ],
        };
        analyzer.add_run(&run).unwrap();
        assert_eq!(analyzer.n_trials(), 2);

        let reports = analyzer.reports();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].total_pop.mean, 20.0);
        assert_eq!(reports[2].total_pop.mean, 40.0);
        assert_eq!(reports[1].resist_pop.unwrap().mean, 2.0);
    }

    #[test]
    fn rejects_series_of_wrong_length() {
        let mut analyzer = Analyzer::new(&config(false));
        let trial = Trial {
            total_pop: vec![1, 2],
            resist_pop: None,
        };
        assert!(analyzer.add_trial(&trial).is_err());
    }

    #[test]
    fn rejects_trial_from_other_model() {
        let mut analyzer = Analyzer::new(&config(false));
        let trial = Trial {
            total_pop: vec![1, 2, 3],
            resist_pop: Some(vec![0, 0, 0]),
        };
        assert!(analyzer.add_trial(&trial).is_err());
        assert_eq!(analyzer.n_trials(), 0);
    }
}
