use crate::utils::{check_name, check_num, check_prob};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

/// Virus particle parameters shared by the whole initial cohort.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirusConfig {
    /// Reproduction probability at zero population density.
    pub max_birth_prob: f64,
    /// Clearance probability per step.
    pub clear_prob: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientConfig {
    /// Number of particles in the initial cohort.
    pub n_viruses: usize,
    /// Capacity used to compute the population density.
    pub max_pop: usize,
}

/// Drug administered to the patient at a given step.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dose {
    pub step: usize,
    pub drug: String,
}

/// Drug resistance and treatment parameters.
///
/// When present, trials use resistant particles and a treated patient.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResistanceConfig {
    /// Per-trait probability that an offspring's resistance flips.
    pub mut_prob: f64,
    /// Initial resistance of every particle to each drug.
    pub traits: BTreeMap<String, bool>,
    /// Drugs defining the resistant population (all trait drugs by default).
    #[serde(default)]
    pub tracked: Option<Vec<String>>,
    /// Treatment schedule.
    #[serde(default)]
    pub doses: Vec<Dose>,
}

impl ResistanceConfig {
    /// Drugs a particle must resist to be counted as resistant.
    pub fn tracked_drugs(&self) -> Vec<String> {
        match &self.tracked {
            Some(tracked) => tracked.clone(),
            None => self.traits.keys().cloned().collect(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Number of independent trials per run.
    pub n_trials: usize,
    /// Number of time steps per trial.
    pub n_steps: usize,
    /// Base seed of the random streams (random when absent).
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub virus: VirusConfig,
    pub patient: PatientConfig,
    #[serde(default)]
    pub resistance: Option<ResistanceConfig>,
    pub output: OutputConfig,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_prob(self.virus.max_birth_prob).context("invalid maximum birth probability")?;
        check_prob(self.virus.clear_prob).context("invalid clearance probability")?;

        check_num(self.patient.n_viruses, 0..1_000_000)
            .context("invalid initial number of viruses")?;
        check_num(self.patient.max_pop, 1..10_000_000).context("invalid maximum population")?;

        check_num(self.output.n_trials, 1..100_000).context("invalid number of trials")?;
        check_num(self.output.n_steps, 1..100_000).context("invalid number of steps")?;

        if let Some(resistance) = &self.resistance {
            check_prob(resistance.mut_prob).context("invalid mutation probability")?;
            for drug in resistance.traits.keys() {
                check_name(drug).context("invalid trait drug")?;
            }
            for drug in resistance.tracked.iter().flatten() {
                check_name(drug).context("invalid tracked drug")?;
            }
            for (i_dose, dose) in resistance.doses.iter().enumerate() {
                check_name(&dose.drug)
                    .with_context(|| format!("invalid drug of dose {i_dose}"))?;
                check_num(dose.step, 0..self.output.n_steps)
                    .with_context(|| format!("invalid step of dose {i_dose}"))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREATED: &str = r#"
[virus]
max_birth_prob = 0.1
clear_prob = 0.05

[patient]
n_viruses = 100
max_pop = 1000

[resistance]
mut_prob = 0.005
traits = { oseltamivir = false, zanamivir = true }
doses = [ { step = 150, drug = "oseltamivir" } ]

[output]
n_trials = 10
n_steps = 300
seed = 7
"#;

    #[test]
    fn parses_treated_config() {
        let cfg = Config::from_toml(TREATED).unwrap();
        let resistance = cfg.resistance.as_ref().unwrap();
        assert_eq!(resistance.traits.len(), 2);
        assert_eq!(
            resistance.doses,
            vec![Dose {
                step: 150,
                drug: "oseltamivir".to_string()
            }]
        );
        assert_eq!(resistance.tracked_drugs(), vec!["oseltamivir", "zanamivir"]);
        assert_eq!(cfg.output.seed, Some(7));
    }

    #[test]
    fn resistance_section_is_optional() {
        let contents = r#"
[virus]
max_birth_prob = 0.1
clear_prob = 0.05

[patient]
n_viruses = 100
max_pop = 1000

[output]
n_trials = 10
n_steps = 300
"#;
        let cfg = Config::from_toml(contents).unwrap();
        assert!(cfg.resistance.is_none());
        assert!(cfg.output.seed.is_none());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let contents = TREATED.replace("max_pop = 1000", "max_pop = 0");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn invalid_probability_is_rejected() {
        let contents = TREATED.replace("clear_prob = 0.05", "clear_prob = 1.5");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn dose_after_last_step_is_rejected() {
        let contents = TREATED.replace("step = 150", "step = 300");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let contents = TREATED.replace("seed = 7", "seed = 7\nn_saves = 3");
        assert!(Config::from_toml(&contents).is_err());
    }
}
