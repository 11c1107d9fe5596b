use crate::config::Config;
use crate::model::{ResistantVirus, SimpleVirus};
use crate::patient::{Host, Patient, TreatedPatient};
use crate::types::{Run, Trial};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rmp_serde::{decode, encode};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Trial driver.
///
/// Holds the configuration and the base seed of a run. Trial `i` draws from
/// stream `i` of a ChaCha generator seeded with the base seed, so trials are
/// independent and reproducible in any order.
pub struct Engine {
    cfg: Config,
    seed: u64,
}

impl Engine {
    pub fn new(cfg: Config, seed: u64) -> Self {
        Self { cfg, seed }
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Perform all trials and save the resulting run to a binary file.
    pub fn perform_simulation<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let run = self.perform_trials().context("failed to perform trials")?;
        save_run(&run, file)
    }

    /// Perform all trials of the run.
    pub fn perform_trials(&self) -> Result<Run> {
        let n_trials = self.cfg.output.n_trials;

        #[cfg(feature = "parallel")]
        let trials = (0..n_trials)
            .into_par_iter()
            .map(|i_trial| self.perform_trial(i_trial))
            .collect::<Result<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let trials = {
            let mut trials = Vec::with_capacity(n_trials);
            for i_trial in 0..n_trials {
                trials.push(self.perform_trial(i_trial)?);

                let progress = 100.0 * (i_trial + 1) as f64 / n_trials as f64;
                log::info!("completed {progress:06.2}%");
            }
            trials
        };

        Ok(Run {
            seed: self.seed,
            trials,
        })
    }

    /// Perform a single trial from a fresh initial cohort.
    pub fn perform_trial(&self, i_trial: usize) -> Result<Trial> {
        let mut rng = ChaCha12Rng::seed_from_u64(self.seed);
        rng.set_stream(i_trial as u64);

        let virus_cfg = &self.cfg.virus;
        let patient_cfg = &self.cfg.patient;

        let trial = match &self.cfg.resistance {
            None => {
                let virus = SimpleVirus::new(virus_cfg.max_birth_prob, virus_cfg.clear_prob)
                    .context("failed to construct virus")?;
                let mut patient =
                    Patient::new(vec![virus; patient_cfg.n_viruses], patient_cfg.max_pop)
                        .context("failed to construct patient")?;

                let total_pop = self.record(&mut patient, &mut rng, |_, _| {}).0;
                Trial {
                    total_pop,
                    resist_pop: None,
                }
            }
            Some(res_cfg) => {
                let virus = ResistantVirus::new(
                    virus_cfg.max_birth_prob,
                    virus_cfg.clear_prob,
                    res_cfg.traits.clone(),
                    res_cfg.mut_prob,
                )
                .context("failed to construct virus")?;
                let mut patient =
                    TreatedPatient::new(vec![virus; patient_cfg.n_viruses], patient_cfg.max_pop)
                        .context("failed to construct patient")?;

                let (total_pop, resist_pop) =
                    self.record(&mut patient, &mut rng, |patient, step| {
                        // Doses act on the reproduction of the step they are scheduled at.
                        for dose in res_cfg.doses.iter().filter(|dose| dose.step == step) {
                            patient.add_prescription(&dose.drug);
                        }
                    });
                Trial {
                    total_pop,
                    resist_pop: Some(resist_pop),
                }
            }
        };

        log::debug!(
            "trial {i_trial} ended with {} viruses",
            trial.total_pop.last().copied().unwrap_or_default()
        );

        Ok(trial)
    }

    /// Run every step on `host`, calling `treat` before each update.
    ///
    /// Returns the total and resistant population series.
    fn record<H, F>(
        &self,
        host: &mut H,
        rng: &mut ChaCha12Rng,
        mut treat: F,
    ) -> (Vec<usize>, Vec<usize>)
    where
        H: Host,
        F: FnMut(&mut H, usize),
    {
        let n_steps = self.cfg.output.n_steps;
        let tracked = self
            .cfg
            .resistance
            .as_ref()
            .map(|res_cfg| res_cfg.tracked_drugs())
            .unwrap_or_default();

        let mut total_pop = Vec::with_capacity(n_steps);
        let mut resist_pop = Vec::with_capacity(n_steps);
        for step in 0..n_steps {
            treat(host, step);
            total_pop.push(host.update(rng));
            resist_pop.push(host.resist_pop(&tracked));
        }

        (total_pop, resist_pop)
    }
}

/// Save a run to a binary file.
pub fn save_run<P: AsRef<Path>>(run: &Run, file: P) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, run).context("failed to serialize run")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// Load a previously saved run.
pub fn load_run<P: AsRef<Path>>(file: P) -> Result<Run> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    let run = decode::from_read(&mut reader).context("failed to deserialize run")?;
    Ok(run)
}
