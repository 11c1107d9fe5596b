//! Hosts holding a virus population and advancing it one time step at a time.

use crate::model::{Offspring, Particle, ResistantVirus, SimpleVirus};
use anyhow::{Result, bail};
use rand::Rng;
use std::{collections::BTreeSet, mem};

/// Common interface of every host, used by the trial driver.
pub trait Host {
    /// Advance the population by one time step and return its new size.
    fn update<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize;

    fn total_pop(&self) -> usize;

    fn max_pop(&self) -> usize;

    /// Number of particles resistant to every drug in `drugs`.
    fn resist_pop(&self, drugs: &[String]) -> usize;
}

/// Patient without drug treatment.
///
/// `max_pop` is only used to compute the population density; the population
/// itself may exceed it.
#[derive(Debug, Clone)]
pub struct Patient<V> {
    viruses: Vec<V>,
    max_pop: usize,
}

impl<V: Particle> Patient<V> {
    pub fn new(viruses: Vec<V>, max_pop: usize) -> Result<Self> {
        if max_pop == 0 {
            bail!("maximum population must be positive");
        }
        Ok(Self { viruses, max_pop })
    }

    pub fn viruses(&self) -> &[V] {
        &self.viruses
    }

    pub fn max_pop(&self) -> usize {
        self.max_pop
    }

    pub fn total_pop(&self) -> usize {
        self.viruses.len()
    }

    /// Perform one time step using `reproduce` as the reproduction decision.
    ///
    /// `reproduce` receives each survivor with the post-clearance density.
    /// Offspring are staged and only join the population after every
    /// survivor has been given its chance.
    pub fn step<R, F>(&mut self, rng: &mut R, mut reproduce: F) -> usize
    where
        R: Rng + ?Sized,
        F: FnMut(&V, f64, &mut R) -> Offspring<V>,
    {
        // Clearance is decided on the pre-step population as a whole.
        let survivors: Vec<V> = mem::take(&mut self.viruses)
            .into_iter()
            .filter(|virus| !virus.does_clear(rng))
            .collect();

        let pop_density = survivors.len() as f64 / self.max_pop as f64;

        let mut offspring = Vec::new();
        for virus in &survivors {
            if let Offspring::Reproduced(child) = reproduce(virus, pop_density, rng) {
                offspring.push(child);
            }
        }

        self.viruses = survivors;
        self.viruses.append(&mut offspring);

        self.viruses.len()
    }
}

impl Patient<SimpleVirus> {
    pub fn update<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        self.step(rng, |virus, pop_density, rng| virus.reproduce(pop_density, rng))
    }
}

impl Host for Patient<SimpleVirus> {
    fn update<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        Patient::<SimpleVirus>::update(self, rng)
    }

    fn total_pop(&self) -> usize {
        Patient::<SimpleVirus>::total_pop(self)
    }

    fn max_pop(&self) -> usize {
        Patient::<SimpleVirus>::max_pop(self)
    }

    fn resist_pop(&self, _drugs: &[String]) -> usize {
        0
    }
}

/// Patient taking drugs, with a population that can acquire resistance.
#[derive(Debug, Clone)]
pub struct TreatedPatient {
    patient: Patient<ResistantVirus>,
    prescriptions: BTreeSet<String>,
}

impl TreatedPatient {
    pub fn new(viruses: Vec<ResistantVirus>, max_pop: usize) -> Result<Self> {
        Ok(Self {
            patient: Patient::new(viruses, max_pop)?,
            prescriptions: BTreeSet::new(),
        })
    }

    /// Administer `drug` from now on. Prescribing the same drug twice has no effect.
    pub fn add_prescription(&mut self, drug: &str) {
        if self.prescriptions.insert(drug.to_string()) {
            log::debug!("prescribed {drug}");
        }
    }

    pub fn prescriptions(&self) -> &BTreeSet<String> {
        &self.prescriptions
    }

    pub fn viruses(&self) -> &[ResistantVirus] {
        self.patient.viruses()
    }

    pub fn max_pop(&self) -> usize {
        self.patient.max_pop()
    }

    pub fn total_pop(&self) -> usize {
        self.patient.total_pop()
    }

    /// Count the particles resistant to every drug in `drugs`.
    ///
    /// An empty list counts nothing, not the whole population.
    pub fn resist_pop<I, S>(&self, drugs: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let drugs: Vec<S> = drugs.into_iter().collect();
        if drugs.is_empty() {
            return 0;
        }
        self.viruses()
            .iter()
            .filter(|virus| virus.is_resistant_to_all(&drugs))
            .count()
    }

    pub fn update<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let prescriptions = &self.prescriptions;
        self.patient.step(rng, |virus, pop_density, rng| {
            virus.reproduce(pop_density, prescriptions, rng)
        })
    }
}

impl Host for TreatedPatient {
    fn update<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        TreatedPatient::update(self, rng)
    }

    fn total_pop(&self) -> usize {
        TreatedPatient::total_pop(self)
    }

    fn max_pop(&self) -> usize {
        TreatedPatient::max_pop(self)
    }

    fn resist_pop(&self, drugs: &[String]) -> usize {
        TreatedPatient::resist_pop(self, drugs)
    }
}
