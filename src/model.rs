//! Virus particles and their stochastic decisions.

use crate::utils::check_prob;
use anyhow::{Context, Result};
use rand::Rng;
use std::collections::BTreeMap;

/// Outcome of a single reproduction decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Offspring<V> {
    Reproduced(V),
    NoOffspring,
}

impl<V> Offspring<V> {
    pub fn into_child(self) -> Option<V> {
        match self {
            Offspring::Reproduced(child) => Some(child),
            Offspring::NoOffspring => None,
        }
    }
}

/// Behaviour shared by every kind of virus particle.
pub trait Particle {
    fn max_birth_prob(&self) -> f64;

    fn clear_prob(&self) -> f64;

    /// Decide whether the particle is cleared from the host at this step.
    fn does_clear<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.random::<f64>() <= self.clear_prob()
    }
}

/// Virus particle without any drug resistance.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleVirus {
    max_birth_prob: f64,
    clear_prob: f64,
}

impl SimpleVirus {
    pub fn new(max_birth_prob: f64, clear_prob: f64) -> Result<Self> {
        check_prob(max_birth_prob).context("invalid maximum birth probability")?;
        check_prob(clear_prob).context("invalid clearance probability")?;
        Ok(Self {
            max_birth_prob,
            clear_prob,
        })
    }

    /// Decide whether the particle reproduces at the given population density.
    ///
    /// The density is not clamped: above 1 the reproduction probability is
    /// negative and the particle never reproduces.
    pub fn reproduce<R: Rng + ?Sized>(&self, pop_density: f64, rng: &mut R) -> Offspring<Self> {
        if self.birth_succeeds(pop_density, rng) {
            Offspring::Reproduced(self.clone())
        } else {
            Offspring::NoOffspring
        }
    }

    fn birth_succeeds<R: Rng + ?Sized>(&self, pop_density: f64, rng: &mut R) -> bool {
        let rep_prob = self.max_birth_prob * (1.0 - pop_density);
        rng.random::<f64>() <= rep_prob
    }
}

impl Particle for SimpleVirus {
    fn max_birth_prob(&self) -> f64 {
        self.max_birth_prob
    }

    fn clear_prob(&self) -> f64 {
        self.clear_prob
    }
}

/// Virus particle carrying a resistance trait for each drug it knows about.
///
/// Reproduction is blocked by any active drug the particle is not resistant
/// to. Offspring inherit every trait, each flipped independently with
/// probability `mut_prob`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResistantVirus {
    base: SimpleVirus,
    resistances: BTreeMap<String, bool>,
    mut_prob: f64,
}

impl ResistantVirus {
    pub fn new(
        max_birth_prob: f64,
        clear_prob: f64,
        resistances: BTreeMap<String, bool>,
        mut_prob: f64,
    ) -> Result<Self> {
        let base = SimpleVirus::new(max_birth_prob, clear_prob)?;
        check_prob(mut_prob).context("invalid mutation probability")?;
        Ok(Self {
            base,
            resistances,
            mut_prob,
        })
    }

    pub fn resistances(&self) -> &BTreeMap<String, bool> {
        &self.resistances
    }

    pub fn mut_prob(&self) -> f64 {
        self.mut_prob
    }

    /// Resistance to `drug`, or `None` if the drug is not in the trait map.
    pub fn is_resistant_to(&self, drug: &str) -> Option<bool> {
        self.resistances.get(drug).copied()
    }

    /// Whether the particle is resistant to every drug in `drugs`.
    ///
    /// Drugs missing from the trait map count as not resistant. An empty
    /// list is trivially satisfied.
    pub fn is_resistant_to_all<I, S>(&self, drugs: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        drugs
            .into_iter()
            .all(|drug| self.is_resistant_to(drug.as_ref()) == Some(true))
    }

    /// Decide whether the particle reproduces while `active_drugs` act on it.
    pub fn reproduce<R, I, S>(
        &self,
        pop_density: f64,
        active_drugs: I,
        rng: &mut R,
    ) -> Offspring<Self>
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // A single effective drug suppresses replication entirely.
        if !self.is_resistant_to_all(active_drugs) {
            return Offspring::NoOffspring;
        }

        if !self.base.birth_succeeds(pop_density, rng) {
            return Offspring::NoOffspring;
        }

        let resistances = self
            .resistances
            .iter()
            .map(|(drug, &resistant)| {
                let flip = rng.random::<f64>() <= self.mut_prob;
                (drug.clone(), resistant != flip)
            })
            .collect();

        Offspring::Reproduced(Self {
            base: self.base.clone(),
            resistances,
            mut_prob: self.mut_prob,
        })
    }
}

impl Particle for ResistantVirus {
    fn max_birth_prob(&self) -> f64 {
        self.base.max_birth_prob()
    }

    fn clear_prob(&self) -> f64 {
        self.base.clear_prob()
    }
}

/// Deterministic generators for tests.
#[cfg(test)]
pub(crate) mod test_rng {
    use rand::RngCore;

    /// Returns the same word forever.
    ///
    /// `FixedRng::LOW` draws 0.0 and `FixedRng::HIGH` draws the largest
    /// `f64` below 1.0.
    pub struct FixedRng(pub u64);

    impl FixedRng {
        pub const LOW: Self = Self(0);
        pub const HIGH: Self = Self(u64::MAX);
    }

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.0 as u32
        }

        fn next_u64(&mut self) -> u64 {
            self.0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            for (byte, src) in dst.iter_mut().zip(self.0.to_le_bytes().iter().cycle()) {
                *byte = *src;
            }
        }
    }
}
