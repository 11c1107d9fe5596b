//! Stochastic simulation of within-host viral population dynamics.
//!
//! The core is made of the virus particles in [`model`] and the hosts in
//! [`patient`] that advance a population one time step at a time. The
//! remaining modules run many trials, store their population series and
//! average them.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod manager;
pub mod model;
pub mod patient;
pub mod stats;
pub mod types;

mod utils;
