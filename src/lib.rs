//! signaltrader: day-by-day, model-driven trading simulator.
//!
//! Hexagonal architecture: the simulation core lives in [`domain`], the
//! collaborator traits it consumes in [`ports`], and file-backed
//! implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
