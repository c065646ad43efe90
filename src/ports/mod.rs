//! Port traits for the simulator's collaborators.

pub mod config_port;
pub mod data_port;
pub mod ledger_port;
pub mod model_port;
pub mod report_port;
