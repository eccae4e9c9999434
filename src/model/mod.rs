pub mod config;
pub mod performance;
