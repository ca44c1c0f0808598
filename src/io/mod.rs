//! File I/O for simulation configurations.

pub mod config;

pub use config::{from_config_string, read_config, to_config_string, write_config};
