pub mod boundary;
pub mod config;
pub mod energy;
pub mod error;
pub mod fields;
pub mod materials;
pub mod mesh;
pub mod momentum;
pub mod pressure;
pub mod recorder;
pub mod simulation;
