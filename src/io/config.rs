//! JSON simulation configuration files.
//!
//! A configuration file is a serialized [`SimulationConfig`]. The fields
//! `poisson`, `check_finite` and the per-segment `pressure` may be omitted.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};

use crate::sim::config::SimulationConfig;

/// Writes a simulation configuration to a JSON file.
pub fn write_config(path: &Path, config: &SimulationConfig) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, config)
        .with_context(|| format!("Failed to serialize configuration to: {}", path.display()))?;

    Ok(())
}

/// Reads a simulation configuration from a JSON file.
///
/// The result is not validated; [`crate::Simulation::new`] does that.
pub fn read_config(path: &Path) -> Result<SimulationConfig> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let config: SimulationConfig = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize configuration from: {}", path.display()))?;

    Ok(config)
}

pub fn to_config_string(config: &SimulationConfig) -> Result<String> {
    serde_json::to_string_pretty(config).context("Failed to serialize configuration to string")
}

pub fn from_config_string(json: &str) -> Result<SimulationConfig> {
    serde_json::from_str(json).context("Failed to deserialize configuration from string")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::config::{BoundarySegment, PressureScheme, Side};
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read_config() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("duct.json");

        let mut original = SimulationConfig::new();
        original.nx = 24;
        original.poisson.scheme = PressureScheme::Sor { omega: 1.7 };
        original
            .outlets
            .push(BoundarySegment::new(Side::Top, 0.08, 0.1).with_pressure(-2.5));

        write_config(&path, &original)?;
        let loaded = read_config(&path)?;

        assert_eq!(loaded, original);
        Ok(())
    }

    #[test]
    fn test_optional_fields_take_defaults() -> Result<()> {
        let mut value = serde_json::to_value(SimulationConfig::new())?;
        let obj = value.as_object_mut().unwrap();
        obj.remove("poisson");
        obj.remove("check_finite");
        obj["inlets"][0].as_object_mut().unwrap().remove("pressure");

        let loaded = from_config_string(&value.to_string())?;
        assert_eq!(loaded.poisson.max_iterations, 5000);
        assert_eq!(loaded.poisson.tolerance, 1e-4);
        assert_eq!(loaded.poisson.scheme, PressureScheme::Jacobi);
        assert!(loaded.check_finite);
        assert_eq!(loaded.inlets[0].pressure, None);
        Ok(())
    }

    #[test]
    fn test_enum_spelling() -> Result<()> {
        let mut config = SimulationConfig::new();
        config.poisson.scheme = PressureScheme::ParallelJacobi;
        let json = to_config_string(&config)?;
        assert!(json.contains("\"left\""));
        assert!(json.contains("\"parallel_jacobi\""));
        Ok(())
    }

    #[test]
    fn test_read_missing_file_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = read_config(&path).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let err = from_config_string("{\"lx\": 0.1").unwrap_err();
        assert!(err.to_string().contains("Failed to deserialize"));
    }
}
