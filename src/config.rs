//! Run configuration.
//!
//! Every field defaults to the IEEE 33-bus demo values, so a missing file or
//! a partial file both work. Relative paths are resolved against the directory
//! that holds the configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathConfig,
    pub network: NetworkOptions,
    pub solver: PowerFlowConfig,
    pub limits: OperatingLimits,
    pub plots: PlotConfig,
}

/// Input files, database and output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub bus_csv: PathBuf,
    pub line_csv: PathBuf,
    pub load_csv: PathBuf,
    pub profile_csv: PathBuf,
    pub schema_sql: PathBuf,
    pub queries_sql: PathBuf,
    pub database: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            bus_csv: "data/ieee33_bus.csv".into(),
            line_csv: "data/ieee33_line.csv".into(),
            load_csv: "data/ieee33_load.csv".into(),
            profile_csv: "data/load_profile_hourly.csv".into(),
            schema_sql: "sql/01_create_tables.sql".into(),
            queries_sql: "sql/02_analysis_queries.sql".into(),
            database: "outputs/network.db".into(),
            output_dir: "outputs".into(),
        }
    }
}

impl PathConfig {
    fn resolve(&mut self, base: &Path) {
        for p in [
            &mut self.bus_csv,
            &mut self.line_csv,
            &mut self.load_csv,
            &mut self.profile_csv,
            &mut self.schema_sql,
            &mut self.queries_sql,
            &mut self.database,
            &mut self.output_dir,
        ] {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }
}

/// How relational rows are turned into a solver network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOptions {
    /// System power base (MVA).
    pub sn_mva: f64,
    /// Nominal frequency, used for line charging.
    pub f_hz: f64,
    /// External id of the bus connected to the external grid.
    pub slack_bus: i64,
    /// Voltage setpoint of the external grid (p.u.).
    pub slack_vm_pu: f64,
    pub slack_va_degree: f64,
    /// Assumed line length; the tabulated R and X become per-km values.
    pub line_length_km: f64,
    /// Line charging capacitance applied to every line.
    pub c_nf_per_km: f64,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            sn_mva: 10.0,
            f_hz: 50.0,
            slack_bus: 1,
            slack_vm_pu: 1.02,
            slack_va_degree: 0.0,
            line_length_km: 1.0,
            c_nf_per_km: 0.0,
        }
    }
}

/// Newton-Raphson parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerFlowConfig {
    pub max_iteration: usize,
    /// Largest accepted power mismatch at any bus (MVA).
    pub tolerance_mva: f64,
}

impl Default for PowerFlowConfig {
    fn default() -> Self {
        Self {
            max_iteration: 30,
            tolerance_mva: 1e-6,
        }
    }
}

/// Voltage band and thermal limit used by the final check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatingLimits {
    pub v_min_pu: f64,
    pub v_max_pu: f64,
    pub loading_limit_percent: f64,
}

impl Default for OperatingLimits {
    fn default() -> Self {
        Self {
            v_min_pu: 0.95,
            v_max_pu: 1.05,
            loading_limit_percent: 100.0,
        }
    }
}

/// A bus whose voltage is traced across the load profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedBus {
    pub label: String,
    pub bus: i64,
}

/// A hand-placed node position for the fixed topology drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusCoordinate {
    pub bus: i64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub enabled: bool,
    /// Force-directed layout steps.
    pub layout_iterations: usize,
    pub selected_buses: Vec<SelectedBus>,
    pub coordinates: Vec<BusCoordinate>,
}

impl Default for PlotConfig {
    fn default() -> Self {
        let selected_buses = [("Source", 1), ("Middle1", 26), ("Middle2", 33), ("Far-end", 18)]
            .into_iter()
            .map(|(label, bus)| SelectedBus {
                label: label.to_owned(),
                bus,
            })
            .collect();
        Self {
            enabled: true,
            layout_iterations: 300,
            selected_buses,
            coordinates: crate::viz::ieee33_coordinates(),
        }
    }
}

impl Config {
    /// Reads a TOML file and resolves its relative paths against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut cfg: Config = toml::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        cfg.paths.resolve(base);
        debug!(config = %path.display(), "loaded configuration");
        Ok(cfg)
    }

    /// Loads `path` when given, otherwise the defaults rooted at the working directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.paths.output_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_ieee33_demo() {
        let cfg = Config::default();
        assert_eq!(cfg.network.slack_bus, 1);
        assert_eq!(cfg.network.slack_vm_pu, 1.02);
        assert_eq!(cfg.solver.max_iteration, 30);
        assert_eq!(cfg.limits.v_min_pu, 0.95);
        assert_eq!(cfg.limits.loading_limit_percent, 100.0);
        let buses: Vec<_> = cfg.plots.selected_buses.iter().map(|s| s.bus).collect();
        assert_eq!(buses, vec![1, 26, 33, 18]);
        assert_eq!(cfg.plots.coordinates.len(), 33);
    }

    #[test]
    fn shipped_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("feeder.toml");
        let cfg = Config::from_file(&path).unwrap();
        let mut expected = Config::default();
        expected.paths.resolve(path.parent().unwrap());
        assert_eq!(cfg, expected);
    }

    #[test]
    fn partial_file_keeps_defaults_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("feeder.toml");
        fs::write(
            &file,
            "[network]\nslack_vm_pu = 1.0\n\n[limits]\nv_min_pu = 0.9\n\n[paths]\noutput_dir = \"out\"\n",
        )
        .unwrap();

        let cfg = Config::from_file(&file).unwrap();
        assert_eq!(cfg.network.slack_vm_pu, 1.0);
        assert_eq!(cfg.network.sn_mva, 10.0);
        assert_eq!(cfg.limits.v_min_pu, 0.9);
        assert_eq!(cfg.limits.v_max_pu, 1.05);
        assert_eq!(cfg.paths.output_dir, dir.path().join("out"));
        assert_eq!(cfg.paths.bus_csv, dir.path().join("data/ieee33_bus.csv"));
    }
}
