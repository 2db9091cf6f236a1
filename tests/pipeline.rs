use std::path::{Path, PathBuf};

use feederpower::prelude::*;

fn config_in(dir: &Path) -> Config {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let mut cfg = Config::default();
    let p = &mut cfg.paths;
    p.bus_csv = root.join("data/ieee33_bus.csv");
    p.line_csv = root.join("data/ieee33_line.csv");
    p.load_csv = root.join("data/ieee33_load.csv");
    p.profile_csv = root.join("data/load_profile_hourly.csv");
    p.schema_sql = root.join("sql/01_create_tables.sql");
    p.queries_sql = root.join("sql/02_analysis_queries.sql");
    p.database = dir.join("db/network.db");
    p.output_dir = dir.join("outputs");
    cfg
}

#[test]
fn full_run_writes_every_output() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());
    let mut pipeline = Pipeline::open(cfg.clone()).unwrap();
    let mut out = Vec::new();
    let outcome = pipeline.run_all(true, &mut out).unwrap();

    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("SQL RESULTS"));
    assert!(!report.contains("Error:"));

    assert!(outcome.base.converged);
    assert_eq!(outcome.res_bus.len(), 33);
    assert_eq!(outcome.res_line.len(), 32);
    assert_eq!(outcome.timeseries.hours.len(), 24);
    assert!(outcome.timeseries.hours.iter().all(|h| h.converged));
    assert!((outcome.res_bus[0].vm_pu - 1.02).abs() < 1e-9);
    assert!(outcome.violations.v_min_pu < outcome.violations.v_max_pu);

    for name in [
        "network_topology.svg",
        "network_topology_fixed.svg",
        "load_per_bus.svg",
        "load_histogram.svg",
        "voltage_profile_from_sql.svg",
        "line_loading_from_sql.svg",
        "voltage_timeseries.svg",
        "max_line_loading_timeseries.svg",
        "voltage_timeseries_selected_buses.svg",
        "res_bus.csv",
        "res_line.csv",
        "timeseries_summary.json",
    ] {
        assert!(cfg.output_file(name).is_file(), "{name} missing");
    }

    let res_bus = std::fs::read_to_string(cfg.output_file("res_bus.csv")).unwrap();
    assert!(res_bus.starts_with("bus_id,vm_pu,va_degree,p_mw,q_mvar"));
    assert_eq!(res_bus.lines().count(), 34);
}

#[test]
fn reloading_appends_unless_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path());
    cfg.plots.enabled = false;
    let mut pipeline = Pipeline::open(cfg).unwrap();

    pipeline.load(false).unwrap();
    assert_eq!(pipeline.db().row_count(Table::Load).unwrap(), 32);
    // duplicate primary keys in bus make a plain reload fail
    assert!(pipeline.load(false).is_err());

    pipeline.load(true).unwrap();
    assert_eq!(pipeline.db().row_count(Table::Bus).unwrap(), 33);
    assert_eq!(pipeline.db().row_count(Table::Load).unwrap(), 32);
    assert_eq!(pipeline.db().row_count(Table::LoadProfile).unwrap(), 24);
}

#[test]
fn fresh_run_reopens_populated_database() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path());
    cfg.plots.enabled = false;
    {
        let mut first = Pipeline::open(cfg.clone()).unwrap();
        first.load(false).unwrap();
    }
    assert!(cfg.paths.database.is_file());

    let mut second = Pipeline::open(cfg.clone()).unwrap();
    assert_eq!(second.db().row_count(Table::Bus).unwrap(), 33);
    let mut out = Vec::new();
    let outcome = second.run_all(true, &mut out).unwrap();
    assert!(outcome.base.converged);
    for (table, rows) in [
        (Table::Bus, 33),
        (Table::Line, 32),
        (Table::Load, 32),
        (Table::LoadProfile, 24),
    ] {
        assert_eq!(second.db().row_count(table).unwrap(), rows, "{table}");
    }
}

#[test]
fn solve_without_plots_checks_limits() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path());
    cfg.plots.enabled = false;
    cfg.limits.v_min_pu = 0.5;
    cfg.limits.loading_limit_percent = 1000.0;
    let mut pipeline = Pipeline::open(cfg.clone()).unwrap();
    pipeline.load(false).unwrap();
    let outcome = pipeline.solve().unwrap();
    assert!(!outcome.violations.voltage_violation);
    assert!(!outcome.violations.thermal_violation);
    assert!(!cfg.output_file("voltage_timeseries.svg").exists());
    assert!(cfg.output_file("timeseries_summary.json").is_file());
}
