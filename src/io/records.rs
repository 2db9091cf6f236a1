use serde::{Deserialize, Serialize};

/// Row of the `bus` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusRecord {
    pub bus_id: i64,
    pub voltage_kv: f64,
}

/// Row of the `line` table. Impedances are in ohm, rating in MVA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRecord {
    pub line_id: i64,
    pub from_bus: i64,
    pub to_bus: i64,
    pub r_ohm: f64,
    pub x_ohm: f64,
    pub rate_mva: f64,
}

/// Row of the `load` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRecord {
    pub bus_id: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Row of the `load_profile` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub hour: i64,
    pub multiplier: f64,
}

/// Active demand per bus; buses without a load record carry zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusLoad {
    pub bus_id: i64,
    pub p_mw: f64,
}

/// The three network tables as read back from the database.
#[derive(Debug, Clone, Default)]
pub struct FeederTables {
    pub buses: Vec<BusRecord>,
    pub lines: Vec<LineRecord>,
    pub loads: Vec<LoadRecord>,
}
