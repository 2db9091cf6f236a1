//! Embedded IEEE 33-bus data and small hand-built feeders for tests.

use crate::basic::system::PFNetwork;
use crate::config::NetworkOptions;
use crate::io::records::{BusRecord, FeederTables, LineRecord, LoadRecord};

pub const SCHEMA_SQL: &str = include_str!("../sql/01_create_tables.sql");
pub const QUERIES_SQL: &str = include_str!("../sql/02_analysis_queries.sql");
pub const IEEE33_BUS_CSV: &str = include_str!("../data/ieee33_bus.csv");
pub const IEEE33_LINE_CSV: &str = include_str!("../data/ieee33_line.csv");
pub const IEEE33_LOAD_CSV: &str = include_str!("../data/ieee33_load.csv");
pub const PROFILE_CSV: &str = include_str!("../data/load_profile_hourly.csv");

fn parse<T: serde::de::DeserializeOwned>(text: &str) -> Vec<T> {
    csv::Reader::from_reader(text.as_bytes())
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .expect("embedded csv is well formed")
}

/// The IEEE 33-bus tables as they come back from the database.
pub fn ieee33_tables() -> FeederTables {
    FeederTables {
        buses: parse(IEEE33_BUS_CSV),
        lines: parse(IEEE33_LINE_CSV),
        loads: parse(IEEE33_LOAD_CSV),
    }
}

pub fn ieee33_network() -> PFNetwork {
    let t = ieee33_tables();
    PFNetwork::from_tables(&t.buses, &t.lines, &t.loads, &NetworkOptions::default())
        .expect("IEEE 33 tables are consistent")
}

/// Slack at bus 1 and buses 2..=5 in series over identical lines, one load at bus 5.
pub fn radial_five_bus(p_mw: f64, q_mvar: f64) -> PFNetwork {
    let buses: Vec<_> = (1..=5)
        .map(|bus_id| BusRecord {
            bus_id,
            voltage_kv: 12.66,
        })
        .collect();
    let lines: Vec<_> = (1..=4)
        .map(|i| LineRecord {
            line_id: i,
            from_bus: i,
            to_bus: i + 1,
            r_ohm: 0.3,
            x_ohm: 0.2,
            rate_mva: 4.0,
        })
        .collect();
    let loads = [LoadRecord {
        bus_id: 5,
        p_mw,
        q_mvar,
    }];
    PFNetwork::from_tables(&buses, &lines, &loads, &NetworkOptions::default())
        .expect("five bus feeder is consistent")
}
