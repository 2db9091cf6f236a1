//! SQLite persistence for the feeder tables.

use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info};

use super::records::*;
use crate::error::Result;

/// The four tables the loader knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Bus,
    Line,
    Load,
    LoadProfile,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Bus, Table::Line, Table::Load, Table::LoadProfile];

    pub fn name(self) -> &'static str {
        match self {
            Table::Bus => "bus",
            Table::Line => "line",
            Table::Load => "load",
            Table::LoadProfile => "load_profile",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result set of an ad-hoc query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Owns the single connection used for the whole run.
pub struct FeederDb {
    conn: Connection,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Types a CSV field the way a CSV reader would infer it.
fn infer_value(field: &str) -> Value {
    if field.is_empty() {
        Value::Null
    } else if let Ok(i) = field.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(x) = field.parse::<f64>() {
        Value::Real(x)
    } else {
        Value::Text(field.to_owned())
    }
}

impl FeederDb {
    /// Opens the database file, creating it and its parent directory if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        debug!(db = %path.display(), "opening database");
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Line and load rows must reference an existing bus.
    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn })
    }

    /// Runs the DDL script as one batch.
    pub fn create_schema(&self, ddl: &str) -> Result<()> {
        self.conn.execute_batch(ddl)?;
        Ok(())
    }

    /// Appends every row of the CSV file to `table`; returns the number of rows written.
    pub fn append_csv(&mut self, table: Table, path: &Path) -> Result<usize> {
        let n = self.append_csv_reader(table, File::open(path)?)?;
        info!(%table, rows = n, file = %path.display(), "loaded csv");
        Ok(n)
    }

    /// Appends CSV rows using the header as column names.
    ///
    /// The whole file goes in one transaction: a bad row leaves the table untouched.
    pub fn append_csv_reader<R: Read>(&mut self, table: Table, reader: R) -> Result<usize> {
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let columns: Vec<String> = headers.iter().map(quote_ident).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table.name()),
            columns.join(", "),
            placeholders
        );

        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in rdr.records() {
                let record = record?;
                let values: Vec<Value> = record.iter().map(infer_value).collect();
                stmt.execute(params_from_iter(values.iter()))?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Deletes every row of the four feeder tables in one transaction.
    ///
    /// Tables referencing `bus` are emptied before it, so the foreign keys
    /// hold at every step.
    pub fn clear_tables(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for table in Table::ALL.iter().rev() {
            tx.execute(&format!("DELETE FROM {}", quote_ident(table.name())), [])?;
        }
        tx.commit()?;
        info!("cleared feeder tables");
        Ok(())
    }

    pub fn row_count(&self, table: Table) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table.name()));
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Runs one statement and collects its full result set.
    pub fn query(&self, sql: &str) -> Result<QueryTable> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(row.get::<_, Value>(i)?);
            }
            rows.push(cells);
        }
        Ok(QueryTable { columns, rows })
    }

    pub fn read_buses(&self) -> Result<Vec<BusRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT bus_id, voltage_kv FROM bus ORDER BY bus_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(BusRecord {
                bus_id: row.get(0)?,
                voltage_kv: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn read_lines(&self) -> Result<Vec<LineRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT line_id, from_bus, to_bus, r_ohm, x_ohm, rate_mva FROM line ORDER BY line_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LineRecord {
                line_id: row.get(0)?,
                from_bus: row.get(1)?,
                to_bus: row.get(2)?,
                r_ohm: row.get(3)?,
                x_ohm: row.get(4)?,
                rate_mva: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn read_loads(&self) -> Result<Vec<LoadRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT bus_id, p_mw, q_mvar FROM load ORDER BY bus_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(LoadRecord {
                bus_id: row.get(0)?,
                p_mw: row.get(1)?,
                q_mvar: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn read_profile(&self) -> Result<Vec<ProfileRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT hour, multiplier FROM load_profile ORDER BY hour")?;
        let rows = stmt.query_map([], |row| {
            Ok(ProfileRecord {
                hour: row.get(0)?,
                multiplier: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// (from_bus, to_bus) of every line, in table order.
    pub fn read_edges(&self) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare("SELECT from_bus, to_bus FROM line")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Active demand of every bus, zero where no load is attached.
    pub fn read_bus_loads(&self) -> Result<Vec<BusLoad>> {
        let mut stmt = self.conn.prepare(
            "SELECT b.bus_id, COALESCE(SUM(l.p_mw), 0) AS p_mw \
             FROM bus b LEFT JOIN load l ON b.bus_id = l.bus_id \
             GROUP BY b.bus_id ORDER BY b.bus_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(BusLoad {
                bus_id: row.get(0)?,
                p_mw: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn read_tables(&self) -> Result<FeederTables> {
        Ok(FeederTables {
            buses: self.read_buses()?,
            lines: self.read_lines()?,
            loads: self.read_loads()?,
        })
    }
}
