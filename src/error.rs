use thiserror::Error;

/// Errors raised by the feeder pipeline.
///
/// Only the SQL report batch swallows errors (per statement); everything else
/// propagates one of these to the caller.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plot error: {0}")]
    Plot(String),

    #[error("{element} references unknown bus {bus}")]
    UnknownBus { element: String, bus: i64 },

    #[error("bus {0} appears more than once")]
    DuplicateBus(i64),

    #[error("line {line} connects bus {bus} to itself")]
    SelfLoop { line: i64, bus: i64 },

    #[error("no layout coordinate for bus {0}")]
    MissingCoordinate(i64),

    #[error("linear solve failed: {0}")]
    LinearSolve(&'static str),

    #[error("no convergence after {iterations} iterations (mismatch {mismatch_mva:.3e} MVA)")]
    NotConverged { iterations: usize, mismatch_mva: f64 },

    #[error("{0} is empty")]
    EmptyResult(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wraps any plotting backend error.
    pub(crate) fn plot<E: std::fmt::Display>(err: E) -> Self {
        Error::Plot(err.to_string())
    }
}
