pub mod basic;
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod testcases;
pub mod timeseries;
pub mod viz;

pub mod prelude {
    pub use crate::basic::limits::ViolationReport;
    pub use crate::basic::post_processing::{BusResult, LineResult, PostProcessing};
    pub use crate::basic::system::{PFNetwork, RunPF};
    pub use crate::basic::PowerFlowResult;
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::io::database::{FeederDb, Table};
    pub use crate::pipeline::{Pipeline, SolveOutcome};
    pub use crate::timeseries::{run_profile, LoadProfile, TimeSeriesData};
}
