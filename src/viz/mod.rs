//! Topology layouts and SVG charts.

mod charts;
mod topology;

pub use charts::*;
pub use topology::*;

/// Fixed bin count of the load histogram.
pub const HISTOGRAM_BINS: usize = 10;
