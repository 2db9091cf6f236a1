use nalgebra::DVector;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::basic::post_processing::{BusResult, LineResult};
use crate::basic::system::{PFNetwork, RunPF};
use crate::basic::PowerFlowResult;

/// Per-hour snapshot of the solved network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourState {
    pub hour: i64,
    pub multiplier: f64,
    pub converged: bool,
    pub iterations: usize,
    /// Voltage magnitude of every bus, NaN when the hour did not converge.
    pub vm_pu: Vec<f64>,
    /// Loading of every line, NaN when the hour did not converge.
    pub loading_percent: Vec<f64>,
}

fn extreme(values: &[f64], pick: fn(f64, f64) -> f64) -> f64 {
    values
        .iter()
        .copied()
        .reduce(pick)
        .unwrap_or(f64::NAN)
}

impl HourState {
    pub fn solved(
        hour: i64,
        multiplier: f64,
        iterations: usize,
        bus: &[BusResult],
        line: &[LineResult],
    ) -> Self {
        Self {
            hour,
            multiplier,
            converged: true,
            iterations,
            vm_pu: bus.iter().map(|b| b.vm_pu).collect(),
            loading_percent: line.iter().map(|l| l.loading_percent).collect(),
        }
    }

    pub fn failed(
        hour: i64,
        multiplier: f64,
        iterations: usize,
        n_bus: usize,
        n_line: usize,
    ) -> Self {
        Self {
            hour,
            multiplier,
            converged: false,
            iterations,
            vm_pu: vec![f64::NAN; n_bus],
            loading_percent: vec![f64::NAN; n_line],
        }
    }

    pub fn min_vm(&self) -> f64 {
        extreme(&self.vm_pu, f64::min)
    }

    pub fn max_vm(&self) -> f64 {
        extreme(&self.vm_pu, f64::max)
    }

    pub fn max_loading(&self) -> f64 {
        extreme(&self.loading_percent, f64::max)
    }
}

/// Everything the hourly loop keeps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesData {
    /// Bus ids in the order of `HourState::vm_pu`.
    pub bus_ids: Vec<i64>,
    /// Line ids in the order of `HourState::loading_percent`.
    pub line_ids: Vec<i64>,
    pub hours: Vec<HourState>,
}

impl TimeSeriesData {
    pub fn new(net: &PFNetwork) -> Self {
        Self {
            bus_ids: net.buses.iter().map(|b| b.id).collect(),
            line_ids: net.lines.iter().map(|l| l.id).collect(),
            hours: Vec::new(),
        }
    }

    pub fn hours(&self) -> Vec<i64> {
        self.hours.iter().map(|h| h.hour).collect()
    }

    pub fn min_vm(&self) -> Vec<f64> {
        self.hours.iter().map(HourState::min_vm).collect()
    }

    pub fn max_vm(&self) -> Vec<f64> {
        self.hours.iter().map(HourState::max_vm).collect()
    }

    pub fn max_loading(&self) -> Vec<f64> {
        self.hours.iter().map(HourState::max_loading).collect()
    }

    /// Voltage of one bus across all hours; `None` for an unknown bus id.
    pub fn bus_series(&self, bus_id: i64) -> Option<Vec<f64>> {
        let idx = self.bus_ids.iter().position(|&b| b == bus_id)?;
        Some(self.hours.iter().map(|h| h.vm_pu[idx]).collect())
    }

    pub fn summary(&self) -> TimeSeriesSummary {
        let finite = |x: f64| x.is_finite().then_some(x);
        let hours: Vec<HourSummary> = self
            .hours
            .iter()
            .map(|h| HourSummary {
                hour: h.hour,
                multiplier: h.multiplier,
                converged: h.converged,
                iterations: h.iterations,
                min_vm_pu: finite(h.min_vm()),
                max_vm_pu: finite(h.max_vm()),
                max_loading_percent: finite(h.max_loading()),
            })
            .collect();
        let lowest_voltage = hours
            .iter()
            .filter_map(|h| Some((h.hour, h.min_vm_pu?)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let peak_loading = hours
            .iter()
            .filter_map(|h| Some((h.hour, h.max_loading_percent?)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        TimeSeriesSummary {
            non_converged: self.hours.iter().filter(|h| !h.converged).count(),
            lowest_voltage,
            peak_loading,
            hours,
        }
    }
}

/// Aggregate of one hour, with `None` for a non-converged hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourSummary {
    pub hour: i64,
    pub multiplier: f64,
    pub converged: bool,
    pub iterations: usize,
    pub min_vm_pu: Option<f64>,
    pub max_vm_pu: Option<f64>,
    pub max_loading_percent: Option<f64>,
}

/// JSON-exported digest of the hourly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesSummary {
    pub non_converged: usize,
    /// (hour, p.u.) of the lowest bus voltage over the day.
    pub lowest_voltage: Option<(i64, f64)>,
    /// (hour, %) of the highest line loading over the day.
    pub peak_loading: Option<(i64, f64)>,
    pub hours: Vec<HourSummary>,
}

/// Initial voltage for the next solve: the last converged state, or a flat start.
pub fn state_transfer(net: &PFNetwork, previous: Option<&PowerFlowResult>) -> DVector<Complex64> {
    match previous {
        Some(res) if res.converged => res.v.clone(),
        _ => net.create_v_init(),
    }
}
