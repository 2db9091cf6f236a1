//! Operating limit check on a solved case.

use std::fmt;

use serde::Serialize;

use super::post_processing::{BusResult, LineResult};
use crate::config::OperatingLimits;
use crate::error::{Error, Result};

/// Measured extremes and the two independent verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViolationReport {
    pub v_min_pu: f64,
    pub v_max_pu: f64,
    pub max_loading_percent: f64,
    pub voltage_violation: bool,
    pub thermal_violation: bool,
}

impl ViolationReport {
    pub fn check(bus: &[BusResult], line: &[LineResult], limits: &OperatingLimits) -> Result<Self> {
        if bus.is_empty() {
            return Err(Error::EmptyResult("bus result"));
        }
        let (v_min_pu, v_max_pu) = bus
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| {
                (lo.min(b.vm_pu), hi.max(b.vm_pu))
            });
        // a feeder without lines cannot be overloaded
        let max_loading_percent = line.iter().map(|l| l.loading_percent).fold(0.0, f64::max);
        Ok(Self::from_extremes(v_min_pu, v_max_pu, max_loading_percent, limits))
    }

    pub fn from_extremes(
        v_min_pu: f64,
        v_max_pu: f64,
        max_loading_percent: f64,
        limits: &OperatingLimits,
    ) -> Self {
        Self {
            v_min_pu,
            v_max_pu,
            max_loading_percent,
            voltage_violation: v_min_pu < limits.v_min_pu || v_max_pu > limits.v_max_pu,
            thermal_violation: max_loading_percent > limits.loading_limit_percent,
        }
    }
}

impl fmt::Display for ViolationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Min voltage: {:.3} pu", self.v_min_pu)?;
        writeln!(f, "Max voltage: {:.3} pu", self.v_max_pu)?;
        if self.voltage_violation {
            writeln!(f, "Voltage violation detected")?;
        } else {
            writeln!(f, "Voltage within limits")?;
        }
        writeln!(f, "Max line loading: {:.2} %", self.max_loading_percent)?;
        if self.thermal_violation {
            write!(f, "Thermal loading violation detected")
        } else {
            write!(f, "No thermal violations")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(v_min_pu: f64, v_max_pu: f64, loading: f64) -> OperatingLimits {
        OperatingLimits {
            v_min_pu,
            v_max_pu,
            loading_limit_percent: loading,
        }
    }

    #[test]
    fn verdicts_are_independent() {
        let r = ViolationReport::from_extremes(0.91, 1.02, 40.0, &OperatingLimits::default());
        assert!(r.voltage_violation);
        assert!(!r.thermal_violation);
        let text = r.to_string();
        assert!(text.contains("Min voltage: 0.910 pu"));
        assert!(text.contains("Voltage violation detected"));
        assert!(text.contains("Max line loading: 40.00 %"));
        assert!(text.contains("No thermal violations"));

        let r = ViolationReport::from_extremes(0.97, 1.02, 120.0, &OperatingLimits::default());
        assert!(!r.voltage_violation);
        assert!(r.thermal_violation);
        assert!(r.to_string().contains("Voltage within limits"));
        assert!(r.to_string().contains("Thermal loading violation detected"));
    }

    #[test]
    fn tightening_limits_never_clears_a_violation() {
        let (vmin, vmax, load) = (0.94, 1.03, 95.0);
        let mut previous = (false, false);
        for step in 0..20 {
            let t = step as f64 * 0.005;
            let tightened = limits(0.90 + t, 1.10 - t, 110.0 - t * 400.0);
            let r = ViolationReport::from_extremes(vmin, vmax, load, &tightened);
            assert!(r.voltage_violation || !previous.0);
            assert!(r.thermal_violation || !previous.1);
            previous = (r.voltage_violation, r.thermal_violation);
        }
        assert_eq!(previous, (true, true));
    }

    #[test]
    fn empty_bus_results_are_an_error() {
        assert!(ViolationReport::check(&[], &[], &OperatingLimits::default()).is_err());
    }
}
