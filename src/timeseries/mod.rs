//! Hourly quasi-static simulation over a load-multiplier profile.

pub mod state;

use derive_more::{Deref, From};
use num_complex::Complex64;
use tracing::{debug, info, warn};

pub use state::*;

use crate::basic::post_processing::PostProcessing;
use crate::basic::system::{PFNetwork, RunPF};
use crate::basic::PowerFlowResult;
use crate::config::PowerFlowConfig;
use crate::error::{Error, Result};
use crate::io::records::ProfileRecord;

/// Hourly multipliers, ordered by hour.
#[derive(Debug, Clone, Default, PartialEq, Deref, From)]
pub struct LoadProfile(Vec<ProfileRecord>);

impl LoadProfile {
    pub fn new(mut records: Vec<ProfileRecord>) -> Self {
        records.sort_by_key(|r| r.hour);
        Self(records)
    }
}

/// Solves the network once per profile hour.
///
/// Each hour scales the load values captured on entry, so multipliers never
/// compound, and the network carries those base values again on return, on
/// the error path too. Every solve starts from the previous converged state,
/// the first one from `warm_start` when given. An hour that fails to converge
/// is recorded with NaN values and the next hour starts flat.
pub fn run_profile(
    net: &mut PFNetwork,
    profile: &LoadProfile,
    warm_start: Option<&PowerFlowResult>,
    cfg: &PowerFlowConfig,
) -> Result<TimeSeriesData> {
    let base = net.load_powers();
    let result = simulate(net, &base, profile, warm_start, cfg);
    net.set_load_powers(&base);
    result
}

fn simulate(
    net: &mut PFNetwork,
    base: &[Complex64],
    profile: &LoadProfile,
    warm_start: Option<&PowerFlowResult>,
    cfg: &PowerFlowConfig,
) -> Result<TimeSeriesData> {
    let mut data = TimeSeriesData::new(net);
    let mut v_init = state_transfer(net, warm_start);

    for p in profile.iter() {
        let scaled: Vec<_> = base.iter().map(|s| s * p.multiplier).collect();
        net.set_load_powers(&scaled);

        let res = match net.run_pf(v_init, cfg) {
            Ok(res) => res,
            Err(Error::LinearSolve(reason)) => {
                warn!(hour = p.hour, reason, "linear solve failed, restarting from flat start");
                data.hours.push(HourState::failed(
                    p.hour,
                    p.multiplier,
                    0,
                    net.buses.len(),
                    net.lines.len(),
                ));
                v_init = net.create_v_init();
                continue;
            }
            Err(e) => return Err(e),
        };

        if res.converged {
            let bus = net.res_bus(&res.v);
            let line = net.res_line(&res.v);
            let state = HourState::solved(p.hour, p.multiplier, res.iterations, &bus, &line);
            debug!(
                hour = p.hour,
                multiplier = p.multiplier,
                iterations = res.iterations,
                min_vm = state.min_vm(),
                max_loading = state.max_loading(),
                "hour solved"
            );
            data.hours.push(state);
        } else {
            warn!(
                hour = p.hour,
                iterations = res.iterations,
                mismatch = res.mismatch * net.s_base,
                "power flow did not converge, restarting from flat start"
            );
            data.hours.push(HourState::failed(
                p.hour,
                p.multiplier,
                res.iterations,
                net.buses.len(),
                net.lines.len(),
            ));
        }
        v_init = state_transfer(net, Some(&res));
    }

    info!(
        hours = data.hours.len(),
        non_converged = data.hours.iter().filter(|h| !h.converged).count(),
        "time series finished"
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases;

    fn profile(multipliers: &[f64]) -> LoadProfile {
        LoadProfile::new(
            multipliers
                .iter()
                .enumerate()
                .map(|(hour, &multiplier)| ProfileRecord {
                    hour: hour as i64,
                    multiplier,
                })
                .collect(),
        )
    }

    #[test]
    fn unit_multiplier_reproduces_base_case() {
        let mut net = testcases::ieee33_network();
        let cfg = PowerFlowConfig::default();
        let base = net.run_pf(net.create_v_init(), &cfg).unwrap();
        let bus = net.res_bus(&base.v);
        let line = net.res_line(&base.v);
        let reference = HourState::solved(0, 1.0, base.iterations, &bus, &line);

        let data = run_profile(&mut net, &profile(&[1.0]), Some(&base), &cfg).unwrap();
        let hour = &data.hours[0];
        assert!(hour.converged);
        assert!((hour.min_vm() - reference.min_vm()).abs() < 1e-9);
        assert!((hour.max_vm() - reference.max_vm()).abs() < 1e-9);
        assert!((hour.max_loading() - reference.max_loading()).abs() < 1e-6);
    }

    #[test]
    fn scaling_is_not_cumulative() {
        let mut net = testcases::ieee33_network();
        let before = net.load_powers();
        let cfg = PowerFlowConfig::default();
        let data = run_profile(&mut net, &profile(&[1.0, 0.5, 1.0, 1.1]), None, &cfg).unwrap();
        assert_eq!(net.load_powers(), before);
        assert_eq!(data.hours.len(), 4);
        assert!(data.hours.iter().all(|h| h.converged));
        let min_vm = data.min_vm();
        assert!((min_vm[0] - min_vm[2]).abs() < 1e-6);
        assert!(min_vm[1] > min_vm[0]);
        assert!(min_vm[3] < min_vm[0]);
        assert_eq!(data.hours[0].vm_pu.len(), 33);
        assert_eq!(data.hours[0].loading_percent.len(), 32);
    }

    #[test]
    fn non_converged_hour_is_flagged_and_loop_continues() {
        let mut net = testcases::ieee33_network();
        let cfg = PowerFlowConfig::default();
        // far beyond the loadability limit of the feeder
        let data = run_profile(&mut net, &profile(&[1.0, 40.0, 1.0]), None, &cfg).unwrap();
        assert_eq!(data.hours.len(), 3);
        assert!(data.hours[0].converged);
        assert!(!data.hours[1].converged);
        assert!(data.hours[1].min_vm().is_nan());
        assert!(data.hours[2].converged);

        let summary = data.summary();
        assert_eq!(summary.non_converged, 1);
        assert_eq!(summary.hours[1].min_vm_pu, None);
        assert!(summary.lowest_voltage.is_some());
    }

    #[test]
    fn selected_bus_series_follow_hours() {
        let mut net = testcases::ieee33_network();
        let cfg = PowerFlowConfig::default();
        let data = run_profile(&mut net, &profile(&[0.6, 1.0]), None, &cfg).unwrap();
        let source = data.bus_series(1).unwrap();
        assert!(source.iter().all(|v| (v - 1.02).abs() < 1e-9));
        let far = data.bus_series(18).unwrap();
        assert!(far[0] > far[1]);
        assert!(data.bus_series(999).is_none());
    }
}
