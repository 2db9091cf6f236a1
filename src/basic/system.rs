//! Bus-branch model handed to the Newton-Raphson solver.

pub mod admittance;

use std::collections::BTreeMap;
use std::f64::consts::PI;

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;
use num_traits::{One, Zero};
use tracing::debug;

use self::admittance::{AdmittanceBranch, GND};
use super::newtonpf::{newton_pf, PowerFlowResult};
use super::solver::DefaultSolver;
use crate::config::{NetworkOptions, PowerFlowConfig};
use crate::error::{Error, Result};
use crate::io::records::{BusRecord, LineRecord, LoadRecord};

/// A network bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bus {
    /// External bus id.
    pub id: i64,
    /// Position in the solver vectors.
    pub index: usize,
    pub vn_kv: f64,
}

/// A line between two solver buses.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub id: i64,
    pub from: usize,
    pub to: usize,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    pub c_nf_per_km: f64,
    /// Thermal current limit (kA).
    pub max_i_ka: f64,
}

impl Line {
    /// Series admittance (S).
    pub fn y_series(&self) -> Complex64 {
        Complex64::one()
            / (Complex64::new(self.r_ohm_per_km, self.x_ohm_per_km) * self.length_km)
    }

    /// Total shunt admittance (S), split equally between the two ends.
    pub fn y_shunt(&self, f_hz: f64) -> Complex64 {
        Complex64::new(0.0, 2.0 * PI * f_hz * self.c_nf_per_km * 1e-9 * self.length_km)
    }
}

/// Represents a node with specified power and bus information in a power system.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PQNode {
    /// Complex demand (MVA), load-positive.
    pub s: Complex64,
    pub bus: usize,
}

/// Represents an external grid node with voltage, phase, and bus information.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtGridNode {
    pub v: f64,
    /// Phase angle (rad).
    pub phase: f64,
    pub bus: usize,
}

/// The solver-side network: buses, lines, loads and the slack connection.
#[derive(Debug, Clone)]
pub struct PFNetwork {
    /// System power base (MVA).
    pub s_base: f64,
    pub f_hz: f64,
    pub buses: Vec<Bus>,
    pub lines: Vec<Line>,
    pub pq_loads: Vec<PQNode>,
    pub ext: ExtGridNode,
    /// External bus id to solver index.
    pub bus_map: BTreeMap<i64, usize>,
}

impl PFNetwork {
    /// Builds the solver model from the relational rows.
    ///
    /// Several loads on one bus stay separate elements; they are summed only
    /// when the injection vector is assembled.
    pub fn from_tables(
        buses: &[BusRecord],
        lines: &[LineRecord],
        loads: &[LoadRecord],
        options: &NetworkOptions,
    ) -> Result<Self> {
        let mut bus_map = BTreeMap::new();
        let mut net_buses = Vec::with_capacity(buses.len());
        for (index, b) in buses.iter().enumerate() {
            if bus_map.insert(b.bus_id, index).is_some() {
                return Err(Error::DuplicateBus(b.bus_id));
            }
            net_buses.push(Bus {
                id: b.bus_id,
                index,
                vn_kv: b.voltage_kv,
            });
        }

        let lookup = |element: String, bus: i64| {
            bus_map
                .get(&bus)
                .copied()
                .ok_or(Error::UnknownBus { element, bus })
        };

        let ext_bus = lookup("external grid".into(), options.slack_bus)?;

        let mut net_lines = Vec::with_capacity(lines.len());
        for l in lines {
            if l.from_bus == l.to_bus {
                return Err(Error::SelfLoop {
                    line: l.line_id,
                    bus: l.from_bus,
                });
            }
            let from = lookup(format!("line {}", l.line_id), l.from_bus)?;
            let to = lookup(format!("line {}", l.line_id), l.to_bus)?;
            let vn_from = net_buses[from].vn_kv;
            net_lines.push(Line {
                id: l.line_id,
                from,
                to,
                length_km: options.line_length_km,
                r_ohm_per_km: l.r_ohm,
                x_ohm_per_km: l.x_ohm,
                c_nf_per_km: options.c_nf_per_km,
                max_i_ka: l.rate_mva / (3f64.sqrt() * vn_from),
            });
        }

        let mut pq_loads = Vec::with_capacity(loads.len());
        for l in loads {
            pq_loads.push(PQNode {
                s: Complex64::new(l.p_mw, l.q_mvar),
                bus: lookup("load".into(), l.bus_id)?,
            });
        }

        debug!(
            buses = net_buses.len(),
            lines = net_lines.len(),
            loads = pq_loads.len(),
            "built solver network"
        );

        Ok(Self {
            s_base: options.sn_mva,
            f_hz: options.f_hz,
            buses: net_buses,
            lines: net_lines,
            pq_loads,
            ext: ExtGridNode {
                v: options.slack_vm_pu,
                phase: options.slack_va_degree.to_radians(),
                bus: ext_bus,
            },
            bus_map,
        })
    }

    /// Series and shunt branches of every line.
    pub fn admittance_branches(&self) -> Vec<AdmittanceBranch> {
        let mut branches = Vec::with_capacity(self.lines.len() * 3);
        for l in &self.lines {
            let v_base = self.buses[l.from].vn_kv;
            branches.push(AdmittanceBranch::between(l.from, l.to, l.y_series(), v_base));
            let y_sh = l.y_shunt(self.f_hz);
            if y_sh != Complex64::zero() {
                branches.push(AdmittanceBranch::shunt(l.from, y_sh * 0.5, v_base));
                branches.push(AdmittanceBranch::shunt(l.to, y_sh * 0.5, v_base));
            }
        }
        branches
    }

    /// Solver indices of every bus with unknown voltage.
    pub fn pq_buses(&self) -> Vec<usize> {
        (0..self.buses.len()).filter(|&i| i != self.ext.bus).collect()
    }

    /// Current demand of every load element (MVA), in element order.
    pub fn load_powers(&self) -> Vec<Complex64> {
        self.pq_loads.iter().map(|l| l.s).collect()
    }

    /// Overwrites the demand of every load element, in element order.
    pub fn set_load_powers(&mut self, s: &[Complex64]) {
        self.pq_loads
            .iter_mut()
            .zip(s)
            .for_each(|(load, s)| load.s = *s);
    }
}

/// Creates the incidence matrix; ground terminals have no row.
fn create_incidence_mat(nodes: usize, y_br: &[AdmittanceBranch]) -> CooMatrix<Complex64> {
    let mut incidence_matrix = CooMatrix::new(nodes, y_br.len());
    for (idx, br) in y_br.iter().enumerate() {
        if br.port[0] != GND {
            incidence_matrix.push(br.port[0] as usize, idx, Complex64::one());
        }
        if br.port[1] != GND {
            incidence_matrix.push(br.port[1] as usize, idx, -Complex64::one());
        }
    }
    incidence_matrix
}

/// `Ybus = A diag(y_pu) A^T`.
fn create_ybus(
    s_base: f64,
    incidence_matrix: &CooMatrix<Complex64>,
    admits: &[AdmittanceBranch],
) -> CscMatrix<Complex64> {
    let mut diag_admit = CscMatrix::identity(admits.len());
    diag_admit
        .values_mut()
        .iter_mut()
        .zip(admits)
        .for_each(|(x, br)| *x = br.y_pu(s_base));

    let incidence_matrix = CscMatrix::from(incidence_matrix);
    &incidence_matrix * (diag_admit * incidence_matrix.transpose())
}

/// A trait for running power flow analysis.
pub trait RunPF {
    /// Creates the nodal admittance matrix (Ybus) in p.u.
    fn create_y_bus(&self) -> CscMatrix<Complex64>;

    /// Creates the nodal power injection vector (Sbus) in p.u.
    fn create_s_bus(&self) -> DVector<Complex64>;

    /// Flat start: every bus at 1∠0, the slack at its setpoint.
    fn create_v_init(&self) -> DVector<Complex64>;

    /// Runs Newton-Raphson from `v_init`.
    fn run_pf(&self, v_init: DVector<Complex64>, cfg: &PowerFlowConfig) -> Result<PowerFlowResult>;
}

impl RunPF for PFNetwork {
    fn create_y_bus(&self) -> CscMatrix<Complex64> {
        let branches = self.admittance_branches();
        let incidence_matrix = create_incidence_mat(self.buses.len(), &branches);
        create_ybus(self.s_base, &incidence_matrix, &branches)
    }

    fn create_s_bus(&self) -> DVector<Complex64> {
        let mut sbus = DVector::zeros(self.buses.len());
        for l in &self.pq_loads {
            sbus[l.bus] -= l.s;
        }
        sbus / Complex64::new(self.s_base, 0.0)
    }

    fn create_v_init(&self) -> DVector<Complex64> {
        let mut vbus = DVector::from_element(self.buses.len(), Complex64::one());
        vbus[self.ext.bus] = Complex64::from_polar(self.ext.v, self.ext.phase);
        vbus
    }

    #[allow(non_snake_case)]
    fn run_pf(
        &self,
        mut v_init: DVector<Complex64>,
        cfg: &PowerFlowConfig,
    ) -> Result<PowerFlowResult> {
        // the slack setpoint always wins over a warm start
        v_init[self.ext.bus] = Complex64::from_polar(self.ext.v, self.ext.phase);
        let Ybus = self.create_y_bus();
        let Sbus = self.create_s_bus();
        let mut solver = DefaultSolver::default();
        newton_pf(
            &Ybus,
            &Sbus,
            &v_init,
            &self.pq_buses(),
            cfg.tolerance_mva / self.s_base,
            cfg.max_iteration,
            &mut solver,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases;

    #[test]
    fn bus_map_is_a_bijection() {
        let t = testcases::ieee33_tables();
        let net = PFNetwork::from_tables(&t.buses, &t.lines, &t.loads, &NetworkOptions::default())
            .unwrap();
        assert_eq!(net.bus_map.len(), t.buses.len());
        let mut seen = vec![false; net.buses.len()];
        for (id, &idx) in &net.bus_map {
            assert_eq!(net.buses[idx].id, *id);
            assert!(!seen[idx]);
            seen[idx] = true;
        }
        assert!(seen.into_iter().all(|s| s));
        assert_eq!(net.buses[net.ext.bus].id, 1);
    }

    #[test]
    fn rejects_bad_references() {
        let t = testcases::ieee33_tables();
        let opts = NetworkOptions::default();

        let mut buses = t.buses.clone();
        buses.push(buses[3].clone());
        assert!(matches!(
            PFNetwork::from_tables(&buses, &t.lines, &t.loads, &opts),
            Err(Error::DuplicateBus(4))
        ));

        let mut lines = t.lines.clone();
        lines[0].to_bus = 99;
        assert!(matches!(
            PFNetwork::from_tables(&t.buses, &lines, &t.loads, &opts),
            Err(Error::UnknownBus { bus: 99, .. })
        ));

        let mut lines = t.lines.clone();
        lines[2].to_bus = lines[2].from_bus;
        assert!(matches!(
            PFNetwork::from_tables(&t.buses, &lines, &t.loads, &opts),
            Err(Error::SelfLoop { .. })
        ));

        let mut loads = t.loads.clone();
        loads[0].bus_id = 0;
        assert!(matches!(
            PFNetwork::from_tables(&t.buses, &t.lines, &loads, &opts),
            Err(Error::UnknownBus { bus: 0, .. })
        ));

        let opts = NetworkOptions {
            slack_bus: 77,
            ..NetworkOptions::default()
        };
        assert!(PFNetwork::from_tables(&t.buses, &t.lines, &t.loads, &opts).is_err());
    }

    #[test]
    fn thermal_limit_from_rating() {
        let t = testcases::ieee33_tables();
        let net = PFNetwork::from_tables(&t.buses, &t.lines, &t.loads, &NetworkOptions::default())
            .unwrap();
        let first = &net.lines[0];
        let expected = t.lines[0].rate_mva / (3f64.sqrt() * 12.66);
        assert!((first.max_i_ka - expected).abs() < 1e-12);
    }

    #[test]
    fn ybus_rows_sum_to_zero_without_shunts() {
        let net = testcases::radial_five_bus(0.4, 0.1);
        let y = nalgebra::DMatrix::from(&net.create_y_bus());
        for r in 0..y.nrows() {
            let sum: Complex64 = y.row(r).iter().sum();
            assert!(sum.norm() < 1e-9);
        }
    }

    #[test]
    fn loads_on_one_bus_are_aggregated() {
        let t = testcases::ieee33_tables();
        let mut loads = t.loads.clone();
        let extra = LoadRecord {
            bus_id: 18,
            p_mw: 0.05,
            q_mvar: 0.01,
        };
        loads.push(extra);
        let net = PFNetwork::from_tables(&t.buses, &t.lines, &loads, &NetworkOptions::default())
            .unwrap();
        assert_eq!(net.pq_loads.len(), t.loads.len() + 1);
        let sbus = net.create_s_bus();
        let idx = net.bus_map[&18];
        let total: f64 = loads.iter().filter(|l| l.bus_id == 18).map(|l| l.p_mw).sum();
        assert!((sbus[idx].re + total / net.s_base).abs() < 1e-12);
    }

    #[test]
    fn ieee33_base_case_converges() {
        let net = testcases::ieee33_network();
        let res = net
            .run_pf(net.create_v_init(), &PowerFlowConfig::default())
            .unwrap();
        assert!(res.converged);
        assert!(res.iterations <= 10);
        let v1 = res.v[net.bus_map[&1]];
        assert!((v1.norm() - 1.02).abs() < 1e-9);
        assert!(v1.arg().abs() < 1e-12);
        let vmin = res.v.iter().map(|v| v.norm()).fold(f64::INFINITY, f64::min);
        assert!(vmin < 1.0 && vmin > 0.85);
    }

    #[test]
    fn five_bus_voltage_decreases_along_feeder() {
        let net = testcases::radial_five_bus(0.4, 0.1);
        let res = net
            .run_pf(net.create_v_init(), &PowerFlowConfig::default())
            .unwrap();
        assert!(res.converged);
        let vm: Vec<f64> = (1..=5).map(|id| res.v[net.bus_map[&id]].norm()).collect();
        assert!(vm.windows(2).all(|w| w[0] > w[1]), "{vm:?}");
    }

    #[test]
    fn warm_start_from_solution_needs_no_iteration() {
        let net = testcases::ieee33_network();
        let cfg = PowerFlowConfig::default();
        let base = net.run_pf(net.create_v_init(), &cfg).unwrap();
        let again = net.run_pf(base.v.clone(), &cfg).unwrap();
        assert!(again.converged);
        assert_eq!(again.iterations, 0);
    }
}
