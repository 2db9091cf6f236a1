mod res_display;

use nalgebra::DVector;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::system::{PFNetwork, RunPF};

/// Solved state of one bus. Powers are load-positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusResult {
    pub bus_id: i64,
    pub vm_pu: f64,
    pub va_degree: f64,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Solved flows of one line. `*_from_*` values flow into the line at its from end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineResult {
    pub line_id: i64,
    pub from_bus: i64,
    pub to_bus: i64,
    pub p_from_mw: f64,
    pub q_from_mvar: f64,
    pub p_to_mw: f64,
    pub q_to_mvar: f64,
    pub pl_mw: f64,
    pub ql_mvar: f64,
    pub i_from_ka: f64,
    pub i_to_ka: f64,
    pub i_ka: f64,
    pub vm_from_pu: f64,
    pub va_from_degree: f64,
    pub vm_to_pu: f64,
    pub va_to_degree: f64,
    pub loading_percent: f64,
}

/// Turns a solver voltage vector into engineering-unit result tables.
pub trait PostProcessing {
    fn res_bus(&self, v: &DVector<Complex64>) -> Vec<BusResult>;
    fn res_line(&self, v: &DVector<Complex64>) -> Vec<LineResult>;

    fn print_res_bus(&self, v: &DVector<Complex64>) {
        println!("{}", res_display::bus_table(&self.res_bus(v)));
    }

    fn print_res_line(&self, v: &DVector<Complex64>) {
        println!("{}", res_display::line_table(&self.res_line(v)));
    }
}

impl PostProcessing for PFNetwork {
    fn res_bus(&self, v: &DVector<Complex64>) -> Vec<BusResult> {
        let ybus = self.create_y_bus();
        let injection = v.component_mul(&(&ybus * v).map(|e| e.conj()));
        self.buses
            .iter()
            .map(|b| {
                let s = -injection[b.index] * self.s_base;
                BusResult {
                    bus_id: b.id,
                    vm_pu: v[b.index].norm(),
                    va_degree: v[b.index].arg().to_degrees(),
                    p_mw: s.re,
                    q_mvar: s.im,
                }
            })
            .collect()
    }

    fn res_line(&self, v: &DVector<Complex64>) -> Vec<LineResult> {
        let sqrt3 = 3f64.sqrt();
        self.lines
            .iter()
            .map(|l| {
                let from = &self.buses[l.from];
                let to = &self.buses[l.to];
                // phase voltages in kV
                let u_f = v[l.from] * (from.vn_kv / sqrt3);
                let u_t = v[l.to] * (to.vn_kv / sqrt3);
                let y_s = l.y_series();
                let y_half = l.y_shunt(self.f_hz) * 0.5;

                let i_f = (u_f - u_t) * y_s + u_f * y_half;
                let i_t = (u_t - u_f) * y_s + u_t * y_half;
                let s_f = u_f * i_f.conj() * 3.0;
                let s_t = u_t * i_t.conj() * 3.0;
                let i_ka = i_f.norm().max(i_t.norm());

                LineResult {
                    line_id: l.id,
                    from_bus: from.id,
                    to_bus: to.id,
                    p_from_mw: s_f.re,
                    q_from_mvar: s_f.im,
                    p_to_mw: s_t.re,
                    q_to_mvar: s_t.im,
                    pl_mw: s_f.re + s_t.re,
                    ql_mvar: s_f.im + s_t.im,
                    i_from_ka: i_f.norm(),
                    i_to_ka: i_t.norm(),
                    i_ka,
                    vm_from_pu: v[l.from].norm(),
                    va_from_degree: v[l.from].arg().to_degrees(),
                    vm_to_pu: v[l.to].norm(),
                    va_to_degree: v[l.to].arg().to_degrees(),
                    loading_percent: i_ka / l.max_i_ka * 100.0,
                }
            })
            .collect()
    }
}
