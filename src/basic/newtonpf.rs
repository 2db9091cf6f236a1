use super::{dsbus_dv::dSbus_dV, solver::Solve};
use crate::error::{Error, Result};

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;
use num_traits::{One, Zero};

/// Outcome of one Newton-Raphson run.
#[derive(Debug, Clone)]
pub struct PowerFlowResult {
    /// Final bus voltages (p.u.), in solver bus order.
    pub v: DVector<Complex64>,
    pub iterations: usize,
    pub converged: bool,
    /// Largest absolute mismatch at exit (p.u.).
    pub mismatch: f64,
}

/// Position of every bus in the state vector; `None` for fixed quantities.
struct StateIndex {
    pq: Vec<usize>,
    va: Vec<Option<usize>>,
    vm: Vec<Option<usize>>,
}

impl StateIndex {
    /// Angles of the PQ buses come first, then their magnitudes.
    fn new(n_bus: usize, pq: &[usize]) -> Self {
        let mut va = vec![None; n_bus];
        let mut vm = vec![None; n_bus];
        for (k, &b) in pq.iter().enumerate() {
            va[b] = Some(k);
            vm[b] = Some(pq.len() + k);
        }
        Self {
            pq: pq.to_vec(),
            va,
            vm,
        }
    }

    fn len(&self) -> usize {
        2 * self.pq.len()
    }
}

/// Solves the bus power balance `V .* conj(Ybus V) = Sbus` for every bus in `pq`.
///
/// Buses not listed in `pq` keep the magnitude and angle of `v_init`. The
/// iteration stops once the largest real or reactive mismatch falls below
/// `tolerance` (p.u.), and the mismatch is checked before the first step, so
/// a converged starting point costs zero iterations. Running out of
/// iterations is reported through `converged`, not as an error.
#[allow(non_snake_case)]
pub fn newton_pf<Solver: Solve>(
    Ybus: &CscMatrix<Complex64>,
    Sbus: &DVector<Complex64>,
    v_init: &DVector<Complex64>,
    pq: &[usize],
    tolerance: f64,
    max_iter: usize,
    solver: &mut Solver,
) -> Result<PowerFlowResult> {
    let index = StateIndex::new(v_init.len(), pq);
    let mut v = v_init.clone();
    let mut v_m = v.map(|e| e.norm());
    let mut v_a = v.map(|e| e.arg());

    let mut F = assemble_f(&index, &mismatch(Ybus, Sbus, &v));
    let mut norm = inf_norm(&F);
    let mut iterations = 0;

    while norm >= tolerance && norm.is_finite() && iterations < max_iter {
        iterations += 1;
        let v_norm = v.map(|e| if e.norm() > 0.0 { e / e.norm() } else { Complex64::one() });
        let (dS_dVm, dS_dVa) = dSbus_dV(Ybus, &v, &v_norm);
        let J = build_jacobian(&index, &dS_dVm, &dS_dVa);

        let mut dx = F;
        solver
            .solve(J.col_offsets(), J.row_indices(), J.values(), &mut dx)
            .map_err(Error::LinearSolve)?;

        for (k, &b) in index.pq.iter().enumerate() {
            v_a[b] -= dx[k];
            v_m[b] -= dx[index.pq.len() + k];
        }
        v = v_m.zip_map(&v_a, Complex64::from_polar);

        F = assemble_f(&index, &mismatch(Ybus, Sbus, &v));
        norm = inf_norm(&F);
    }

    Ok(PowerFlowResult {
        v,
        iterations,
        converged: norm < tolerance,
        mismatch: norm,
    })
}

#[allow(non_snake_case)]
#[inline(always)]
fn mismatch(
    Ybus: &CscMatrix<Complex64>,
    Sbus: &DVector<Complex64>,
    v: &DVector<Complex64>,
) -> DVector<Complex64> {
    v.component_mul(&(Ybus * v).map(|e| e.conj())) - Sbus
}

#[inline(always)]
fn assemble_f(index: &StateIndex, mis: &DVector<Complex64>) -> Vec<f64> {
    let mut f = vec![0.0; index.len()];
    for (k, &b) in index.pq.iter().enumerate() {
        f[k] = mis[b].re;
        f[index.pq.len() + k] = mis[b].im;
    }
    f
}

fn inf_norm(f: &[f64]) -> f64 {
    f.iter().fold(0.0, |acc: f64, x| acc.max(x.abs()))
}

/// Real Jacobian of the PQ-bus mismatches.
///
/// ```text
/// | dP/dVa  dP/dVm |
/// | dQ/dVa  dQ/dVm |
/// ```
#[allow(non_snake_case)]
fn build_jacobian(
    index: &StateIndex,
    dS_dVm: &CscMatrix<Complex64>,
    dS_dVa: &CscMatrix<Complex64>,
) -> CscMatrix<f64> {
    let n = index.len();
    let mut J = CooMatrix::new(n, n);
    for (cols, block) in [(&index.va, dS_dVa), (&index.vm, dS_dVm)] {
        for (r, c, s) in block.triplet_iter() {
            let Some(col) = cols[c] else { continue };
            if let Some(row) = index.va[r] {
                J.push(row, col, s.re);
            }
            if let Some(row) = index.vm[r] {
                J.push(row, col, s.im);
            }
        }
    }
    CscMatrix::from(&J)
}
