use rsparse::{
    data::{self, Numeric, Symb},
    lsolve, lu, sqr, usolve,
};

use super::Solve;

/// Sparse LU through `rsparse`.
///
/// The symbolic analysis is kept between calls and redone only when the
/// dimension or the number of non-zeros changes.
#[derive(Default)]
pub struct RSparseSolver {
    x: Vec<f64>,
    symbolic: Option<Symb>,
    shape: (usize, usize),
}

#[allow(non_snake_case)]
impl Solve for RSparseSolver {
    fn solve(
        &mut self,
        Ap: &[usize],
        Ai: &[usize],
        Ax: &[f64],
        b: &mut [f64],
    ) -> Result<(), &'static str> {
        let n = Ap.len().checked_sub(1).ok_or("empty column pointer array")?;
        if b.len() != n {
            return Err("right-hand side does not match matrix dimension");
        }
        let a = data::Sprs {
            m: n,
            n,
            i: Ai.to_vec(),
            p: Ap.iter().map(|&v| v as isize).collect(),
            x: Ax.to_vec(),
            nzmax: Ax.len(),
        };
        if self.shape != (n, Ax.len()) {
            self.reset();
        }
        if self.symbolic.is_none() {
            self.shape = (n, Ax.len());
            self.x = vec![0.0; n];
            self.symbolic = Some(sqr(&a, 1, false));
        }
        let Some(s) = self.symbolic.as_mut() else {
            return Err("symbolic analysis missing");
        };
        let num = lu(&a, s, 1e-6).map_err(|_| "LU factorization failed")?;
        ipvec(&num.pinv, b, &mut self.x); // x = P*b
        lsolve(&num.l, &mut self.x); // x = L\x
        usolve(&num.u, &mut self.x); // x = U\x
        ipvec(&s.q, &self.x, b); // b = Q*x
        if b.iter().any(|v| !v.is_finite()) {
            return Err("singular Jacobian");
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
        self.shape = (0, 0);
    }
}

fn ipvec<T: Numeric<T>>(p: &Option<Vec<isize>>, b: &[T], x: &mut [T]) {
    match p {
        Some(pvec) => {
            for k in 0..b.len() {
                x[pvec[k] as usize] = b[k];
            }
        }
        None => x.copy_from_slice(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use nalgebra_sparse::{CooMatrix, CscMatrix};

    #[test]
    fn solves_small_unsymmetric_system() {
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, 4.0);
        coo.push(0, 1, 1.0);
        coo.push(1, 0, 2.0);
        coo.push(1, 1, 5.0);
        coo.push(1, 2, 1.0);
        coo.push(2, 2, 3.0);
        let a = CscMatrix::from(&coo);
        let dense = DMatrix::from(&a);
        let x_true = [1.0, -2.0, 0.5];
        let mut b: Vec<f64> = (0..3)
            .map(|r| (0..3).map(|c| dense[(r, c)] * x_true[c]).sum())
            .collect();

        let mut solver = RSparseSolver::default();
        solver
            .solve(a.col_offsets(), a.row_indices(), a.values(), &mut b)
            .unwrap();
        for (got, want) in b.iter().zip(x_true) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_mismatched_rhs() {
        let a = CscMatrix::<f64>::identity(2);
        let mut b = vec![1.0; 3];
        let mut solver = RSparseSolver::default();
        assert!(solver
            .solve(a.col_offsets(), a.row_indices(), a.values(), &mut b)
            .is_err());
    }
}
