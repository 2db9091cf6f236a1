use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

/// Element-wise conjugate of a complex sparse matrix.
pub(crate) trait Conjugate {
    type Mat;

    /// Returns the conjugate of the matrix.
    fn conjugate(&self) -> Self::Mat;

    /// Computes the conjugate of the matrix in-place.
    fn conjugate_mut(&mut self);
}

impl Conjugate for CscMatrix<Complex64> {
    type Mat = CscMatrix<Complex64>;

    fn conjugate(&self) -> Self::Mat {
        let mut out = self.clone();
        out.conjugate_mut();
        out
    }

    fn conjugate_mut(&mut self) {
        self.values_mut().iter_mut().for_each(|z| *z = z.conj());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    fn sample(sign: f64) -> CscMatrix<Complex64> {
        let mut a = CooMatrix::new(4, 4);
        a.push(0, 0, Complex64::new(1.0, -1.0 * sign));
        a.push(2, 1, Complex64::new(3.0, 1.0 * sign));
        a.push(3, 3, Complex64::new(5.0, -2.0 * sign));
        (&a).into()
    }

    #[test]
    fn test_conj() {
        let a = sample(1.0);
        assert_eq!(a.conjugate(), sample(-1.0));
        assert_eq!(a.conjugate().pattern(), a.pattern());
    }

    #[test]
    fn test_conj_mut() {
        let mut a = sample(1.0);
        a.conjugate_mut();
        assert_eq!(a, sample(-1.0));
    }
}
