use crate::basic::sparse::conj::Conjugate;
use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

/// Sparse diagonal matrix holding `d`.
fn diagonal(d: &DVector<Complex64>) -> CscMatrix<Complex64> {
    let mut m = CscMatrix::identity(d.len());
    m.values_mut().copy_from_slice(d.as_slice());
    m
}

/// Partial derivatives of the complex bus injections with respect to voltage
/// magnitude and angle, in polar form.
///
/// Returns `(dS_dVm, dS_dVa)`:
///
/// * `dS_dVm = diag(V) conj(Ybus diag(Vnorm)) + conj(diag(Ibus)) diag(Vnorm)`
/// * `dS_dVa = j diag(V) conj(diag(Ibus) - Ybus diag(V))`
///
/// with `Ibus = Ybus V` and `Vnorm = V / |V|`. See R. D. Zimmerman, "AC Power
/// Flows, Generalized OPF Costs and their Derivatives using Complex Matrix
/// Notation", MATPOWER Technical Note 2, 2010.
#[allow(non_snake_case)]
pub fn dSbus_dV(
    Ybus: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
    Vnorm: &DVector<Complex64>,
) -> (CscMatrix<Complex64>, CscMatrix<Complex64>) {
    let ibus = Ybus * v;
    let diagV = diagonal(v);
    let diagVnorm = diagonal(Vnorm);
    let diagIbus = diagonal(&ibus);

    let dS_dVm = &diagV * (Ybus * &diagVnorm).conjugate() + diagIbus.conjugate() * &diagVnorm;
    let dS_dVa = &diagV * (diagIbus - Ybus * &diagV).conjugate() * Complex64::i();
    (dS_dVm, dS_dVa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use nalgebra_sparse::CooMatrix;

    fn injections(y: &CscMatrix<Complex64>, vm: &[f64], va: &[f64]) -> DVector<Complex64> {
        let v = DVector::from_iterator(
            vm.len(),
            vm.iter().zip(va).map(|(m, a)| Complex64::from_polar(*m, *a)),
        );
        let i = y * &v;
        v.component_mul(&i.map(|z| z.conj()))
    }

    #[test]
    #[allow(non_snake_case)]
    fn derivatives_match_finite_differences() {
        let y_line = Complex64::new(2.0, -6.0);
        let mut coo = CooMatrix::new(3, 3);
        for (a, b) in [(0, 1), (1, 2)] {
            coo.push(a, a, y_line);
            coo.push(b, b, y_line);
            coo.push(a, b, -y_line);
            coo.push(b, a, -y_line);
        }
        let y = CscMatrix::from(&coo);
        let vm = [1.02, 0.98, 0.95];
        let va = [0.0, -0.02, -0.05];
        let v = DVector::from_iterator(
            3,
            vm.iter().zip(&va).map(|(m, a)| Complex64::from_polar(*m, *a)),
        );
        let vnorm = v.map(|z| z / z.norm());
        let (dS_dVm, dS_dVa) = dSbus_dV(&y, &v, &vnorm);
        let dVm = DMatrix::from(&dS_dVm);
        let dVa = DMatrix::from(&dS_dVa);

        let h = 1e-7;
        let s0 = injections(&y, &vm, &va);
        for k in 0..3 {
            let mut vm_h = vm;
            vm_h[k] += h;
            let mut va_h = va;
            va_h[k] += h;
            let dm = (injections(&y, &vm_h, &va) - &s0) / Complex64::new(h, 0.0);
            let da = (injections(&y, &vm, &va_h) - &s0) / Complex64::new(h, 0.0);
            for r in 0..3 {
                assert!((dVm[(r, k)] - dm[r]).norm() < 1e-5);
                assert!((dVa[(r, k)] - da[r]).norm() < 1e-5);
            }
        }
    }
}
