use derive_more::{Deref, From};
use nalgebra::Vector2;
use num_complex::Complex64;

/// Ground terminal of a branch.
pub const GND: i32 = -1;

/// Branch admittance in siemens.
#[derive(Clone, Copy, Default, PartialEq, Debug, Deref, From)]
pub struct Admittance(pub Complex64);

/// Solver indices of the two branch terminals; [`GND`] marks a shunt.
#[derive(Default, Debug, Clone, Copy, PartialEq, Deref, From)]
pub struct Port2(pub Vector2<i32>);

/// One branch of the incidence matrix.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdmittanceBranch {
    pub y: Admittance,
    pub port: Port2,
    /// Base voltage (kV) for the per-unit conversion.
    pub v_base: f64,
}

impl AdmittanceBranch {
    pub fn between(from: usize, to: usize, y: Complex64, v_base: f64) -> Self {
        Self {
            y: y.into(),
            port: Port2(Vector2::new(from as i32, to as i32)),
            v_base,
        }
    }

    pub fn shunt(bus: usize, y: Complex64, v_base: f64) -> Self {
        Self {
            y: y.into(),
            port: Port2(Vector2::new(bus as i32, GND)),
            v_base,
        }
    }

    /// Admittance in p.u. on `s_base` (MVA).
    pub fn y_pu(&self, s_base: f64) -> Complex64 {
        *self.y * (self.v_base * self.v_base / s_base)
    }
}
