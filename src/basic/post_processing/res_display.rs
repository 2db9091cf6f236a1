use std::fmt;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{BusResult, LineResult};

/// A wrapper around a float that limits the number of decimal places when printed.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub(crate) struct FloatWrapper {
    pub(crate) value: f64,
    pub(crate) precision: usize,
}

impl FloatWrapper {
    pub fn new(value: f64, precision: usize) -> Self {
        FloatWrapper { value, precision }
    }
}

impl Default for FloatWrapper {
    fn default() -> Self {
        Self {
            value: Default::default(),
            precision: 3,
        }
    }
}

impl fmt::Display for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

impl fmt::Debug for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

/// Table row for display Bus results.
#[derive(Debug, Tabled)]
#[allow(non_snake_case)]
pub(crate) struct BusResTable {
    pub(crate) Bus: i64,
    pub(crate) Vm: FloatWrapper,
    pub(crate) Va: FloatWrapper,
    pub(crate) P_mw: FloatWrapper,
    pub(crate) Q_mvar: FloatWrapper,
}

impl From<&BusResult> for BusResTable {
    fn from(r: &BusResult) -> Self {
        BusResTable {
            Bus: r.bus_id,
            Vm: FloatWrapper::new(r.vm_pu, 5),
            Va: FloatWrapper::new(r.va_degree, 5),
            P_mw: FloatWrapper::new(r.p_mw, 5),
            Q_mvar: FloatWrapper::new(r.q_mvar, 5),
        }
    }
}

/// Line results with limited decimal precision for output.
#[derive(Debug, Default, Tabled)]
pub(crate) struct LineResTable {
    pub(crate) line: i64,
    pub(crate) from: i64,
    pub(crate) to: i64,
    pub(crate) p_from_mw: FloatWrapper,
    pub(crate) q_from_mvar: FloatWrapper,
    pub(crate) p_to_mw: FloatWrapper,
    pub(crate) q_to_mvar: FloatWrapper,
    pub(crate) pl_mw: FloatWrapper,
    pub(crate) ql_mvar: FloatWrapper,
    pub(crate) i_ka: FloatWrapper,
    pub(crate) vm_from_pu: FloatWrapper,
    pub(crate) vm_to_pu: FloatWrapper,
    pub(crate) loading_percent: FloatWrapper,
}

impl From<&LineResult> for LineResTable {
    fn from(r: &LineResult) -> Self {
        LineResTable {
            line: r.line_id,
            from: r.from_bus,
            to: r.to_bus,
            p_from_mw: FloatWrapper::new(r.p_from_mw, 4),
            q_from_mvar: FloatWrapper::new(r.q_from_mvar, 4),
            p_to_mw: FloatWrapper::new(r.p_to_mw, 4),
            q_to_mvar: FloatWrapper::new(r.q_to_mvar, 4),
            pl_mw: FloatWrapper::new(r.pl_mw, 5),
            ql_mvar: FloatWrapper::new(r.ql_mvar, 5),
            i_ka: FloatWrapper::new(r.i_ka, 4),
            vm_from_pu: FloatWrapper::new(r.vm_from_pu, 4),
            vm_to_pu: FloatWrapper::new(r.vm_to_pu, 4),
            loading_percent: FloatWrapper::new(r.loading_percent, 2),
        }
    }
}

pub(crate) fn bus_table(res: &[BusResult]) -> String {
    Table::new(res.iter().map(BusResTable::from))
        .with(Style::markdown())
        .to_string()
}

pub(crate) fn line_table(res: &[LineResult]) -> String {
    Table::new(res.iter().map(LineResTable::from))
        .with(Style::markdown())
        .to_string()
}
