pub(crate) mod dsbus_dv;
pub mod limits;
pub mod newtonpf;
pub mod post_processing;
pub mod solver;
pub(crate) mod sparse;
pub mod system;

pub use newtonpf::{newton_pf, PowerFlowResult};
