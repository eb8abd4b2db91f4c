//! Module engagement on description nodes.

mod hooks;
mod phases;
mod resolver;

pub use phases::{Phase, PhaseOrder};
pub(crate) use resolver::InFlight;
