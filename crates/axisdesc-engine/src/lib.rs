//! axisdesc engine library entry.
//!
//! This crate wires the description tree, effective policy resolution, the
//! module registry and the engagement resolver into one model. It is consumed
//! by the binary (`main.rs`), by deployment tooling and by integration tests.

pub mod config;
pub mod engage;
pub mod events;
pub mod module;
pub mod policy;
pub mod registry;
pub mod report;
pub mod tree;

pub use engage::{Phase, PhaseOrder};
pub use events::{AxisEvent, AxisEventKind, AxisObserver};
pub use module::{AxisModule, Module};
pub use policy::{PolicyLocator, RegistryLocator};
pub use registry::ModuleRegistry;
pub use tree::{ChildKey, DescriptionTree, NodeId, NodeKind};
