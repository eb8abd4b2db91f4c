//! Top-level facade crate for axisdesc.
//!
//! Re-exports the core model and the description engine so users can depend on a single crate.

pub mod core {
    pub use axisdesc_core::*;
}

pub mod engine {
    pub use axisdesc_engine::*;
}
