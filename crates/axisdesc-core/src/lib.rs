//! axisdesc core: configuration primitives shared by the description engine.
//!
//! This crate defines the parameter store, the WS-Policy model (assertions,
//! alternatives, references, policy subjects, merging), module identity and
//! the error surface. It intentionally carries no tree or runtime logic so the
//! same types can be consumed by loaders, serializers and the engine alike.
//!
//! # Guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `AxisError`/`Result`; poisoned locks are
//! recovered because the guarded data is plain configuration.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod clock;
pub mod error;
pub mod module;
pub mod parameter;
pub mod policy;
pub mod wsdl;

/// Error surface re-exported at the crate root.
pub use error::{AxisError, ErrorCode, Fault, MessageKey, Result};
