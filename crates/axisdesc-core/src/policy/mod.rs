//! WS-Policy layer (model, attachment, merging).
//!
//! Nodes attach policies or references to a [`PolicySubject`]; the engine
//! merges the subjects along a node's axis with a [`PolicyMerger`] to obtain
//! the effective policy.

pub mod merge;
pub mod model;
pub mod subject;

pub use merge::{AlternativeMerger, PolicyMerger, ReferenceResolver};
pub use model::{Alternative, Assertion, Policy, PolicyComponent, PolicyReference, QName};
pub use subject::PolicySubject;
