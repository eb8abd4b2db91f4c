//! Shared error type across axisdesc crates.
//!
//! Configuration errors are catalog driven: a [`Fault`] carries a stable
//! message key plus substitution arguments, and renders the catalog template
//! when displayed.

use std::fmt;

use thiserror::Error;

/// Stable error codes (one per error family).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Locked parameters, missing modules, version conflicts, unsupported assertions.
    Configuration,
    /// Operation not supported by this node kind.
    UnsupportedOperation,
    /// Malformed deployment descriptor.
    BadDescriptor,
    /// Broken internal invariant (unknown node handle, ...).
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Configuration => "CONFIGURATION",
            ErrorCode::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ErrorCode::BadDescriptor => "BAD_DESCRIPTOR",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Message catalog keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    ParameterLockedByParent,
    MismatchedModuleVersions,
    NoPolicyAlternatives,
    AssertionNotSupported,
    UnresolvedPolicyReference,
    UnkeyedChild,
    ParentAlreadySet,
    CyclicChild,
    InvalidPhase,
    ModuleNotFound,
    EngagementRefused,
    EngagementInProgress,
    InvalidModuleVersion,
    AlreadyLinked,
}

impl MessageKey {
    /// Catalog key.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKey::ParameterLockedByParent => "paramterlockedbyparent",
            MessageKey::MismatchedModuleVersions => "mismatchedModuleVersions",
            MessageKey::NoPolicyAlternatives => "policyNoAlternatives",
            MessageKey::AssertionNotSupported => "assertionNotSupported",
            MessageKey::UnresolvedPolicyReference => "policyReferenceUnresolved",
            MessageKey::UnkeyedChild => "unkeyedChild",
            MessageKey::ParentAlreadySet => "parentAlreadySet",
            MessageKey::CyclicChild => "cyclicChild",
            MessageKey::InvalidPhase => "invalidPhase",
            MessageKey::ModuleNotFound => "moduleNotFound",
            MessageKey::EngagementRefused => "engagementRefused",
            MessageKey::EngagementInProgress => "engagementInProgress",
            MessageKey::InvalidModuleVersion => "invalidModuleVersion",
            MessageKey::AlreadyLinked => "alreadyLinked",
        }
    }

    /// Catalog template; `{n}` is replaced by the n-th argument.
    pub fn template(self) -> &'static str {
        match self {
            MessageKey::ParameterLockedByParent => {
                "Parameter {0} is locked by a parent and cannot be overridden"
            }
            MessageKey::MismatchedModuleVersions => {
                "{0} already engages module {1} with version {2}, the requested version is incompatible"
            }
            MessageKey::NoPolicyAlternatives => "Policy {0} doesn't contain any policy alternatives",
            MessageKey::AssertionNotSupported => "Module {0} can't support assertion {1}",
            MessageKey::UnresolvedPolicyReference => {
                "Policy reference {0} could not be resolved from {1}"
            }
            MessageKey::UnkeyedChild => "{0} has no key and cannot be added as a child of {1}",
            MessageKey::ParentAlreadySet => "{0} already has a parent ({1})",
            MessageKey::CyclicChild => "{0} is an ancestor of {1} and cannot become its child",
            MessageKey::InvalidPhase => "Module {0} declares handler {1} in unknown phase {2}",
            MessageKey::ModuleNotFound => "Module {0} is not available",
            MessageKey::EngagementRefused => "Module {0} refused engagement on {1}: {2}",
            MessageKey::EngagementInProgress => {
                "Module {0} is already being engaged on {1} by this thread"
            }
            MessageKey::InvalidModuleVersion => "Invalid module version {0}",
            MessageKey::AlreadyLinked => "{0} is already linked to {1}",
        }
    }
}

/// A catalog-driven configuration fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub key: MessageKey,
    pub args: Vec<String>,
}

impl Fault {
    pub fn new<I, S>(key: MessageKey, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Render the catalog template with the substitution arguments.
    pub fn message(&self) -> String {
        let mut out = self.key.template().to_string();
        for (i, arg) in self.args.iter().enumerate() {
            out = out.replace(&format!("{{{i}}}"), arg);
        }
        out
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, AxisError>;

/// Unified error type used by core and engine.
#[derive(Debug, Error)]
pub enum AxisError {
    #[error("{0}")]
    Fault(Fault),
    #[error("{kind} does not support {operation}")]
    Unsupported {
        kind: &'static str,
        operation: &'static str,
    },
    #[error("bad descriptor: {0}")]
    BadDescriptor(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl AxisError {
    /// Shorthand for a catalog fault.
    pub fn fault<I, S>(key: MessageKey, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AxisError::Fault(Fault::new(key, args))
    }

    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            AxisError::Fault(_) => ErrorCode::Configuration,
            AxisError::Unsupported { .. } => ErrorCode::UnsupportedOperation,
            AxisError::BadDescriptor(_) => ErrorCode::BadDescriptor,
            AxisError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Catalog key, if this is a configuration fault.
    pub fn message_key(&self) -> Option<MessageKey> {
        match self {
            AxisError::Fault(f) => Some(f.key),
            _ => None,
        }
    }
}

impl From<Fault> for AxisError {
    fn from(f: Fault) -> Self {
        AxisError::Fault(f)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fault_renders_template() {
        let f = Fault::new(MessageKey::ParameterLockedByParent, ["timeout"]);
        assert_eq!(
            f.to_string(),
            "Parameter timeout is locked by a parent and cannot be overridden"
        );
        assert_eq!(f.key.as_str(), "paramterlockedbyparent");
    }

    #[test]
    fn version_mismatch_names_all_arguments() {
        let e = AxisError::fault(
            MessageKey::MismatchedModuleVersions,
            ["Service", "addressing", "1.1"],
        );
        let msg = e.to_string();
        assert!(msg.contains("Service"));
        assert!(msg.contains("addressing"));
        assert!(msg.contains("1.1"));
        assert_eq!(e.code().as_str(), "CONFIGURATION");
    }

    #[test]
    fn unsupported_is_distinct_from_configuration() {
        let e = AxisError::Unsupported {
            kind: "Binding",
            operation: "engage_module",
        };
        assert_eq!(e.code(), ErrorCode::UnsupportedOperation);
        assert!(e.message_key().is_none());
    }
}
