//! WS-Policy data model in normal form.
//!
//! A [`Policy`] is a list of alternatives; satisfying the policy means
//! satisfying every assertion of one alternative. Alternative order is
//! significant: engagement always uses the first one.

use std::fmt;
use std::sync::Arc;

/// Namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// QName without namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new("", local)
    }

    /// Parses Clark notation (`{ns}local`) or a bare local name.
    pub fn parse(s: &str) -> Self {
        if let Some(rest) = s.strip_prefix('{') {
            if let Some((ns, local)) = rest.split_once('}') {
                return Self::new(ns, local);
            }
        }
        Self::local(s)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// A single requirement inside an alternative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Assertion {
    pub name: QName,
    pub optional: bool,
}

impl Assertion {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            optional: false,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.name.namespace
    }
}

/// One policy alternative: a set of assertions, kept in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Alternative {
    assertions: Vec<Assertion>,
}

impl Alternative {
    pub fn new(assertions: impl IntoIterator<Item = Assertion>) -> Self {
        let mut alt = Alternative::default();
        for a in assertions {
            alt.push(a);
        }
        alt
    }

    /// Adds the assertion unless an equal one is already present.
    pub fn push(&mut self, assertion: Assertion) {
        if !self.assertions.contains(&assertion) {
            self.assertions.push(assertion);
        }
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// Union of both assertion sets, `self` first.
    pub fn combine(&self, other: &Alternative) -> Alternative {
        let mut out = self.clone();
        for a in &other.assertions {
            out.push(a.clone());
        }
        out
    }
}

/// A normalized policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    name: Option<String>,
    id: Option<String>,
    alternatives: Vec<Alternative>,
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy {
    /// The empty policy: one alternative with no assertions.
    pub fn new() -> Self {
        Self {
            name: None,
            id: None,
            alternatives: vec![Alternative::default()],
        }
    }

    /// A policy with no alternatives; nothing can satisfy it.
    pub fn unsatisfiable() -> Self {
        Self {
            name: None,
            id: None,
            alternatives: Vec::new(),
        }
    }

    pub fn from_alternatives(alternatives: impl IntoIterator<Item = Alternative>) -> Self {
        Self {
            name: None,
            id: None,
            alternatives: alternatives.into_iter().collect(),
        }
    }

    /// Single-alternative policy.
    pub fn with_assertions(assertions: impl IntoIterator<Item = Assertion>) -> Self {
        Self::from_alternatives([Alternative::new(assertions)])
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    pub fn first_alternative(&self) -> Option<&Alternative> {
        self.alternatives.first()
    }

    /// Name, else id.
    pub fn key(&self) -> Option<&str> {
        self.name().or(self.id())
    }

    /// Label used in diagnostics.
    pub fn display_key(&self) -> &str {
        self.key().unwrap_or("<anonymous>")
    }

    /// Whether any alternative carries an assertion with this name.
    pub fn contains_assertion(&self, name: &QName) -> bool {
        self.alternatives
            .iter()
            .any(|alt| alt.assertions().iter().any(|a| &a.name == name))
    }

    /// Cross product of both alternative lists, `self` major. Associative,
    /// and the empty policy is its identity.
    pub fn merge(&self, other: &Policy) -> Policy {
        let mut alternatives = Vec::with_capacity(self.alternatives.len() * other.alternatives.len());
        for a in &self.alternatives {
            for b in &other.alternatives {
                alternatives.push(a.combine(b));
            }
        }
        Policy {
            name: None,
            id: None,
            alternatives,
        }
    }
}

/// Indirect pointer to a policy, resolved lazily.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyReference {
    uri: String,
}

impl PolicyReference {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The URI without a leading `#` (local references).
    pub fn local_key(&self) -> &str {
        self.uri.strip_prefix('#').unwrap_or(&self.uri)
    }
}

/// Anything attachable to a policy subject.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyComponent {
    Policy(Arc<Policy>),
    Reference(PolicyReference),
}

impl PolicyComponent {
    pub fn key(&self) -> Option<&str> {
        match self {
            PolicyComponent::Policy(p) => p.key(),
            PolicyComponent::Reference(r) => Some(r.uri()),
        }
    }
}

impl From<Policy> for PolicyComponent {
    fn from(p: Policy) -> Self {
        PolicyComponent::Policy(Arc::new(p))
    }
}

impl From<PolicyReference> for PolicyComponent {
    fn from(r: PolicyReference) -> Self {
        PolicyComponent::Reference(r)
    }
}
