//! Module identity: versions, archive names and handler declarations.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{AxisError, MessageKey, Result};
use crate::wsdl::Direction;

/// Dotted module version with an optional qualifier (`1.6.1-SNAPSHOT`).
/// Missing numeric components compare as zero; a qualified version sorts
/// before the plain release with the same numbers.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    components: Vec<u64>,
    qualifier: Option<String>,
}

impl Version {
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Version {
    type Err = AxisError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AxisError::fault(MessageKey::InvalidModuleVersion, [s]);
        let (numbers, qualifier) = match s.split_once('-') {
            Some((n, q)) if !q.is_empty() => (n, Some(q.to_string())),
            Some(_) => return Err(invalid()),
            None => (s, None),
        };
        if numbers.is_empty() {
            return Err(invalid());
        }
        let components = numbers
            .split('.')
            .map(|c| c.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Version {
            raw: s.to_string(),
            components,
            qualifier,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        match (&self.qualifier, &other.qualifier) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Whether `requested` may be engaged where `existing` already is.
/// An unversioned existing module accepts anything; otherwise the request
/// must carry a version that is equal or newer.
pub fn is_compatible(requested: Option<&Version>, existing: Option<&Version>) -> bool {
    match (requested, existing) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(r), Some(e)) => r >= e,
    }
}

/// `name` or `name-version`.
pub fn archive_name(name: &str, version: Option<&Version>) -> String {
    match version {
        Some(v) => format!("{name}-{v}"),
        None => name.to_string(),
    }
}

/// Split an archive name at the first `-` followed by a digit.
pub fn parse_archive_name(archive: &str) -> Result<(String, Option<Version>)> {
    let split = archive
        .char_indices()
        .find(|&(i, c)| c == '-' && archive[i + 1..].starts_with(|d: char| d.is_ascii_digit()));
    match split {
        Some((i, _)) => {
            let version = archive[i + 1..].parse()?;
            Ok((archive[..i].to_string(), Some(version)))
        }
        None => Ok((archive.to_string(), None)),
    }
}

/// A handler a module contributes to message flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDescription {
    pub name: String,
    pub phase: String,
    pub flow: Direction,
}

impl HandlerDescription {
    pub fn new(name: impl Into<String>, phase: impl Into<String>, flow: Direction) -> Self {
        Self {
            name: name.into(),
            phase: phase.into(),
            flow,
        }
    }
}
