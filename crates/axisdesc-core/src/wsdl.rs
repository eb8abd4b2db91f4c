//! WSDL constants: message exchange patterns, directions and message labels.

use std::fmt;
use std::str::FromStr;

use crate::error::{AxisError, Result};

pub const MESSAGE_LABEL_IN: &str = "In";
pub const MESSAGE_LABEL_OUT: &str = "Out";

/// Message direction relative to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// The message label conventionally used for this direction.
    pub fn label(self) -> &'static str {
        match self {
            Direction::In => MESSAGE_LABEL_IN,
            Direction::Out => MESSAGE_LABEL_OUT,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = AxisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in" | "In" => Ok(Direction::In),
            "out" | "Out" => Ok(Direction::Out),
            other => Err(AxisError::BadDescriptor(format!("unknown direction: {other}"))),
        }
    }
}

/// WSDL 2.0 message exchange patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mep {
    InOnly,
    RobustInOnly,
    #[default]
    InOut,
    InOptionalOut,
    OutOnly,
    RobustOutOnly,
    OutIn,
    OutOptionalIn,
}

impl Mep {
    pub fn uri(self) -> &'static str {
        match self {
            Mep::InOnly => "http://www.w3.org/ns/wsdl/in-only",
            Mep::RobustInOnly => "http://www.w3.org/ns/wsdl/robust-in-only",
            Mep::InOut => "http://www.w3.org/ns/wsdl/in-out",
            Mep::InOptionalOut => "http://www.w3.org/ns/wsdl/in-opt-out",
            Mep::OutOnly => "http://www.w3.org/ns/wsdl/out-only",
            Mep::RobustOutOnly => "http://www.w3.org/ns/wsdl/robust-out-only",
            Mep::OutIn => "http://www.w3.org/ns/wsdl/out-in",
            Mep::OutOptionalIn => "http://www.w3.org/ns/wsdl/out-opt-in",
        }
    }

    /// Accepts a full MEP URI or its trailing short name (`in-out`).
    pub fn parse(s: &str) -> Option<Mep> {
        let short = s.rsplit('/').next().unwrap_or(s);
        match short {
            "in-only" => Some(Mep::InOnly),
            "robust-in-only" => Some(Mep::RobustInOnly),
            "in-out" => Some(Mep::InOut),
            "in-opt-out" => Some(Mep::InOptionalOut),
            "out-only" => Some(Mep::OutOnly),
            "robust-out-only" => Some(Mep::RobustOutOnly),
            "out-in" => Some(Mep::OutIn),
            "out-opt-in" => Some(Mep::OutOptionalIn),
            _ => None,
        }
    }

    /// Whether the pattern carries an inbound message.
    pub fn has_input(self) -> bool {
        !matches!(self, Mep::OutOnly | Mep::RobustOutOnly)
    }

    /// Whether the pattern carries an outbound message.
    pub fn has_output(self) -> bool {
        !matches!(self, Mep::InOnly | Mep::RobustInOnly)
    }

    pub fn has_direction(self, direction: Direction) -> bool {
        match direction {
            Direction::In => self.has_input(),
            Direction::Out => self.has_output(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_uri_and_short_name() {
        assert_eq!(Mep::parse("http://www.w3.org/ns/wsdl/in-only"), Some(Mep::InOnly));
        assert_eq!(Mep::parse("out-in"), Some(Mep::OutIn));
        assert_eq!(Mep::parse("sideways"), None);
    }

    #[test]
    fn direction_presence_follows_pattern() {
        assert!(Mep::InOut.has_input() && Mep::InOut.has_output());
        assert!(Mep::InOnly.has_input() && !Mep::InOnly.has_output());
        assert!(!Mep::OutOnly.has_direction(Direction::In));
        assert!(Mep::OutOptionalIn.has_direction(Direction::In));
    }
}
