//! Fault taxonomy shared by both ends of a call.
//!
//! A fault travels over the wire as a kind name and a message. The two ends
//! are not guaranteed to share a taxonomy, so kind names are resolved through
//! a fixed table with [`FaultKind::Other`] as the fallback for anything
//! unrecognized.

use std::fmt;

use thiserror::Error;

/// Kind of a fault raised by a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// No procedure is registered under the requested name.
    Lookup,
    /// Arguments were missing, duplicated, or of the wrong type.
    Argument,
    /// An argument had the right type but an unacceptable value.
    Value,
    /// Generic failure reported by the procedure itself.
    Application,
    /// The procedure panicked.
    Panic,
    /// A kind this side does not know about.
    Other(String),
}

impl FaultKind {
    /// Returns the wire name for this kind.
    pub fn name(&self) -> &str {
        match self {
            Self::Lookup => "LookupFault",
            Self::Argument => "ArgumentFault",
            Self::Value => "ValueFault",
            Self::Application => "ApplicationFault",
            Self::Panic => "PanicFault",
            Self::Other(name) => name,
        }
    }

    /// Resolves a wire name to a kind.
    ///
    /// Besides the native names this accepts the kind names emitted by the
    /// Python servers speaking the same protocol.
    pub fn from_name(name: &str) -> Self {
        match name {
            "LookupFault" | "LookupError" | "KeyError" => Self::Lookup,
            "ArgumentFault" | "TypeError" => Self::Argument,
            "ValueFault" | "ValueError" => Self::Value,
            "ApplicationFault" | "Exception" | "RuntimeError" => Self::Application,
            "PanicFault" => Self::Panic,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true if this kind was not found in the local table.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fault raised by a procedure, or reconstructed from an error reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    kind: FaultKind,
    message: String,
}

impl Fault {
    /// Creates a fault of the given kind.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Rebuilds a fault from the `exc_type` and `message` of an error reply.
    pub fn from_wire(exc_type: &str, message: impl Into<String>) -> Self {
        Self::new(FaultKind::from_name(exc_type), message)
    }

    /// Creates a lookup fault for an unregistered procedure name.
    pub fn lookup(name: &str) -> Self {
        Self::new(
            FaultKind::Lookup,
            format!("no procedure registered under '{name}'"),
        )
    }

    /// Creates an argument fault.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Argument, message)
    }

    /// Creates a value fault.
    pub fn value(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Value, message)
    }

    /// Creates a generic application fault.
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Application, message)
    }

    /// Creates a fault describing a panic in a procedure.
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Panic, message)
    }

    /// Returns the fault kind.
    pub fn kind(&self) -> &FaultKind {
        &self.kind
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_names_resolve_to_themselves() {
        for kind in [
            FaultKind::Lookup,
            FaultKind::Argument,
            FaultKind::Value,
            FaultKind::Application,
            FaultKind::Panic,
        ] {
            assert_eq!(FaultKind::from_name(kind.name()), kind);
        }
    }

    #[test]
    fn python_names_map_to_local_kinds() {
        assert_eq!(FaultKind::from_name("KeyError"), FaultKind::Lookup);
        assert_eq!(FaultKind::from_name("TypeError"), FaultKind::Argument);
        assert_eq!(FaultKind::from_name("ValueError"), FaultKind::Value);
        assert_eq!(FaultKind::from_name("Exception"), FaultKind::Application);
    }

    #[test]
    fn unknown_kind_falls_back_with_name_preserved() {
        let fault = Fault::from_wire("ZeroDivisionError", "division by zero");
        assert!(fault.kind().is_unknown());
        assert_eq!(fault.kind().name(), "ZeroDivisionError");
        assert_eq!(fault.to_string(), "ZeroDivisionError: division by zero");
    }

    #[test]
    fn lookup_fault_names_the_procedure() {
        let fault = Fault::lookup("missing");
        assert_eq!(fault.kind(), &FaultKind::Lookup);
        assert!(fault.message().contains("'missing'"));
    }
}
