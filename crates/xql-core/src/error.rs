//! Error types for XQL
//!
//! Every failure raised by the tokenizer, the phase parsers, the generator and
//! the resolver is one [`Error`] carrying a stable code (`EF001`..`EF999`).

use thiserror::Error;

/// The main error type for XQL operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ========== Lexical / Syntactic Errors ==========
    #[error("Syntax error at position {0}")]
    SyntaxError(usize),

    #[error("Unpaired bracket at position {0}")]
    UnpairedBracket(usize),

    #[error("Unclosed single quote at position {0}")]
    UnclosedSingleQuote(usize),

    #[error("Unexpected end of expression")]
    UnexpectedExpressionEnd,

    // ========== Reference Errors ==========
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown entity alias: {0}")]
    UnknownEntityAlias(String),

    #[error("Unknown entity class: {0}")]
    UnknownEntityClass(String),

    #[error("Unknown property {property} on entity {entity}")]
    UnknownEntityProperty { entity: String, property: String },

    #[error("Invalid join alias: {0}")]
    InvalidJoinAlias(String),

    #[error("Unbound parameter: {0}")]
    UnboundParameter(String),

    #[error("Entity already registered: {0}")]
    DuplicateEntity(String),

    // ========== Data Integrity Errors ==========
    #[error("Primary key is null")]
    PrimaryKeyIsNull,

    #[error("Invalid enum value: {0}")]
    InvalidEnumValue(String),

    // ========== Resolution Errors ==========
    #[error("Unresolved link from {from} to {to}")]
    UnresolvedLink { from: String, to: String },

    // ========== Capability Errors ==========
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    // ========== Collaborator Errors ==========
    #[error("Database error: {0}")]
    Database(String),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for XQL operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable error code, safe to log without leaking type names
    pub fn code(&self) -> &'static str {
        match self {
            Error::SyntaxError(_) => "EF001",
            Error::UnpairedBracket(_) => "EF002",
            Error::UnclosedSingleQuote(_) => "EF003",
            Error::UnexpectedExpressionEnd => "EF004",
            Error::UnknownEntity(_) => "EF005",
            Error::UnknownEntityAlias(_) => "EF006",
            Error::UnknownEntityClass(_) => "EF007",
            Error::UnknownEntityProperty { .. } => "EF008",
            Error::InvalidJoinAlias(_) => "EF009",
            Error::PrimaryKeyIsNull => "EF010",
            Error::InvalidEnumValue(_) => "EF011",
            Error::UnresolvedLink { .. } => "EF012",
            Error::UnsupportedFeature(_) => "EF013",
            Error::UnboundParameter(_) => "EF014",
            Error::DuplicateEntity(_) => "EF015",
            Error::Database(_) => "EF500",
            Error::Internal(_) => "EF999",
        }
    }

    /// Returns true if the error was raised while tokenizing or parsing
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Error::SyntaxError(_)
                | Error::UnpairedBracket(_)
                | Error::UnclosedSingleQuote(_)
                | Error::UnexpectedExpressionEnd
        )
    }

    /// Returns true if the error is an unresolved name or link
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownEntity(_)
                | Error::UnknownEntityAlias(_)
                | Error::UnknownEntityClass(_)
                | Error::UnknownEntityProperty { .. }
                | Error::InvalidJoinAlias(_)
                | Error::UnresolvedLink { .. }
        )
    }

    /// Character position carried by positional errors
    pub fn position(&self) -> Option<usize> {
        match self {
            Error::SyntaxError(pos)
            | Error::UnpairedBracket(pos)
            | Error::UnclosedSingleQuote(pos) => Some(*pos),
            _ => None,
        }
    }

    /// Shorthand for [`Error::UnknownEntityProperty`]
    pub fn unknown_property(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Error::UnknownEntityProperty {
            entity: entity.into(),
            property: property.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnpairedBracket(22);
        assert_eq!(err.to_string(), "Unpaired bracket at position 22");

        let err = Error::unknown_property("projects", "owner");
        assert_eq!(err.to_string(), "Unknown property owner on entity projects");
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::SyntaxError(0).code(), "EF001");
        assert_eq!(Error::UnexpectedExpressionEnd.code(), "EF004");
        assert_eq!(Error::InvalidJoinAlias("t".into()).code(), "EF009");
        assert_eq!(
            Error::UnresolvedLink {
                from: "projects".into(),
                to: "owner".into()
            }
            .code(),
            "EF012"
        );
        assert_eq!(Error::Internal("x".into()).code(), "EF999");
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::UnclosedSingleQuote(3).is_parse_error());
        assert!(!Error::PrimaryKeyIsNull.is_parse_error());
        assert!(Error::UnknownEntityAlias("x".into()).is_reference_error());
        assert!(!Error::SyntaxError(1).is_reference_error());
    }

    #[test]
    fn test_error_position() {
        assert_eq!(Error::SyntaxError(7).position(), Some(7));
        assert_eq!(Error::UnexpectedExpressionEnd.position(), None);
    }
}
