//! Validation errors raised before any upstream call is made.

use thiserror::Error;

/// Result alias for argument validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A tool argument set that failed its schema or a cross-field rule.
///
/// Every variant names the offending argument so the protocol client can
/// fix the call without guessing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The arguments were not a JSON object.
    #[error("arguments must be a JSON object")]
    NotAnObject,

    /// A required argument was absent or null.
    #[error("missing required argument `{field}`")]
    MissingField { field: String },

    /// An argument the tool does not declare.
    #[error("unknown argument `{field}`")]
    UnknownField { field: String },

    /// The JSON type of an argument did not match its declaration.
    #[error("argument `{field}` must be {expected}")]
    WrongType { field: String, expected: &'static str },

    /// A value outside an enumeration.
    #[error("argument `{field}` must be one of [{allowed}], got {value:?}")]
    NotInEnum {
        field: String,
        value: String,
        allowed: String,
    },

    /// A numeric or length bound was violated.
    #[error("argument `{field}` is out of range: {reason}")]
    OutOfRange { field: String, reason: String },

    /// A date that is not `YYYY-MM-DD`.
    #[error("argument `{field}` must be a date in YYYY-MM-DD format, got {value:?}")]
    InvalidDate { field: String, value: String },

    /// Arguments that are individually valid but inconsistent together.
    #[error("{message}")]
    InvalidCombination { message: String },
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn out_of_range(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn combination(message: impl Into<String>) -> Self {
        Self::InvalidCombination {
            message: message.into(),
        }
    }

    /// The argument this error refers to, if it refers to a single one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field }
            | Self::UnknownField { field }
            | Self::WrongType { field, .. }
            | Self::NotInEnum { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::InvalidDate { field, .. } => Some(field),
            Self::NotAnObject | Self::InvalidCombination { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_field() {
        let err = ValidationError::missing("place_id");
        assert_eq!(err.to_string(), "missing required argument `place_id`");
        assert_eq!(err.field(), Some("place_id"));

        let err = ValidationError::NotInEnum {
            field: "place_type".to_string(),
            value: "XX".to_string(),
            allowed: "PR, CTY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "argument `place_type` must be one of [PR, CTY], got \"XX\""
        );
    }

    #[test]
    fn test_combination_has_no_field() {
        let err = ValidationError::combination("begin after end");
        assert_eq!(err.field(), None);
        assert_eq!(err.to_string(), "begin after end");
    }
}
