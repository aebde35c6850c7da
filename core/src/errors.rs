//! Error types for the server-side pipeline.
//!
//! Every error is serializable so it can cross an HTTP or worker boundary
//! as plain JSON. No stage fabricates an error kind it does not own.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason taxonomy for request validation failures
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    Missing,
    WrongType,
    OutOfRange,
    NotBraille,
    TooLong,
    Inconsistent,
    UnknownField,
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationReason::Missing => "missing",
            ValidationReason::WrongType => "wrong_type",
            ValidationReason::OutOfRange => "out_of_range",
            ValidationReason::NotBraille => "not_braille",
            ValidationReason::TooLong => "too_long",
            ValidationReason::Inconsistent => "inconsistent",
            ValidationReason::UnknownField => "unknown_field",
        };
        write!(f, "{}", s)
    }
}

/// Rejection produced by the request validator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub reason: ValidationReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: ValidationReason) -> Self {
        ValidationError {
            field: field.into(),
            reason,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn missing(field: impl Into<String>) -> Self {
        ValidationError::new(field, ValidationReason::Missing)
    }

    pub fn wrong_type(field: impl Into<String>) -> Self {
        ValidationError::new(field, ValidationReason::WrongType)
    }

    pub fn out_of_range(field: impl Into<String>, detail: impl Into<String>) -> Self {
        ValidationError::new(field, ValidationReason::OutOfRange).with_detail(detail)
    }

    pub fn not_braille(field: impl Into<String>, detail: impl Into<String>) -> Self {
        ValidationError::new(field, ValidationReason::NotBraille).with_detail(detail)
    }

    pub fn too_long(field: impl Into<String>, detail: impl Into<String>) -> Self {
        ValidationError::new(field, ValidationReason::TooLong).with_detail(detail)
    }

    pub fn inconsistent(field: impl Into<String>, detail: impl Into<String>) -> Self {
        ValidationError::new(field, ValidationReason::Inconsistent).with_detail(detail)
    }

    pub fn unknown_field(field: impl Into<String>) -> Self {
        ValidationError::new(field, ValidationReason::UnknownField)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation_error: field '{}' {}", self.field, self.reason)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Failure produced by the spec extractor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum LayoutError {
    /// A cell landed outside the grid or off the physical surface.
    /// Never truncated silently.
    LayoutOverflow { row: usize, column: usize },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::LayoutOverflow { row, column } => {
                write!(f, "layout_overflow: row {} column {}", row, column)
            }
        }
    }
}

impl std::error::Error for LayoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&ValidationReason::NotBraille).unwrap();
        assert_eq!(json, "\"not_braille\"");
    }

    #[test]
    fn layout_overflow_serializes_with_code() {
        let err = LayoutError::LayoutOverflow { row: 0, column: 10 };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "layout_overflow");
        assert_eq!(json["row"], 0);
        assert_eq!(json["column"], 10);
    }

    #[test]
    fn validation_error_display_carries_field() {
        let err = ValidationError::out_of_range("cardWidth", "must be within [10, 500]");
        let text = err.to_string();
        assert!(text.contains("cardWidth"));
        assert!(text.contains("out_of_range"));
    }
}
