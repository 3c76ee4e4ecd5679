//! Field validation for feedback submissions.
//!
//! The reconciler trusts its input, so anything that accepts values from a
//! person (the CLI, an embedding UI) runs them through this module first.
//!
//! # Example
//!
//! ```
//! use feedbox::FeedbackValues;
//!
//! let values = FeedbackValues::new("A", "not-an-email", "short");
//! let err = values.validate().unwrap_err();
//! assert!(err.is_validation());
//! ```

mod rules;

use serde::Serialize;
use tracing::debug;

pub use rules::{builtin_rules, FieldRule, MIN_MESSAGE_LENGTH, MIN_NAME_LENGTH};

use crate::error::{Error, Result};
use crate::feedback::FeedbackValues;

/// A submission field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// The submitter's name.
    Name,
    /// The submitter's email address.
    Email,
    /// The feedback message.
    Message,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Email => write!(f, "email"),
            Self::Message => write!(f, "message"),
        }
    }
}

/// A failed rule for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// The offending field.
    pub field: Field,
    /// Human-readable reason.
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    #[must_use]
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validates submissions against a set of field rules.
#[derive(Debug)]
pub struct Validator {
    rules: Vec<FieldRule>,
}

impl Validator {
    /// Create a validator with the built-in rules.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }

    /// Check every rule and collect all failures.
    #[must_use]
    pub fn check(&self, values: &FeedbackValues) -> Vec<FieldError> {
        self.rules
            .iter()
            .filter(|rule| !rule.accepts(field_value(values, rule.field)))
            .map(|rule| FieldError::new(rule.field, rule.message))
            .collect()
    }

    /// Validate the values, failing with every violated rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if any rule fails.
    pub fn validate(&self, values: &FeedbackValues) -> Result<()> {
        let errors = self.check(values);
        if errors.is_empty() {
            Ok(())
        } else {
            debug!(failures = errors.len(), "Feedback values rejected");
            Err(Error::Validation(errors))
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn field_value(values: &FeedbackValues, field: Field) -> &str {
    match field {
        Field::Name => &values.name,
        Field::Email => &values.email,
        Field::Message => &values.message,
    }
}

impl FeedbackValues {
    /// Validate these values with the built-in rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every failed rule.
    pub fn validate(&self) -> Result<()> {
        Validator::new().validate(self)
    }

    /// Trim surrounding whitespace from every field.
    #[must_use]
    pub fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            message: self.message.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_values_pass() {
        let values = FeedbackValues::new("A.", "a@x.com", "1234567890");
        assert!(values.validate().is_ok());
    }

    #[test]
    fn test_every_failure_is_reported() {
        let values = FeedbackValues::new("", "nope", "short");
        let errors = Validator::new().check(&values);

        let fields: Vec<Field> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![Field::Name, Field::Email, Field::Message]);
    }

    #[test]
    fn test_validate_returns_validation_error() {
        let values = FeedbackValues::new("Jane", "jane@example.com", "too short");
        match values.validate() {
            Err(Error::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, Field::Message);
                assert!(errors[0].message.contains("10 characters"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_field_error_display() {
        let err = FieldError::new(Field::Email, "Please enter a valid email address");
        assert_eq!(err.to_string(), "email: Please enter a valid email address");
    }

    #[test]
    fn test_trimmed() {
        let values = FeedbackValues::new("  Jane ", " jane@example.com\n", "\tHello there!  ");
        let trimmed = values.trimmed();
        assert_eq!(trimmed.name, "Jane");
        assert_eq!(trimmed.email, "jane@example.com");
        assert_eq!(trimmed.message, "Hello there!");
    }
}
