//! Built-in field rules for feedback submissions.

use regex::Regex;

use super::Field;

/// Minimum number of characters in a name.
pub const MIN_NAME_LENGTH: usize = 2;

/// Minimum number of characters in a message.
pub const MIN_MESSAGE_LENGTH: usize = 10;

/// What a rule checks.
#[derive(Debug)]
enum Check {
    /// At least this many characters after trimming.
    MinChars(usize),
    /// The trimmed value must match the regex.
    Pattern(Regex),
}

/// A single validation rule for one field.
#[derive(Debug)]
pub struct FieldRule {
    /// The field this rule applies to.
    pub field: Field,

    /// Message reported when the rule fails.
    pub message: &'static str,

    check: Check,
}

impl FieldRule {
    /// A rule requiring a minimum character count.
    #[must_use]
    pub fn min_chars(field: Field, min: usize, message: &'static str) -> Self {
        Self {
            field,
            message,
            check: Check::MinChars(min),
        }
    }

    /// A rule requiring the value to match a regex.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    #[must_use]
    pub fn pattern(field: Field, pattern: &str, message: &'static str) -> Self {
        Self {
            field,
            message,
            check: Check::Pattern(Regex::new(pattern).expect("Invalid regex pattern")),
        }
    }

    /// Check whether a value satisfies this rule.
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        match &self.check {
            Check::MinChars(min) => value.chars().count() >= *min,
            Check::Pattern(regex) => regex.is_match(value),
        }
    }
}

/// Get the built-in rules, in the order they are reported.
#[must_use]
pub fn builtin_rules() -> Vec<FieldRule> {
    vec![
        FieldRule::min_chars(
            Field::Name,
            MIN_NAME_LENGTH,
            "Name must be at least 2 characters",
        ),
        FieldRule::pattern(
            Field::Email,
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
            "Please enter a valid email address",
        ),
        FieldRule::min_chars(
            Field::Message,
            MIN_MESSAGE_LENGTH,
            "Message must be at least 10 characters",
        ),
    ]
}
