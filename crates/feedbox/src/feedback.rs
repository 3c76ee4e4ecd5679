//! Core feedback types.
//!
//! A [`FeedbackRecord`] is created once and never mutated. It lives either in
//! the local pending queue or in the remote store, never both.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user-supplied fields of a feedback submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackValues {
    /// Name of the person leaving feedback.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// The feedback itself.
    pub message: String,
}

impl FeedbackValues {
    /// Create a new set of values.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            message: message.into(),
        }
    }
}

/// A single feedback entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    /// Store-assigned id for committed records, a UUID for queued ones.
    pub id: String,
    /// Name of the person leaving feedback.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// The feedback itself.
    pub message: String,
    /// When the record was created.
    #[serde(with = "rfc3339")]
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Synthesize a local record for the pending queue.
    ///
    /// The id is a fresh UUID v4 and the timestamp is the current time.
    #[must_use]
    pub fn local(values: FeedbackValues) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: values.name,
            email: values.email,
            message: values.message,
            created_at: Utc::now(),
        }
    }

    /// The submitted fields of this record, without id or timestamp.
    #[must_use]
    pub fn values(&self) -> FeedbackValues {
        FeedbackValues {
            name: self.name.clone(),
            email: self.email.clone(),
            message: self.message.clone(),
        }
    }

    /// The creation timestamp as an RFC 3339 string.
    #[must_use]
    pub fn created_at_rfc3339(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Case-insensitive substring match on name, email or message.
    ///
    /// An empty (or all-whitespace) term matches every record.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term)
            || self.email.to_lowercase().contains(&term)
            || self.message.to_lowercase().contains(&term)
    }
}

/// Filter records by a search term, keeping their order.
#[must_use]
pub fn search<'a>(records: &'a [FeedbackRecord], term: &str) -> Vec<&'a FeedbackRecord> {
    records.iter().filter(|record| record.matches(term)).collect()
}

/// Sort records newest-first by creation time.
pub fn sort_newest_first(records: &mut [FeedbackRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Result of a submission.
///
/// Lets the caller tell a record the remote store accepted from one that was
/// parked in the pending queue because the network was unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "record", rename_all = "snake_case")]
pub enum Submission {
    /// The remote store accepted the record.
    Committed(FeedbackRecord),
    /// The record was queued locally and will be flushed later.
    Queued(FeedbackRecord),
}

impl Submission {
    /// The record, whichever store owns it.
    #[must_use]
    pub fn record(&self) -> &FeedbackRecord {
        match self {
            Self::Committed(record) | Self::Queued(record) => record,
        }
    }

    /// Consume the submission and return the record.
    #[must_use]
    pub fn into_record(self) -> FeedbackRecord {
        match self {
            Self::Committed(record) | Self::Queued(record) => record,
        }
    }

    /// Check if the record is still waiting in the pending queue.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// Which store a deleted record was removed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Deletion {
    /// Removed from the local pending queue.
    Pending,
    /// Removed from the remote store.
    Remote,
}

impl std::fmt::Display for Deletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// RFC 3339 (de)serialization for timestamps.
///
/// Accepts any offset on input and normalizes to UTC.
pub(crate) mod rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Parse an RFC 3339 timestamp, tolerating a missing offset as UTC.
    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Ok(dt.with_timezone(&Utc)),
            Err(err) => chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|_| err),
        }
    }
}
