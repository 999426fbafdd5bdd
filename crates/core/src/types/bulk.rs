//! Bulk operation projection.
//!
//! A [`BulkOperation`] is a read-only snapshot of remote state returned by the
//! `currentBulkOperation` query. It is never mutated locally; every status
//! transition is observed by polling again.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Bulk operation status.
///
/// Maps to Shopify's `BulkOperationStatus` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkOperationStatus {
    #[default]
    Created,
    Running,
    Completed,
    Failed,
    Canceling,
    Canceled,
    Expired,
}

impl BulkOperationStatus {
    /// Whether no further transitions will be observed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Canceled | Self::Expired
        )
    }
}

impl fmt::Display for BulkOperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Canceling => "CANCELING",
            Self::Canceled => "CANCELED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(name)
    }
}

/// Snapshot of one asynchronous export job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperation {
    /// Opaque operation handle (`gid://shopify/BulkOperation/...`).
    pub id: String,
    pub status: BulkOperationStatus,
    /// Present only when the operation failed.
    #[serde(default)]
    pub error_code: Option<String>,
    /// Records written so far; non-decreasing while running.
    #[serde(default, deserialize_with = "deserialize_count")]
    pub object_count: u64,
    /// Download location of the JSONL result; present only when completed.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A validation error reported by a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    /// Path to the offending input field, if any.
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) if !field.is_empty() => write!(f, "{}: {}", field.join("."), self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// `objectCount` is an `UnsignedInt64` scalar, serialized as a string.
fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Option::<Count>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Count::Number(n)) => Ok(n),
        Some(Count::Text(s)) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!BulkOperationStatus::Created.is_terminal());
        assert!(!BulkOperationStatus::Running.is_terminal());
        assert!(!BulkOperationStatus::Canceling.is_terminal());
        assert!(BulkOperationStatus::Completed.is_terminal());
        assert!(BulkOperationStatus::Failed.is_terminal());
        assert!(BulkOperationStatus::Canceled.is_terminal());
        assert!(BulkOperationStatus::Expired.is_terminal());
    }

    #[test]
    fn test_operation_parses_string_count() {
        let op: BulkOperation = serde_json::from_value(serde_json::json!({
            "id": "gid://shopify/BulkOperation/1",
            "status": "RUNNING",
            "errorCode": null,
            "objectCount": "1523",
            "url": null,
            "createdAt": "2025-10-30T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(op.status, BulkOperationStatus::Running);
        assert_eq!(op.object_count, 1523);
        assert!(op.url.is_none());
        assert!(op.created_at.is_some());
    }

    #[test]
    fn test_operation_parses_numeric_and_missing_count() {
        let op: BulkOperation = serde_json::from_value(serde_json::json!({
            "id": "gid://shopify/BulkOperation/1",
            "status": "COMPLETED",
            "objectCount": 7,
            "url": "https://storage.example/result.jsonl"
        }))
        .unwrap();
        assert_eq!(op.object_count, 7);

        let op: BulkOperation = serde_json::from_value(serde_json::json!({
            "id": "gid://shopify/BulkOperation/2",
            "status": "CREATED",
            "objectCount": null
        }))
        .unwrap();
        assert_eq!(op.object_count, 0);
    }

    #[test]
    fn test_user_error_display() {
        let err = UserError {
            field: Some(vec!["query".to_string()]),
            message: "Invalid bulk query".to_string(),
        };
        assert_eq!(err.to_string(), "query: Invalid bulk query");

        let err = UserError {
            field: None,
            message: "A bulk operation is already in progress".to_string(),
        };
        assert_eq!(err.to_string(), "A bulk operation is already in progress");
    }
}
