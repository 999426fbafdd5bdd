//! Shopify Admin API client (HIGH PRIVILEGE).
//!
//! # Security
//!
//! **CRITICAL: This module holds the high-privilege Admin API access token.**
//!
//! Only the bulk operation and translation read paths are used; nothing here
//! mutates store data besides starting bulk export jobs.
//!
//! # Architecture
//!
//! - Raw GraphQL documents in [`queries`], posted with `reqwest`
//! - Responses decoded through `graphql_client::Response`
//! - Rate limiting surfaced as [`ShopifyError::RateLimited`]; callers decide
//!   whether to retry
//!
//! # Example
//!
//! ```rust,ignore
//! use product_porter_pipeline::shopify::AdminClient;
//!
//! let client = AdminClient::new(config.shopify()?)?;
//! let op: CurrentBulkOperation = client.execute(queries::CURRENT_BULK_OPERATION, None).await?;
//! ```

mod client;
pub mod queries;

pub use client::AdminClient;

use thiserror::Error;

use crate::retry::{Retryable, is_retryable_status};

/// Errors that can occur when interacting with Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The response carried neither data nor errors.
    #[error("No data in response")]
    NoData,
}

impl Retryable for ShopifyError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Status { status, .. } => is_retryable_status(*status),
            Self::Http(e) => e.status().is_some_and(|s| is_retryable_status(s.as_u16())),
            _ => false,
        }
    }
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<String>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i32,
    /// Column number (1-indexed).
    pub column: i32,
}

impl From<graphql_client::Error> for GraphQLError {
    fn from(e: graphql_client::Error) -> Self {
        Self {
            message: e.message,
            locations: e
                .locations
                .unwrap_or_default()
                .into_iter()
                .map(|l| GraphQLErrorLocation {
                    line: l.line,
                    column: l.column,
                })
                .collect(),
            path: e
                .path
                .unwrap_or_default()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_formatting() {
        let errors = vec![
            GraphQLError {
                message: "Field 'variant' doesn't exist".to_string(),
                locations: vec![],
                path: vec![],
            },
            GraphQLError {
                message: "Invalid ID".to_string(),
                locations: vec![],
                path: vec![],
            },
        ];
        let err = ShopifyError::GraphQL(errors);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Field 'variant' doesn't exist; Invalid ID"
        );
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ShopifyError::RateLimited(2);
        assert_eq!(err.to_string(), "Rate limited, retry after 2 seconds");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_status_retryability() {
        let server = ShopifyError::Status {
            status: 502,
            body: "Bad Gateway".to_string(),
        };
        let client = ShopifyError::Status {
            status: 422,
            body: "Unprocessable".to_string(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!ShopifyError::Unauthorized("expired".to_string()).is_retryable());
        assert!(!ShopifyError::NoData.is_retryable());
    }
}
