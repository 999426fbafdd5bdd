//! Shopify Admin API GraphQL client with access-token authentication.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::ShopifyConfig;

use super::{GraphQLError, ShopifyError};

/// Shopify Admin API GraphQL client.
///
/// Cheap to clone; clones share one connection pool.
///
/// # Security
///
/// This client carries an Admin API token with HIGH PRIVILEGE access to the
/// store. It is only ever used for read queries and bulk export jobs.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<AdminClientInner>,
}

struct AdminClientInner {
    client: reqwest::Client,
    store: String,
    endpoint: String,
    access_token: SecretString,
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("store", &self.inner.store)
            .field("endpoint", &self.inner.endpoint)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl AdminClient {
    /// Create a new Admin API client.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ShopifyConfig) -> Result<Self, ShopifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            inner: Arc::new(AdminClientInner {
                client,
                store: config.store.clone(),
                endpoint: config.graphql_endpoint(),
                access_token: config.access_token.clone(),
            }),
        })
    }

    /// Get the store domain.
    #[must_use]
    pub fn store(&self) -> &str {
        &self.inner.store
    }

    // =========================================================================
    // GraphQL Execution
    // =========================================================================

    /// Execute a GraphQL document.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::RateLimited` on HTTP 429 or a `THROTTLED` error.
    /// Returns `ShopifyError::Unauthorized` on HTTP 401.
    /// Returns `ShopifyError::Status` on any other non-success status.
    /// Returns `ShopifyError::GraphQL` if the response carries errors.
    /// Returns `ShopifyError::Http` on network failures.
    #[instrument(skip(self, query, variables), fields(store = %self.inner.store))]
    pub async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<T, ShopifyError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables.unwrap_or(serde_json::Value::Null)
        });

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("X-Shopify-Access-Token", self.inner.access_token.expose_secret())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(2);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        // Check for unauthorized
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShopifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let graphql_response: graphql_client::Response<T> = serde_json::from_str(&text)?;

        // Check for GraphQL errors
        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            if errors.iter().any(is_throttled) {
                debug!("Query cost exceeded the available bucket");
                return Err(ShopifyError::RateLimited(1));
            }
            return Err(ShopifyError::GraphQL(
                errors.into_iter().map(GraphQLError::from).collect(),
            ));
        }

        graphql_response.data.ok_or(ShopifyError::NoData)
    }
}

fn is_throttled(error: &graphql_client::Error) -> bool {
    error
        .extensions
        .as_ref()
        .and_then(|ext| ext.get("code"))
        .and_then(serde_json::Value::as_str)
        == Some("THROTTLED")
}
