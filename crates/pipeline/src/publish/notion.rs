//! Notion API client for creating database pages.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::NotionConfig;

use super::{PagePublisher, PublishError};

/// Notion API base URL.
const NOTION_API_BASE: &str = "https://api.notion.com/v1";

/// Creates pages in one Notion database.
#[derive(Clone)]
pub struct NotionClient {
    client: Client,
    api_key: SecretString,
    database_id: String,
    version: String,
    base_url: String,
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("api_key", &"[REDACTED]")
            .field("database_id", &self.database_id)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreatePage<'a> {
    parent: Parent<'a>,
    properties: &'a Value,
}

#[derive(Serialize)]
struct Parent<'a> {
    database_id: &'a str,
}

impl NotionClient {
    /// Create a client for the configured database.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Http` if the HTTP client cannot be built.
    pub fn new(config: &NotionConfig) -> Result<Self, PublishError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            database_id: config.database_id.clone(),
            version: config.version.clone(),
            base_url: NOTION_API_BASE.to_string(),
        })
    }

    /// Point the client at another API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn database_id(&self) -> &str {
        &self.database_id
    }
}

impl PagePublisher for NotionClient {
    #[instrument(skip(self, properties), fields(database = %self.database_id))]
    async fn create_page(&self, properties: &Value) -> Result<(), PublishError> {
        let body = CreatePage {
            parent: Parent {
                database_id: &self.database_id,
            },
            properties,
        };

        let response = self
            .client
            .post(format!("{}/pages", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .header("Notion-Version", &self.version)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Page created");
        Ok(())
    }
}
