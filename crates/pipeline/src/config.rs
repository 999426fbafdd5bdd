//! Pipeline configuration loaded from environment variables.
//!
//! The configuration is built once at the entry point and passed by
//! reference to every component. Nothing below this module reads the
//! environment.
//!
//! # Environment Variables
//!
//! ## Required for `export` and `translate-metafields`
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_ADMIN_TOKEN` - Admin API access token (HIGH PRIVILEGE)
//!
//! ## Required for `publish` and `resume` (set together)
//! - `NOTION_API_KEY` - Notion integration secret
//! - `NOTION_DATABASE_ID` - Target database id
//!
//! ## Optional
//! - `SHOPIFY_API_VERSION` - API version (default: 2025-07)
//! - `PORTER_OUTPUT_DIR` - Artifact directory (default: ./output)
//! - `PORTER_POLL_INTERVAL_MS` - Bulk status poll interval (default: 5000)
//! - `PORTER_TRANSLATION_BATCH_SIZE` - Ids per translation lookup (default: 200, max: 250)
//! - `PORTER_TRANSLATION_DELAY_MS` - Pause after each lookup batch (default: 300)
//! - `NOTION_VERSION` - `Notion-Version` header (default: 2022-06-28)
//! - `PORTER_PUBLISH_DELAY_MS` - Pause after each published row (default: 400)
//! - `PORTER_PUBLISH_RETRIES` - Attempts per row in `resume` (default: 3)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::retry::RetryPolicy;

const DEFAULT_API_VERSION: &str = "2025-07";
const DEFAULT_OUTPUT_DIR: &str = "./output";
const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Default number of ids per translation lookup.
pub const DEFAULT_TRANSLATION_BATCH_SIZE: usize = 200;
/// Remote ceiling for `translatableResourcesByIds(first:)`.
pub const MAX_TRANSLATION_BATCH_SIZE: usize = 250;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PorterConfig {
    /// Directory every artifact is read from and written to
    pub output_dir: PathBuf,
    /// Interval between bulk status polls
    pub poll_interval: Duration,
    /// Shopify Admin API configuration (absent when only joining files)
    pub shopify: Option<ShopifyConfig>,
    /// Metafield translation lookup settings
    pub translation: TranslationSettings,
    /// Notion configuration (absent unless publishing)
    pub notion: Option<NotionConfig>,
    /// Publish loop settings
    pub publish: PublishSettings,
}

/// Shopify Admin API configuration.
///
/// Implements `Debug` manually to redact the HIGH PRIVILEGE token.
#[derive(Clone)]
pub struct ShopifyConfig {
    /// Shopify store domain (e.g., your-store.myshopify.com)
    pub store: String,
    /// Shopify API version (e.g., 2025-07)
    pub api_version: String,
    /// Admin API access token (HIGH PRIVILEGE - full store access)
    pub access_token: SecretString,
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl ShopifyConfig {
    /// GraphQL endpoint for this store and API version.
    #[must_use]
    pub fn graphql_endpoint(&self) -> String {
        format!(
            "https://{}/admin/api/{}/graphql.json",
            self.store, self.api_version
        )
    }
}

/// Notion API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct NotionConfig {
    /// Notion integration secret
    pub api_key: SecretString,
    /// Target database id
    pub database_id: String,
    /// `Notion-Version` header value
    pub version: String,
}

impl std::fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionConfig")
            .field("api_key", &"[REDACTED]")
            .field("database_id", &self.database_id)
            .field("version", &self.version)
            .finish()
    }
}

/// Metafield translation lookup settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationSettings {
    /// Ids per lookup call
    pub batch_size: usize,
    /// Fixed pause after every batch
    pub delay: Duration,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_TRANSLATION_BATCH_SIZE,
            delay: Duration::from_millis(300),
        }
    }
}

/// Publish loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishSettings {
    /// Fixed pause after every row
    pub delay: Duration,
    /// Retry policy for the resume pass
    pub retry: RetryPolicy,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(400),
            retry: RetryPolicy::default(),
        }
    }
}

impl PorterConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or a pair of
    /// variables that must be set together is only half set.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`PorterConfig::from_env`].
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let output_dir = PathBuf::from(
            var("PORTER_OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
        );
        let poll_interval = Duration::from_millis(parse_or(
            &var,
            "PORTER_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL_MS,
        )?);

        let shopify = match (var("SHOPIFY_STORE"), var("SHOPIFY_ADMIN_TOKEN")) {
            (Some(store), Some(token)) => Some(ShopifyConfig {
                store,
                api_version: var("SHOPIFY_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
                access_token: SecretString::from(token),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidEnvVar(
                    "SHOPIFY_*".to_string(),
                    "Both SHOPIFY_STORE and SHOPIFY_ADMIN_TOKEN must be set together"
                        .to_string(),
                ));
            }
        };

        let batch_size = parse_or(
            &var,
            "PORTER_TRANSLATION_BATCH_SIZE",
            DEFAULT_TRANSLATION_BATCH_SIZE,
        )?;
        if batch_size == 0 || batch_size > MAX_TRANSLATION_BATCH_SIZE {
            return Err(ConfigError::InvalidEnvVar(
                "PORTER_TRANSLATION_BATCH_SIZE".to_string(),
                format!("must be between 1 and {MAX_TRANSLATION_BATCH_SIZE}"),
            ));
        }
        let translation = TranslationSettings {
            batch_size,
            delay: Duration::from_millis(parse_or(&var, "PORTER_TRANSLATION_DELAY_MS", 300)?),
        };

        let notion = match (var("NOTION_API_KEY"), var("NOTION_DATABASE_ID")) {
            (Some(key), Some(database_id)) => Some(NotionConfig {
                api_key: SecretString::from(key),
                database_id,
                version: var("NOTION_VERSION")
                    .unwrap_or_else(|| DEFAULT_NOTION_VERSION.to_string()),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidEnvVar(
                    "NOTION_*".to_string(),
                    "Both NOTION_API_KEY and NOTION_DATABASE_ID must be set together".to_string(),
                ));
            }
        };

        let publish = PublishSettings {
            delay: Duration::from_millis(parse_or(&var, "PORTER_PUBLISH_DELAY_MS", 400)?),
            retry: RetryPolicy {
                retries: parse_or(&var, "PORTER_PUBLISH_RETRIES", RetryPolicy::default().retries)?,
                ..RetryPolicy::default()
            },
        };

        Ok(Self {
            output_dir,
            poll_interval,
            shopify,
            translation,
            notion,
            publish,
        })
    }

    /// Returns the Shopify configuration, or an error naming what is missing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if the Shopify variables were not set.
    pub fn shopify(&self) -> Result<&ShopifyConfig, ConfigError> {
        self.shopify
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("SHOPIFY_STORE".to_string()))
    }

    /// Returns the Notion configuration, or an error naming what is missing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if the Notion variables were not set.
    pub fn notion(&self) -> Result<&NotionConfig, ConfigError> {
        self.notion
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("NOTION_API_KEY".to_string()))
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
