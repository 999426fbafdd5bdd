//! Product Porter pipeline.
//!
//! Exports a Shopify catalog through bulk operations, joins the exported
//! artifacts into one consolidated document per product, and publishes rows
//! to Notion.
//!
//! # Stages
//!
//! 1. [`exports`] runs the bulk queries ([`bulk`]) and stores their results
//!    as JSON artifacts ([`download`], [`artifact`]).
//! 2. [`translate`] fetches metafield translations the bulk API cannot export.
//! 3. [`join`] assembles `products_full_with_i18n.json`.
//! 4. [`publish`] creates Notion pages and keeps a reject list for [`publish::resume`].
//!
//! Everything runs sequentially. Configuration is read once into a
//! [`config::PorterConfig`] and passed down explicitly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod artifact;
pub mod bulk;
pub mod config;
pub mod download;
pub mod exports;
pub mod join;
pub mod progress;
pub mod publish;
pub mod retry;
pub mod shopify;
pub mod translate;

pub use artifact::{ArtifactError, ArtifactStore, FsArtifactStore};
pub use config::{ConfigError, PorterConfig};
