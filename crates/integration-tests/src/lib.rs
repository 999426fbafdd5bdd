//! Integration tests for Product Porter.
//!
//! Every test runs the pipeline against a scratch output directory, with
//! scripted fakes standing in for Shopify and Notion. Nothing here touches
//! the network.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p product-porter-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `export_artifacts` - JSONL result streams to JSON artifacts
//! - `assemble_end_to_end` - Full joins over on-disk artifacts
//! - `metafield_translations` - Batched fetch feeding the join
//! - `publish_resume` - Publishing, reject lists and resume

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::TempDir;

use product_porter_core::ExportRecord;
use product_porter_pipeline::{ArtifactStore, FsArtifactStore};

/// A scratch output directory, removed on drop.
pub struct Workspace {
    dir: TempDir,
    store: FsArtifactStore,
}

impl Workspace {
    /// Create an empty output directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = FsArtifactStore::new(dir.path());
        Self { dir, store }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub const fn store(&self) -> &FsArtifactStore {
        &self.store
    }

    /// Write raw text as `name`.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_text(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write text artifact");
        path
    }

    /// Write one JSON value per line as `name`.
    pub fn write_jsonl(&self, name: &str, lines: &[Value]) -> PathBuf {
        let body: String = lines.iter().map(|line| format!("{line}\n")).collect();
        self.write_text(name, &body)
    }

    /// Save `value` through the artifact store.
    ///
    /// # Panics
    ///
    /// Panics if the artifact cannot be written.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> PathBuf {
        self.store.save(name, value).expect("save artifact")
    }

    /// Save export records as `name`.
    pub fn save_records(&self, name: &str, records: &[ExportRecord]) -> PathBuf {
        self.save(name, &records)
    }

    /// Load an artifact that must exist.
    ///
    /// # Panics
    ///
    /// Panics if the artifact is missing or unparseable.
    #[must_use]
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> T {
        self.store
            .try_load(name)
            .expect("parse artifact")
            .unwrap_or_else(|| panic!("artifact {name} missing"))
    }

    /// Whether `name` exists in the output directory.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Product gid for a numeric id.
#[must_use]
pub fn product(id: u32) -> String {
    format!("gid://shopify/Product/{id}")
}

/// Variant gid for a numeric id.
#[must_use]
pub fn variant(id: u32) -> String {
    format!("gid://shopify/ProductVariant/{id}")
}

/// Collection gid for a numeric id.
#[must_use]
pub fn collection(id: u32) -> String {
    format!("gid://shopify/Collection/{id}")
}

/// Metafield gid for a numeric id.
#[must_use]
pub fn metafield(id: u32) -> String {
    format!("gid://shopify/Metafield/{id}")
}
