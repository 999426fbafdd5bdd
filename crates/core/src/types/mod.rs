//! Core types for Product Porter.
//!
//! This module provides typed views over Shopify bulk export output and the
//! consolidated product document built from it.

pub mod bulk;
pub mod entity;
pub mod gid;
pub mod record;
pub mod translation;

pub use bulk::{BulkOperation, BulkOperationStatus, UserError};
pub use entity::{
    ConsolidatedEntity, DEFAULT_LOCALES, I18n, MetafieldEntry, SelectedOption, Variant,
    compare_sku,
};
pub use gid::{GidError, RecordKind, ShopifyGid, classify};
pub use record::ExportRecord;
pub use translation::{TranslationFact, TranslationRow, stringify};
