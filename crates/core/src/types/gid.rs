//! Shopify global IDs and record classification.
//!
//! Bulk export output interleaves records of several kinds in one stream.
//! The resource type embedded in each `gid://shopify/<Type>/<id>` string is
//! the only reliable discriminator, so every record is classified once with
//! [`classify`] before any typed processing.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Scheme and namespace shared by every Admin API global ID.
pub const GID_PREFIX: &str = "gid://shopify/";

/// Errors that can occur when parsing a [`ShopifyGid`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GidError {
    /// The input does not start with `gid://shopify/`.
    #[error("global id must start with {GID_PREFIX}: {0}")]
    MissingPrefix(String),
    /// The resource type or the resource id segment is empty.
    #[error("global id must have the form {GID_PREFIX}<Type>/<id>: {0}")]
    Malformed(String),
}

/// A parsed Shopify global ID (`gid://shopify/Product/123`).
///
/// # Example
///
/// ```rust
/// # use product_porter_core::{RecordKind, ShopifyGid};
/// let gid = ShopifyGid::parse("gid://shopify/ProductVariant/42").unwrap();
/// assert_eq!(gid.resource(), "ProductVariant");
/// assert_eq!(gid.local_id(), "42");
/// assert_eq!(gid.kind(), RecordKind::Variant);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShopifyGid {
    resource: String,
    local_id: String,
}

impl ShopifyGid {
    /// Parse a global ID string.
    ///
    /// # Errors
    ///
    /// Returns [`GidError`] if the prefix is missing or a segment is empty.
    pub fn parse(s: &str) -> Result<Self, GidError> {
        let rest = s
            .strip_prefix(GID_PREFIX)
            .ok_or_else(|| GidError::MissingPrefix(s.to_string()))?;
        let (resource, local_id) = rest
            .split_once('/')
            .ok_or_else(|| GidError::Malformed(s.to_string()))?;
        if resource.is_empty() || local_id.is_empty() {
            return Err(GidError::Malformed(s.to_string()));
        }
        Ok(Self {
            resource: resource.to_string(),
            local_id: local_id.to_string(),
        })
    }

    /// The resource type segment (e.g. `Product`).
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The resource-local id segment.
    #[must_use]
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// The record kind this id denotes.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        RecordKind::from_resource(&self.resource)
    }
}

impl fmt::Display for ShopifyGid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{GID_PREFIX}{}/{}", self.resource, self.local_id)
    }
}

impl TryFrom<String> for ShopifyGid {
    type Error = GidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShopifyGid> for String {
    fn from(gid: ShopifyGid) -> Self {
        gid.to_string()
    }
}

/// The kind of record an export line carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A top-level product.
    Product,
    /// A product variant (child of a product).
    Variant,
    /// A product option such as "Color" (child of a product).
    ProductOption,
    /// A value of a product option (child of an option).
    ProductOptionValue,
    /// A metafield (child of the owning resource).
    Metafield,
    /// A product image (child of a product).
    Image,
    /// A collection the product belongs to (child of a product).
    Collection,
    /// Anything else, including ids that are not Shopify global IDs.
    Other,
}

impl RecordKind {
    fn from_resource(resource: &str) -> Self {
        match resource {
            "Product" => Self::Product,
            "ProductVariant" => Self::Variant,
            "ProductOption" => Self::ProductOption,
            "ProductOptionValue" => Self::ProductOptionValue,
            "Metafield" => Self::Metafield,
            "ProductImage" => Self::Image,
            "Collection" => Self::Collection,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Product => "product",
            Self::Variant => "variant",
            Self::ProductOption => "product_option",
            Self::ProductOptionValue => "product_option_value",
            Self::Metafield => "metafield",
            Self::Image => "image",
            Self::Collection => "collection",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Classify a raw id string by its embedded resource type.
///
/// Never fails: anything that is not a well-formed global ID is
/// [`RecordKind::Other`].
#[must_use]
pub fn classify(id: &str) -> RecordKind {
    ShopifyGid::parse(id).map_or(RecordKind::Other, |gid| gid.kind())
}
