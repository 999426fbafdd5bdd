//! GraphQL documents and response shapes for the Admin API calls the
//! pipeline makes.

use serde::Deserialize;

use product_porter_core::{BulkOperation, UserError};

/// Status of the store's single current bulk operation.
pub const CURRENT_BULK_OPERATION: &str =
    "{ currentBulkOperation { id status errorCode objectCount url createdAt } }";

/// Translations of a batch of resources for one locale.
///
/// `first` is the remote ceiling of 250 resources per call.
pub const TRANSLATABLE_RESOURCES_BY_IDS: &str = r"
query TranslatableResourcesByIds($ids: [ID!]!, $locale: String!) {
  translatableResourcesByIds(resourceIds: $ids, first: 250) {
    edges {
      node {
        resourceId
        translations(locale: $locale) {
          key
          value
          locale
        }
      }
    }
  }
}
";

/// Build the `bulkOperationRunQuery` mutation for `query`.
///
/// The query is embedded verbatim as a GraphQL block string, not escaped as
/// a JSON value. Only a literal `"""` inside it needs escaping to stay
/// inside the block.
#[must_use]
pub fn bulk_run_mutation(query: &str) -> String {
    let body = query.replace(r#"""""#, r#"\""""#);
    format!(
        "mutation {{\n  bulkOperationRunQuery(query: \"\"\"{body}\"\"\") {{\n    bulkOperation {{ id status }}\n    userErrors {{ field message }}\n  }}\n}}"
    )
}

/// Response of [`bulk_run_mutation`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRunResponse {
    pub bulk_operation_run_query: BulkRunPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRunPayload {
    #[serde(default)]
    pub bulk_operation: Option<SubmittedOperation>,
    #[serde(default)]
    pub user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
pub struct SubmittedOperation {
    pub id: String,
    pub status: product_porter_core::BulkOperationStatus,
}

/// Response of [`CURRENT_BULK_OPERATION`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentBulkOperationResponse {
    pub current_bulk_operation: Option<BulkOperation>,
}

/// Response of [`TRANSLATABLE_RESOURCES_BY_IDS`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatableResourcesResponse {
    pub translatable_resources_by_ids: TranslatableResourceConnection,
}

#[derive(Debug, Deserialize)]
pub struct TranslatableResourceConnection {
    #[serde(default)]
    pub edges: Vec<TranslatableResourceEdge>,
}

#[derive(Debug, Deserialize)]
pub struct TranslatableResourceEdge {
    pub node: TranslatableResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatableResource {
    pub resource_id: String,
    #[serde(default)]
    pub translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
pub struct Translation {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    pub locale: String,
}
