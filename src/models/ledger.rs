use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::term_set::{Status, TermSetId};
use crate::tree::NestedMap;
use crate::version::Versioned;

/// The externally visible record of one uploaded schema definition.
///
/// Creating an entry flattens `metadata` into a term tree rooted at
/// `term_set`. The link is `None` only while that flattening has not run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaLedgerEntry {
    pub id: Uuid,
    pub schema_name: String,
    /// Same value as the root term set's iri.
    pub schema_iri: String,
    pub status: Status,
    pub major_version: u64,
    pub minor_version: u64,
    pub patch_version: u64,
    /// Dotted form of the three version components.
    pub version: String,
    /// The nested definition exactly as submitted.
    pub metadata: serde_json::Value,
    pub term_set: Option<TermSetId>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Versioned for SchemaLedgerEntry {
    fn version_str(&self) -> &str {
        &self.version
    }
}

/// Input for registering a schema definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSchemaInput {
    pub schema_name: String,
    /// `<major>.<minor>.<patch>`.
    pub version: String,
    /// Defaults to `Published`.
    #[serde(default)]
    pub status: Option<Status>,
    /// Nested field definition; must be a JSON object.
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// Input for changing the lifecycle status of a ledger entry or term set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusInput {
    pub status: Status,
}

/// The published shape of a schema, as served to readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedSchema {
    pub iri: String,
    pub name: String,
    pub version: String,
    pub schema: NestedMap,
}
