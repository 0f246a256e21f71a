use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::term_set::{Status, TermSetId};
use crate::tree::MappingReport;

/// Links a source and a target schema through a mapping specification.
///
/// The names and versions are copied from the two roots when the record is
/// created so lookups do not have to walk the term tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationLedgerEntry {
    pub id: Uuid,
    pub source_schema: TermSetId,
    pub source_schema_name: String,
    pub source_schema_version: String,
    pub target_schema: TermSetId,
    pub target_schema_name: String,
    pub target_schema_version: String,
    /// Nested target-name → dotted source-path specification.
    pub schema_mapping: serde_json::Value,
    pub status: Status,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a transformation between two registered schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransformationInput {
    /// iri of the source schema root, e.g. `xss:1.0.0@source`.
    pub source_schema: String,
    /// iri of the target schema root.
    pub target_schema: String,
    pub schema_mapping: serde_json::Value,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// Input for replacing the mapping of an existing transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMappingInput {
    pub schema_mapping: serde_json::Value,
}

/// A stored transformation together with the outcome of walking its mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationResult {
    pub transformation: TransformationLedgerEntry,
    pub report: MappingReport,
}
