use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Database;
use crate::error::TreeError;
use crate::models::*;
use crate::tree::NestedMap;

// ============================================================
// Error Handling
// ============================================================

/// Map a service error to a response.
///
/// Tree errors describe bad input and are returned as-is with BAD_REQUEST.
/// Anything else is logged in full and the client gets a generic message.
fn internal_error(e: anyhow::Error) -> (StatusCode, String) {
    if let Some(err) = e.downcast_ref::<TreeError>() {
        if err.is_client_error() {
            tracing::warn!("Validation error: {}", err);
            return (StatusCode::BAD_REQUEST, err.to_string());
        }
    }

    tracing::error!("Internal error: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Collect a message for every missing query parameter.
fn require_params(params: &[(&str, Option<&str>)]) -> Result<(), (StatusCode, String)> {
    let messages: Vec<String> = params
        .iter()
        .filter(|(_, value)| value.map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| format!("query parameter '{}' is required", name))
        .collect();

    if messages.is_empty() {
        Ok(())
    } else {
        tracing::warn!("Rejected request: {}", messages.join("; "));
        Err((StatusCode::BAD_REQUEST, messages.join("; ")))
    }
}

/// Who is making the change, from the optional `X-Actor` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor(pub Option<String>);

pub const ACTOR_HEADER: &str = "x-actor";

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Self(actor))
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Schemas
// ============================================================

#[derive(Debug, Deserialize)]
pub struct SchemaQuery {
    pub name: Option<String>,
    pub version: Option<String>,
}

pub async fn get_schema(
    State(db): State<Database>,
    Query(query): Query<SchemaQuery>,
) -> Result<Json<SchemaLedgerEntry>, (StatusCode, String)> {
    require_params(&[("name", query.name.as_deref())])?;
    let name = query.name.as_deref().unwrap_or_default();
    let version = query.version.as_deref().filter(|v| !v.is_empty());

    db.get_schema(name, version)
        .map(Json)
        .map_err(internal_error)
}

pub async fn create_schema(
    State(db): State<Database>,
    Actor(actor): Actor,
    Json(mut input): Json<CreateSchemaInput>,
) -> Result<(StatusCode, Json<SchemaLedgerEntry>), (StatusCode, String)> {
    input.updated_by = input.updated_by.or(actor);
    db.create_schema(input)
        .map(|entry| (StatusCode::CREATED, Json(entry)))
        .map_err(internal_error)
}

pub async fn get_schema_by_id(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<SchemaLedgerEntry>, (StatusCode, String)> {
    db.get_schema_by_id(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Schema not found".to_string()))
}

pub async fn update_schema_status(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(input): Json<UpdateStatusInput>,
) -> Result<Json<SchemaLedgerEntry>, (StatusCode, String)> {
    db.update_schema_status(id, input.status, actor.as_deref())
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Schema not found".to_string()))
}

pub async fn export_schema(
    State(db): State<Database>,
    Query(query): Query<SchemaQuery>,
) -> Result<Json<ExportedSchema>, (StatusCode, String)> {
    require_params(&[("name", query.name.as_deref())])?;
    let name = query.name.as_deref().unwrap_or_default();
    let version = query.version.as_deref().filter(|v| !v.is_empty());

    db.export_schema(name, version)
        .map(Json)
        .map_err(internal_error)
}

// ============================================================
// Mappings
// ============================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingQuery {
    pub source_name: Option<String>,
    pub source_version: Option<String>,
    pub target_name: Option<String>,
    pub target_version: Option<String>,
}

pub async fn get_mapping(
    State(db): State<Database>,
    Query(query): Query<MappingQuery>,
) -> Result<Json<TransformationLedgerEntry>, (StatusCode, String)> {
    require_params(&[
        ("sourceName", query.source_name.as_deref()),
        ("sourceVersion", query.source_version.as_deref()),
        ("targetName", query.target_name.as_deref()),
        ("targetVersion", query.target_version.as_deref()),
    ])?;
    let source_name = query.source_name.as_deref().unwrap_or_default();
    let source_version = query.source_version.as_deref().unwrap_or_default();
    let target_name = query.target_name.as_deref().unwrap_or_default();
    let target_version = query.target_version.as_deref().unwrap_or_default();

    db.get_transformation(source_name, source_version, target_name, target_version)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!(
                    "no schema mapping found with the sourceName '{}', targetName '{}', \
                     sourceVersion '{}', targetVersion '{}'",
                    source_name, target_name, source_version, target_version
                ),
            )
        })
}

pub async fn create_mapping(
    State(db): State<Database>,
    Actor(actor): Actor,
    Json(mut input): Json<CreateTransformationInput>,
) -> Result<(StatusCode, Json<TransformationResult>), (StatusCode, String)> {
    input.updated_by = input.updated_by.or(actor);
    db.create_transformation(input)
        .map(|result| (StatusCode::CREATED, Json(result)))
        .map_err(internal_error)
}

pub async fn update_mapping(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateMappingInput>,
) -> Result<Json<TransformationResult>, (StatusCode, String)> {
    db.update_transformation_mapping(id, input.schema_mapping)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Mapping not found".to_string()))
}

// ============================================================
// Term sets
// ============================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedQuery {
    pub iri: Option<String>,
    pub target_root: Option<String>,
}

pub async fn mapped_terms(
    State(db): State<Database>,
    Query(query): Query<MappedQuery>,
) -> Result<Json<NestedMap>, (StatusCode, String)> {
    require_params(&[
        ("iri", query.iri.as_deref()),
        ("targetRoot", query.target_root.as_deref()),
    ])?;
    let iri = query.iri.as_deref().unwrap_or_default();
    let target_root = query.target_root.as_deref().unwrap_or_default();

    db.resolve_mapped_to(iri, target_root)
        .map(Json)
        .map_err(internal_error)
}

#[derive(Debug, Deserialize)]
pub struct TermSetStatusInput {
    pub iri: String,
    pub status: Status,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TermSetStatusResponse {
    pub iri: String,
    pub status: Status,
    /// Nodes whose status actually changed.
    pub changed: usize,
}

pub async fn set_term_set_status(
    State(db): State<Database>,
    Actor(actor): Actor,
    Json(input): Json<TermSetStatusInput>,
) -> Result<Json<TermSetStatusResponse>, (StatusCode, String)> {
    let changed = db
        .set_term_set_status(&input.iri, input.status, actor.as_deref())
        .map_err(internal_error)?;
    Ok(Json(TermSetStatusResponse {
        iri: input.iri,
        status: input.status,
        changed,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RenameInput {
    pub iri: String,
    pub name: String,
}

pub async fn rename_term_set(
    State(db): State<Database>,
    Json(input): Json<RenameInput>,
) -> Result<Json<TermSet>, (StatusCode, String)> {
    db.rename_term_set(&input.iri, &input.name)
        .map(Json)
        .map_err(internal_error)
}

pub async fn rename_term(
    State(db): State<Database>,
    Json(input): Json<RenameInput>,
) -> Result<Json<Term>, (StatusCode, String)> {
    db.rename_term(&input.iri, &input.name)
        .map(Json)
        .map_err(internal_error)
}

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    pub iri: Option<String>,
}

pub async fn term_set_tree(
    State(db): State<Database>,
    Query(query): Query<TreeQuery>,
) -> Result<String, (StatusCode, String)> {
    require_params(&[("iri", query.iri.as_deref())])?;
    db.term_set_tree(query.iri.as_deref().unwrap_or_default())
        .map_err(internal_error)
}
