mod schema;
mod store;

pub use store::SqlStore;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use serde_json::Value;
use uuid::Uuid;

use crate::error::TreeError;
use crate::models::*;
use crate::tree::{self, NestedMap, TermStore};
use crate::version::{latest_of, Version};

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "schema-ledger")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("ledger.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    /// Run `f` inside one write transaction.
    ///
    /// The transaction commits only if `f` returns `Ok`; any error rolls back
    /// every record `f` touched.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut SqlStore<'_>) -> crate::error::Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let value = {
            let mut store = SqlStore { conn: &*tx };
            f(&mut store)?
        };
        tx.commit()?;
        Ok(value)
    }

    /// Run a read-only closure against the store without opening a transaction.
    pub fn read<T>(&self, f: impl FnOnce(&SqlStore<'_>) -> crate::error::Result<T>) -> Result<T> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let store = SqlStore { conn: &*conn };
        Ok(f(&store)?)
    }

    // ============================================================
    // Schema ledger operations
    // ============================================================

    /// Register a schema definition and build its term tree.
    pub fn create_schema(&self, input: CreateSchemaInput) -> Result<SchemaLedgerEntry> {
        let version: Version = input.version.parse()?;
        let Value::Object(definition) = &input.metadata else {
            return Err(TreeError::InvalidDefinition(
                "schema metadata must be a JSON object".to_string(),
            )
            .into());
        };
        let status = input.status.unwrap_or_default();
        let updated_by = input.updated_by.as_deref();

        let entry = self.transaction(|store| {
            let root = store.insert_term_set(NewTermSet::root(
                &input.schema_name,
                &version.to_string(),
                status,
                updated_by,
            )?)?;
            let summary = tree::flatten(store, definition, root.id, status, updated_by)?;

            let now = Utc::now();
            let entry = SchemaLedgerEntry {
                id: Uuid::new_v4(),
                schema_name: input.schema_name.clone(),
                schema_iri: root.iri.clone(),
                status,
                major_version: version.major,
                minor_version: version.minor,
                patch_version: version.patch,
                version: version.to_string(),
                metadata: input.metadata.clone(),
                term_set: Some(root.id),
                updated_by: input.updated_by.clone(),
                created_at: now,
                updated_at: now,
            };
            store.insert_schema_entry(&entry)?;

            tracing::info!(
                "Registered schema {} ({} term sets, {} terms, {} skipped)",
                root.iri,
                summary.term_sets + 1,
                summary.terms,
                summary.skipped
            );
            Ok(entry)
        })?;

        Ok(entry)
    }

    pub fn list_schemas(&self) -> Result<Vec<SchemaLedgerEntry>> {
        self.read(|store| store.schema_entries(None))
    }

    pub fn get_schema_by_id(&self, id: Uuid) -> Result<Option<SchemaLedgerEntry>> {
        self.read(|store| store.schema_entry(id))
    }

    /// Look up a schema by name, at `version` or at the latest registered version.
    pub fn get_schema(&self, name: &str, version: Option<&str>) -> Result<SchemaLedgerEntry> {
        self.read(|store| find_schema(store, name, version))
    }

    /// Change the status of a ledger entry and of its whole term tree.
    pub fn update_schema_status(
        &self,
        id: Uuid,
        status: Status,
        updated_by: Option<&str>,
    ) -> Result<Option<SchemaLedgerEntry>> {
        self.transaction(|store| {
            let Some(entry) = store.schema_entry(id)? else {
                return Ok(None);
            };

            store.update_schema_status(id, status, updated_by)?;
            if let Some(root) = entry.term_set {
                tree::propagate_status(store, root, status, updated_by)?;
            }
            tracing::info!("Schema {} is now {}", entry.schema_iri, status.as_str());

            store.schema_entry(id)
        })
    }

    /// The published shape of a schema.
    pub fn export_schema(&self, name: &str, version: Option<&str>) -> Result<ExportedSchema> {
        self.read(|store| {
            let entry = find_schema(store, name, version)?;
            let root = entry.term_set.ok_or_else(|| {
                TreeError::not_found(format!("schema {} has no term tree", entry.schema_iri))
            })?;

            Ok(ExportedSchema {
                iri: entry.schema_iri,
                name: entry.schema_name,
                version: entry.version,
                schema: tree::export(store, root)?,
            })
        })
    }

    // ============================================================
    // Term set operations
    // ============================================================

    /// Propagate `status` from any term set down its subtree.
    ///
    /// A root keeps its ledger entry in step. Returns the number of nodes changed.
    pub fn set_term_set_status(
        &self,
        iri: &str,
        status: Status,
        updated_by: Option<&str>,
    ) -> Result<usize> {
        self.transaction(|store| {
            let node = term_set_by_iri(store, iri)?;
            let changed = tree::propagate_status(store, node.id, status, updated_by)?;

            if node.is_root() {
                if let Some(entry) = store.schema_entry_for_term_set(node.id)? {
                    store.update_schema_status(entry.id, status, updated_by)?;
                }
            }
            Ok(changed)
        })
    }

    pub fn rename_term_set(&self, iri: &str, name: &str) -> Result<TermSet> {
        self.transaction(|store| {
            let node = term_set_by_iri(store, iri)?;
            let renamed = tree::rename_term_set(store, node.id, name)?;

            if renamed.is_root() {
                if let Some(entry) = store.schema_entry_for_term_set(renamed.id)? {
                    store.update_schema_identity(entry.id, &renamed.name, &renamed.iri)?;
                }
                store.update_transformation_names(renamed.id, &renamed.name)?;
            }
            tracing::info!("Renamed {} to {}", iri, renamed.iri);
            Ok(renamed)
        })
    }

    pub fn rename_term(&self, iri: &str, name: &str) -> Result<Term> {
        self.transaction(|store| {
            let term = store
                .find_term(iri)?
                .ok_or_else(|| TreeError::not_found(format!("no term found with the iri '{}'", iri)))?;
            let renamed = tree::rename_term(store, term.id, name)?;
            tracing::info!("Renamed {} to {}", iri, renamed.iri);
            Ok(renamed)
        })
    }

    pub fn term_set_tree(&self, iri: &str) -> Result<String> {
        self.read(|store| {
            let node = term_set_by_iri(store, iri)?;
            tree::render_tree(store, node.id)
        })
    }

    // ============================================================
    // Transformation operations
    // ============================================================

    /// Record a transformation between two registered schemas and apply its mapping.
    pub fn create_transformation(
        &self,
        input: CreateTransformationInput,
    ) -> Result<TransformationResult> {
        let spec = mapping_spec(&input.schema_mapping)?;
        let status = input.status.unwrap_or_default();

        self.transaction(|store| {
            let source = schema_root_by_iri(store, &input.source_schema)?;
            let target = schema_root_by_iri(store, &input.target_schema)?;
            if store.transformation_between(source.id, target.id)?.is_some() {
                return Err(TreeError::Duplicate(format!(
                    "transformation from {} to {}",
                    source.iri, target.iri
                )));
            }

            let report = tree::apply_mapping(store, target.id, source.id, spec)?;

            let now = Utc::now();
            let transformation = TransformationLedgerEntry {
                id: Uuid::new_v4(),
                source_schema: source.id,
                source_schema_version: tree::version_of(store, source.id)?,
                source_schema_name: source.name,
                target_schema: target.id,
                target_schema_version: tree::version_of(store, target.id)?,
                target_schema_name: target.name,
                schema_mapping: input.schema_mapping.clone(),
                status,
                updated_by: input.updated_by.clone(),
                created_at: now,
                updated_at: now,
            };
            store.insert_transformation(&transformation)?;

            Ok(TransformationResult {
                transformation,
                report,
            })
        })
    }

    /// Replace the mapping of a transformation and re-apply it.
    pub fn update_transformation_mapping(
        &self,
        id: Uuid,
        mapping: Value,
    ) -> Result<Option<TransformationResult>> {
        let spec = mapping_spec(&mapping)?;

        self.transaction(|store| {
            let Some(existing) = store.transformation(id)? else {
                return Ok(None);
            };

            store.update_transformation_mapping(id, &mapping)?;
            let report =
                tree::reapply_mapping(store, existing.target_schema, existing.source_schema, spec)?;

            let transformation = store
                .transformation(id)?
                .ok_or_else(|| TreeError::not_found(format!("transformation {} not found", id)))?;
            Ok(Some(TransformationResult {
                transformation,
                report,
            }))
        })
    }

    pub fn get_transformation(
        &self,
        source_name: &str,
        source_version: &str,
        target_name: &str,
        target_version: &str,
    ) -> Result<Option<TransformationLedgerEntry>> {
        let source_version = source_version.parse::<Version>()?.to_string();
        let target_version = target_version.parse::<Version>()?.to_string();
        self.read(|store| {
            store.find_transformation(source_name, &source_version, target_name, &target_version)
        })
    }

    /// Which published terms under `iri` map into the tree prefixed by `target_root`.
    pub fn resolve_mapped_to(&self, iri: &str, target_root: &str) -> Result<NestedMap> {
        self.read(|store| {
            let node = term_set_by_iri(store, iri)?;
            tree::resolve_mapped_to(store, node.id, target_root)
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

fn find_schema(
    store: &SqlStore<'_>,
    name: &str,
    version: Option<&str>,
) -> crate::error::Result<SchemaLedgerEntry> {
    let entries = store.schema_entries(Some(name))?;
    if entries.is_empty() {
        return Err(TreeError::not_found(format!(
            "no schema found with the name '{}'",
            name
        )));
    }

    let found = match version {
        Some(requested) => {
            let wanted = requested.parse::<Version>()?.to_string();
            entries.into_iter().find(|e| e.version == wanted)
        }
        None => latest_of(&entries)?.cloned(),
    };
    found.ok_or_else(|| {
        TreeError::not_found(format!(
            "no schema found for version '{}'",
            version.unwrap_or_default()
        ))
    })
}

fn term_set_by_iri(store: &SqlStore<'_>, iri: &str) -> crate::error::Result<TermSet> {
    store
        .find_term_set(iri)?
        .ok_or_else(|| TreeError::not_found(format!("no term set found with the iri '{}'", iri)))
}

fn schema_root_by_iri(store: &SqlStore<'_>, iri: &str) -> crate::error::Result<TermSet> {
    match store.find_term_set(iri)? {
        Some(node) if node.is_root() => Ok(node),
        _ => Err(TreeError::not_found(format!(
            "no schema found with the iri '{}'",
            iri
        ))),
    }
}

fn mapping_spec(mapping: &Value) -> crate::error::Result<&NestedMap> {
    mapping.as_object().ok_or_else(|| {
        TreeError::InvalidDefinition("schema mapping must be a JSON object".to_string())
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = db();
        let result: Result<()> = db.transaction(|store| {
            store.insert_term_set(NewTermSet::root("orphan", "1.0.0", Status::Published, None)?)?;
            Err(TreeError::InvalidDefinition("boom".to_string()))
        });
        assert!(result.is_err());

        let found = db
            .read(|store| store.find_term_set("xss:1.0.0@orphan"))
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn committed_transaction_is_visible() {
        let db = db();
        db.transaction(|store| {
            store.insert_term_set(NewTermSet::root("kept", "1.0.0", Status::Published, None)?)
        })
        .unwrap();

        let found = db.read(|store| store.find_term_set("xss:1.0.0@kept")).unwrap();
        assert!(found.unwrap().is_root());
    }

    #[test]
    fn sql_store_round_trips_mappings() {
        let db = db();
        db.transaction(|store| {
            let a = store.insert_term_set(NewTermSet::root("a", "1.0.0", Status::Published, None)?)?;
            let b = store.insert_term_set(NewTermSet::root("b", "1.0.0", Status::Published, None)?)?;
            let x = store.insert_term(NewTerm::new(&a, "X", LeafAttributes::default(), Status::Published, None))?;
            let y = store.insert_term(NewTerm::new(&b, "Y", LeafAttributes::default(), Status::Published, None))?;

            assert!(store.add_mapping(x.id, y.id)?);
            assert!(!store.add_mapping(x.id, y.id)?);
            assert_eq!(store.mapped_terms(x.id)?[0].iri, "xss:1.0.0@b?Y");
            assert!(store.remove_mapping(x.id, y.id)?);
            assert!(store.mapped_terms(x.id)?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn duplicate_term_set_iri_is_rejected() {
        let db = db();
        let result = db.transaction(|store| {
            store.insert_term_set(NewTermSet::root("dup", "1.0.0", Status::Published, None)?)?;
            store.insert_term_set(NewTermSet::root("dup", "1.0.0", Status::Published, None)?)
        });
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TreeError>(),
            Some(TreeError::Duplicate(_))
        ));
    }
}
