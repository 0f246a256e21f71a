use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{parse_datetime, parse_uuid};
use crate::error::{Result, TreeError};
use crate::models::*;
use crate::tree::TermStore;
use crate::version::Version;

const TERM_SET_COLUMNS: &str = "id, iri, name, version, parent_id, status, updated_by";
const TERM_COLUMNS: &str =
    "id, iri, term_set_id, name, description, data_type, term_use, source, status, updated_by";
const SCHEMA_COLUMNS: &str = "id, schema_name, schema_iri, status, major_version, minor_version, \
     patch_version, version, metadata, term_set_id, updated_by, created_at, updated_at";
const TRANSFORMATION_COLUMNS: &str = "id, source_schema_id, source_schema_name, \
     source_schema_version, target_schema_id, target_schema_name, target_schema_version, \
     schema_mapping, status, updated_by, created_at, updated_at";

/// Record access inside one open transaction.
///
/// Handed out by [`super::Database::transaction`]; every method runs on the
/// transaction's connection, so a whole tree operation commits or rolls back
/// together.
pub struct SqlStore<'a> {
    pub(super) conn: &'a Connection,
}

fn term_set_from_row(row: &Row) -> rusqlite::Result<TermSet> {
    let version: Option<String> = row.get(3)?;
    let kind = match row.get::<_, Option<i64>>(4)? {
        Some(parent) => NodeKind::Child {
            parent: TermSetId(parent),
        },
        None => NodeKind::Root {
            version: version.unwrap_or_default(),
        },
    };

    Ok(TermSet {
        id: TermSetId(row.get(0)?),
        iri: row.get(1)?,
        name: row.get(2)?,
        kind,
        status: Status::from_str(&row.get::<_, String>(5)?).unwrap_or_default(),
        updated_by: row.get(6)?,
    })
}

fn term_from_row(row: &Row) -> rusqlite::Result<Term> {
    Ok(Term {
        id: TermId(row.get(0)?),
        iri: row.get(1)?,
        term_set: TermSetId(row.get(2)?),
        name: row.get(3)?,
        attributes: LeafAttributes {
            description: row.get(4)?,
            data_type: row.get(5)?,
            use_: row
                .get::<_, Option<String>>(6)?
                .and_then(|u| TermUse::from_str(&u)),
            source: row.get(7)?,
        },
        status: Status::from_str(&row.get::<_, String>(8)?).unwrap_or_default(),
        updated_by: row.get(9)?,
    })
}

fn schema_from_row(row: &Row) -> rusqlite::Result<SchemaLedgerEntry> {
    let metadata: String = row.get(8)?;
    Ok(SchemaLedgerEntry {
        id: parse_uuid(row.get::<_, String>(0)?),
        schema_name: row.get(1)?,
        schema_iri: row.get(2)?,
        status: Status::from_str(&row.get::<_, String>(3)?).unwrap_or_default(),
        major_version: row.get::<_, i64>(4)? as u64,
        minor_version: row.get::<_, i64>(5)? as u64,
        patch_version: row.get::<_, i64>(6)? as u64,
        version: row.get(7)?,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        term_set: row.get::<_, Option<i64>>(9)?.map(TermSetId),
        updated_by: row.get(10)?,
        created_at: parse_datetime(row.get::<_, String>(11)?),
        updated_at: parse_datetime(row.get::<_, String>(12)?),
    })
}

fn transformation_from_row(row: &Row) -> rusqlite::Result<TransformationLedgerEntry> {
    let mapping: String = row.get(7)?;
    Ok(TransformationLedgerEntry {
        id: parse_uuid(row.get::<_, String>(0)?),
        source_schema: TermSetId(row.get(1)?),
        source_schema_name: row.get(2)?,
        source_schema_version: row.get(3)?,
        target_schema: TermSetId(row.get(4)?),
        target_schema_name: row.get(5)?,
        target_schema_version: row.get(6)?,
        schema_mapping: serde_json::from_str(&mapping).unwrap_or_default(),
        status: Status::from_str(&row.get::<_, String>(8)?).unwrap_or_default(),
        updated_by: row.get(9)?,
        created_at: parse_datetime(row.get::<_, String>(10)?),
        updated_at: parse_datetime(row.get::<_, String>(11)?),
    })
}

impl TermStore for SqlStore<'_> {
    fn term_set(&self, id: TermSetId) -> Result<TermSet> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM term_sets WHERE id = ?", TERM_SET_COLUMNS),
                [id.0],
                term_set_from_row,
            )
            .optional()?
            .ok_or_else(|| TreeError::not_found(format!("term set {} not found", id.0)))
    }

    fn term(&self, id: TermId) -> Result<Term> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM terms WHERE id = ?", TERM_COLUMNS),
                [id.0],
                term_from_row,
            )
            .optional()?
            .ok_or_else(|| TreeError::not_found(format!("term {} not found", id.0)))
    }

    fn find_term_set(&self, iri: &str) -> Result<Option<TermSet>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM term_sets WHERE iri = ?", TERM_SET_COLUMNS),
                [iri],
                term_set_from_row,
            )
            .optional()?)
    }

    fn find_term(&self, iri: &str) -> Result<Option<Term>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM terms WHERE iri = ?", TERM_COLUMNS),
                [iri],
                term_from_row,
            )
            .optional()?)
    }

    fn child_term_sets(&self, parent: TermSetId) -> Result<Vec<TermSet>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM term_sets WHERE parent_id = ? ORDER BY id",
            TERM_SET_COLUMNS
        ))?;
        let children = stmt
            .query_map([parent.0], term_set_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(children)
    }

    fn terms_in(&self, term_set: TermSetId) -> Result<Vec<Term>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM terms WHERE term_set_id = ? ORDER BY id",
            TERM_COLUMNS
        ))?;
        let terms = stmt
            .query_map([term_set.0], term_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(terms)
    }

    fn insert_term_set(&mut self, new: NewTermSet) -> Result<TermSet> {
        if self.find_term_set(&new.iri)?.is_some() {
            return Err(TreeError::Duplicate(new.iri));
        }

        let now = Utc::now().to_rfc3339();
        let (version, parent) = match &new.kind {
            NodeKind::Root { version } => (Some(version.as_str()), None),
            NodeKind::Child { parent } => (None, Some(parent.0)),
        };
        self.conn.execute(
            "INSERT INTO term_sets (iri, name, version, parent_id, status, updated_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &new.iri,
                &new.name,
                version,
                parent,
                new.status.as_str(),
                &new.updated_by,
                &now,
                &now,
            ),
        )?;

        tracing::debug!("Created term set {}", new.iri);
        Ok(TermSet {
            id: TermSetId(self.conn.last_insert_rowid()),
            name: new.name,
            kind: new.kind,
            status: new.status,
            iri: new.iri,
            updated_by: new.updated_by,
        })
    }

    fn insert_term(&mut self, new: NewTerm) -> Result<Term> {
        if self.find_term(&new.iri)?.is_some() {
            return Err(TreeError::Duplicate(new.iri));
        }

        let now = Utc::now().to_rfc3339();
        let attributes = &new.attributes;
        self.conn.execute(
            "INSERT INTO terms (iri, term_set_id, name, description, data_type, term_use, source, status, updated_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                &new.iri,
                new.term_set.0,
                &new.name,
                &attributes.description,
                &attributes.data_type,
                attributes.use_.map(|u| u.as_str()),
                &attributes.source,
                new.status.as_str(),
                &new.updated_by,
                &now,
                &now,
            ],
        )?;

        tracing::debug!("Created term {}", new.iri);
        Ok(Term {
            id: TermId(self.conn.last_insert_rowid()),
            term_set: new.term_set,
            name: new.name,
            attributes: new.attributes,
            status: new.status,
            iri: new.iri,
            updated_by: new.updated_by,
        })
    }

    fn update_term_set_status(
        &mut self,
        id: TermSetId,
        status: Status,
        updated_by: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE term_sets SET status = ?, updated_by = ?, updated_at = ? WHERE id = ?",
            (status.as_str(), updated_by, Utc::now().to_rfc3339(), id.0),
        )?;
        Ok(())
    }

    fn update_term_status(
        &mut self,
        id: TermId,
        status: Status,
        updated_by: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE terms SET status = ?, updated_by = ?, updated_at = ? WHERE id = ?",
            (status.as_str(), updated_by, Utc::now().to_rfc3339(), id.0),
        )?;
        Ok(())
    }

    fn update_term_set_name(&mut self, id: TermSetId, name: &str, iri: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE term_sets SET name = ?, iri = ?, updated_at = ? WHERE id = ?",
            (name, iri, Utc::now().to_rfc3339(), id.0),
        )?;
        Ok(())
    }

    fn update_term_name(&mut self, id: TermId, name: &str, iri: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE terms SET name = ?, iri = ?, updated_at = ? WHERE id = ?",
            (name, iri, Utc::now().to_rfc3339(), id.0),
        )?;
        Ok(())
    }

    fn add_mapping(&mut self, term: TermId, mapped: TermId) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO term_mappings (term_id, mapped_term_id) VALUES (?, ?)",
            (term.0, mapped.0),
        )?;
        Ok(rows > 0)
    }

    fn remove_mapping(&mut self, term: TermId, mapped: TermId) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM term_mappings WHERE term_id = ? AND mapped_term_id = ?",
            (term.0, mapped.0),
        )?;
        Ok(rows > 0)
    }

    fn mapped_terms(&self, term: TermId) -> Result<Vec<Term>> {
        let columns = TERM_COLUMNS
            .split(", ")
            .map(|c| format!("t.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM term_mappings m JOIN terms t ON t.id = m.mapped_term_id
             WHERE m.term_id = ? ORDER BY t.id",
            columns
        ))?;
        let terms = stmt
            .query_map([term.0], term_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(terms)
    }
}

// Ledger rows. These live next to the tree primitives so a ledger change and
// the tree walk it triggers share one transaction.
impl SqlStore<'_> {
    pub fn insert_schema_entry(&mut self, entry: &SchemaLedgerEntry) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO schema_ledger ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                SCHEMA_COLUMNS
            ),
            rusqlite::params![
                entry.id.to_string(),
                &entry.schema_name,
                &entry.schema_iri,
                entry.status.as_str(),
                entry.major_version as i64,
                entry.minor_version as i64,
                entry.patch_version as i64,
                &entry.version,
                entry.metadata.to_string(),
                entry.term_set.map(|id| id.0),
                &entry.updated_by,
                entry.created_at.to_rfc3339(),
                entry.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn schema_entry(&self, id: Uuid) -> Result<Option<SchemaLedgerEntry>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM schema_ledger WHERE id = ?", SCHEMA_COLUMNS),
                [id.to_string()],
                schema_from_row,
            )
            .optional()?)
    }

    pub fn schema_entry_for_term_set(&self, term_set: TermSetId) -> Result<Option<SchemaLedgerEntry>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM schema_ledger WHERE term_set_id = ?",
                    SCHEMA_COLUMNS
                ),
                [term_set.0],
                schema_from_row,
            )
            .optional()?)
    }

    pub fn schema_entries(&self, name: Option<&str>) -> Result<Vec<SchemaLedgerEntry>> {
        let entries = match name {
            Some(name) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM schema_ledger WHERE schema_name = ? ORDER BY created_at",
                    SCHEMA_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([name], schema_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM schema_ledger ORDER BY schema_name",
                    SCHEMA_COLUMNS
                ))?;
                let mut rows = stmt
                    .query_map([], schema_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                // Components are u64 but stored as INTEGER, so order by the parsed version here.
                rows.sort_by_cached_key(|e| {
                    (e.schema_name.clone(), e.version.parse::<Version>().ok())
                });
                rows
            }
        };
        Ok(entries)
    }

    pub fn update_schema_status(
        &mut self,
        id: Uuid,
        status: Status,
        updated_by: Option<&str>,
    ) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE schema_ledger SET status = ?, updated_by = ?, updated_at = ? WHERE id = ?",
            (
                status.as_str(),
                updated_by,
                Utc::now().to_rfc3339(),
                id.to_string(),
            ),
        )?;
        Ok(rows > 0)
    }

    pub fn update_schema_identity(&mut self, id: Uuid, name: &str, iri: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE schema_ledger SET schema_name = ?, schema_iri = ?, updated_at = ? WHERE id = ?",
            (name, iri, Utc::now().to_rfc3339(), id.to_string()),
        )?;
        Ok(())
    }

    /// Rewrite the copied schema name on every transformation that starts or ends at `root`.
    pub fn update_transformation_names(&mut self, root: TermSetId, name: &str) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let source = self.conn.execute(
            "UPDATE transformation_ledger SET source_schema_name = ?, updated_at = ? WHERE source_schema_id = ?",
            (name, &now, root.0),
        )?;
        let target = self.conn.execute(
            "UPDATE transformation_ledger SET target_schema_name = ?, updated_at = ? WHERE target_schema_id = ?",
            (name, &now, root.0),
        )?;
        Ok(source + target)
    }

    pub fn insert_transformation(&mut self, entry: &TransformationLedgerEntry) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO transformation_ledger ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TRANSFORMATION_COLUMNS
            ),
            rusqlite::params![
                entry.id.to_string(),
                entry.source_schema.0,
                &entry.source_schema_name,
                &entry.source_schema_version,
                entry.target_schema.0,
                &entry.target_schema_name,
                &entry.target_schema_version,
                entry.schema_mapping.to_string(),
                entry.status.as_str(),
                &entry.updated_by,
                entry.created_at.to_rfc3339(),
                entry.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn transformation(&self, id: Uuid) -> Result<Option<TransformationLedgerEntry>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM transformation_ledger WHERE id = ?",
                    TRANSFORMATION_COLUMNS
                ),
                [id.to_string()],
                transformation_from_row,
            )
            .optional()?)
    }

    pub fn transformation_between(
        &self,
        source: TermSetId,
        target: TermSetId,
    ) -> Result<Option<TransformationLedgerEntry>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM transformation_ledger WHERE source_schema_id = ? AND target_schema_id = ?",
                    TRANSFORMATION_COLUMNS
                ),
                [source.0, target.0],
                transformation_from_row,
            )
            .optional()?)
    }

    pub fn find_transformation(
        &self,
        source_name: &str,
        source_version: &str,
        target_name: &str,
        target_version: &str,
    ) -> Result<Option<TransformationLedgerEntry>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM transformation_ledger
                     WHERE source_schema_name = ? AND source_schema_version = ?
                       AND target_schema_name = ? AND target_schema_version = ?
                     ORDER BY created_at LIMIT 1",
                    TRANSFORMATION_COLUMNS
                ),
                [source_name, source_version, target_name, target_version],
                transformation_from_row,
            )
            .optional()?)
    }

    pub fn update_transformation_mapping(
        &mut self,
        id: Uuid,
        mapping: &serde_json::Value,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE transformation_ledger SET schema_mapping = ?, updated_at = ? WHERE id = ?",
            (mapping.to_string(), Utc::now().to_rfc3339(), id.to_string()),
        )?;
        Ok(())
    }
}
