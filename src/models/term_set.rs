use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::iri::{derive_iri, IriContext};
use crate::version::Version;

/// Opaque handle of a term set inside a [`crate::tree::TermStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermSetId(pub i64);

/// Lifecycle status shared by ledger entries, term sets, and terms.
///
/// Only `Published` nodes are visible to export and mapping queries.
/// Serializes as `published` / `retired`; any letter case is accepted on input.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Published,
    Retired,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Retired => "retired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("published") {
            Some(Self::Published)
        } else if s.eq_ignore_ascii_case("retired") {
            Some(Self::Retired)
        } else {
            None
        }
    }

    pub fn is_published(&self) -> bool {
        *self == Self::Published
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::from_str(&raw).ok_or_else(|| {
            serde::de::Error::unknown_variant(&raw, &["published", "retired"])
        })
    }
}

/// Root-or-child discriminant. Only roots store a version; children read
/// their root ancestor's through the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Root { version: String },
    Child { parent: TermSetId },
}

/// A schema (root) or a named grouping inside one (child).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSet {
    pub id: TermSetId,
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub status: Status,
    pub iri: String,
    pub updated_by: Option<String>,
}

impl TermSet {
    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root { .. })
    }

    pub fn parent(&self) -> Option<TermSetId> {
        match self.kind {
            NodeKind::Root { .. } => None,
            NodeKind::Child { parent } => Some(parent),
        }
    }

    /// The version stored on this node; `None` for children.
    pub fn stored_version(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Root { version } => Some(version),
            NodeKind::Child { .. } => None,
        }
    }
}

/// A term set that has not been stored yet. The iri is derived on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTermSet {
    pub name: String,
    pub kind: NodeKind,
    pub status: Status,
    pub iri: String,
    pub updated_by: Option<String>,
}

impl NewTermSet {
    /// A root term set. Fails if `version` is not a dotted triplet.
    pub fn root(
        name: &str,
        version: &str,
        status: Status,
        updated_by: Option<&str>,
    ) -> Result<Self> {
        version.parse::<Version>()?;
        Ok(Self {
            name: name.to_string(),
            iri: derive_iri(IriContext::Root { version }, name),
            kind: NodeKind::Root {
                version: version.to_string(),
            },
            status,
            updated_by: updated_by.map(str::to_string),
        })
    }

    pub fn child(
        parent: &TermSet,
        name: &str,
        status: Status,
        updated_by: Option<&str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            iri: derive_iri(
                IriContext::Child {
                    parent_iri: &parent.iri,
                },
                name,
            ),
            kind: NodeKind::Child { parent: parent.id },
            status,
            updated_by: updated_by.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeError;

    fn root() -> TermSet {
        let new = NewTermSet::root("test name", "0.0.1", Status::Published, None).unwrap();
        TermSet {
            id: TermSetId(1),
            name: new.name,
            kind: new.kind,
            status: new.status,
            iri: new.iri,
            updated_by: None,
        }
    }

    #[test]
    fn root_requires_valid_version() {
        let err = NewTermSet::root("x", "1.0", Status::Published, None).unwrap_err();
        assert!(matches!(err, TreeError::Format(_)));
    }

    #[test]
    fn root_derives_iri_from_version_and_name() {
        assert_eq!(root().iri, "xss:0.0.1@test_name");
        assert_eq!(root().stored_version(), Some("0.0.1"));
    }

    #[test]
    fn child_has_no_version_and_links_parent() {
        let parent = root();
        let child = NewTermSet::child(&parent, "Group A", Status::Retired, Some("alice"));
        assert_eq!(child.iri, "xss:0.0.1@test_name/Group_A");
        assert_eq!(child.kind, NodeKind::Child { parent: TermSetId(1) });
        assert_eq!(child.updated_by.as_deref(), Some("alice"));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(Status::from_str("Retired"), Some(Status::Retired));
        assert_eq!(Status::from_str("published"), Some(Status::Published));
        assert_eq!(Status::from_str("draft"), None);
    }

    #[test]
    fn status_deserializes_in_any_case() {
        let status: Status = serde_json::from_value(serde_json::json!("Retired")).unwrap();
        assert_eq!(status, Status::Retired);
        let status: Status = serde_json::from_value(serde_json::json!("PUBLISHED")).unwrap();
        assert_eq!(status, Status::Published);
        assert!(serde_json::from_value::<Status>(serde_json::json!("draft")).is_err());
        assert_eq!(serde_json::to_value(Status::Retired).unwrap(), serde_json::json!("retired"));
    }
}
