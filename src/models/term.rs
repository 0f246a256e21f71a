use serde::{Deserialize, Serialize};

use super::term_set::{Status, TermSet, TermSetId};
use crate::iri::{derive_iri, IriContext};

/// Opaque handle of a term inside a [`crate::tree::TermStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(pub i64);

/// How a field must be populated by data conforming to the schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TermUse {
    Required,
    Optional,
    Recommended,
}

impl TermUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "Required",
            Self::Optional => "Optional",
            Self::Recommended => "Recommended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Required" => Some(Self::Required),
            "Optional" => Some(Self::Optional),
            "Recommended" => Some(Self::Recommended),
            _ => None,
        }
    }
}

/// The optional descriptive fields a leaf definition may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafAttributes {
    pub description: Option<String>,
    pub data_type: Option<String>,
    #[serde(rename = "use")]
    pub use_: Option<TermUse>,
    pub source: Option<String>,
}

impl LeafAttributes {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.data_type.is_none()
            && self.use_.is_none()
            && self.source.is_none()
    }
}

/// A leaf field definition. Its mapping set lives in the store's adjacency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub term_set: TermSetId,
    pub name: String,
    #[serde(flatten)]
    pub attributes: LeafAttributes,
    pub status: Status,
    pub iri: String,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTerm {
    pub term_set: TermSetId,
    pub name: String,
    pub attributes: LeafAttributes,
    pub status: Status,
    pub iri: String,
    pub updated_by: Option<String>,
}

impl NewTerm {
    pub fn new(
        term_set: &TermSet,
        name: &str,
        attributes: LeafAttributes,
        status: Status,
        updated_by: Option<&str>,
    ) -> Self {
        Self {
            term_set: term_set.id,
            name: name.to_string(),
            iri: derive_iri(
                IriContext::Term {
                    term_set_iri: &term_set.iri,
                },
                name,
            ),
            attributes,
            status,
            updated_by: updated_by.map(str::to_string),
        }
    }
}
