use serde::Serialize;
use serde_json::Value;

use super::{check_depth, NestedMap, TermStore};
use crate::error::Result;
use crate::models::*;

/// How one key of a schema definition is turned into a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification<'a> {
    /// A grouping: becomes a child term set and its fields are flattened into it.
    Group(&'a NestedMap),
    /// A field: becomes a term with whatever attributes were recognized.
    Leaf(LeafAttributes),
    /// Neither a mapping nor a string.
    Skip,
}

/// Decide whether a definition value is a group or a leaf.
///
/// Only the first entry of a mapping is inspected: if it is itself a
/// mapping, the whole value is a group. A mapping that mixes nested and flat
/// entries is classified by whichever comes first.
pub fn classify(value: &Value) -> Classification<'_> {
    match value {
        Value::Object(fields) => match fields.values().next() {
            Some(Value::Object(_)) => Classification::Group(fields),
            _ => Classification::Leaf(leaf_attributes(fields)),
        },
        Value::String(_) => Classification::Leaf(LeafAttributes::default()),
        _ => Classification::Skip,
    }
}

fn leaf_attributes(fields: &NestedMap) -> LeafAttributes {
    let text = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let use_ = text("use").and_then(|raw| {
        let parsed = TermUse::from_str(&raw);
        if parsed.is_none() {
            tracing::warn!("Ignoring unrecognized use '{}'", raw);
        }
        parsed
    });

    LeafAttributes {
        description: text("description"),
        data_type: text("data_type").or_else(|| text("type")),
        use_,
        source: text("source"),
    }
}

/// Counts of what a flatten created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlattenSummary {
    pub term_sets: usize,
    pub terms: usize,
    pub skipped: usize,
}

/// Build the term tree for `definition` under the existing term set `root`.
///
/// Every created node gets `status` and `updated_by` unchanged. Nodes are
/// created in document order; a failure leaves earlier siblings in place.
pub fn flatten<S: TermStore + ?Sized>(
    store: &mut S,
    definition: &NestedMap,
    root: TermSetId,
    status: Status,
    updated_by: Option<&str>,
) -> Result<FlattenSummary> {
    let root = store.term_set(root)?;
    let mut summary = FlattenSummary::default();
    flatten_level(store, definition, &root, status, updated_by, 0, &mut summary)?;

    tracing::debug!(
        "Flattened {} term sets and {} terms under {}",
        summary.term_sets,
        summary.terms,
        root.iri
    );
    Ok(summary)
}

fn flatten_level<S: TermStore + ?Sized>(
    store: &mut S,
    definition: &NestedMap,
    parent: &TermSet,
    status: Status,
    updated_by: Option<&str>,
    depth: usize,
    summary: &mut FlattenSummary,
) -> Result<()> {
    check_depth(depth, &parent.iri)?;

    for (key, value) in definition {
        match classify(value) {
            Classification::Group(fields) => {
                let child =
                    store.insert_term_set(NewTermSet::child(parent, key, status, updated_by))?;
                summary.term_sets += 1;
                flatten_level(store, fields, &child, status, updated_by, depth + 1, summary)?;
            }
            Classification::Leaf(attributes) => {
                store.insert_term(NewTerm::new(parent, key, attributes, status, updated_by))?;
                summary.terms += 1;
            }
            Classification::Skip => {
                tracing::warn!("Skipping '{}' under {}: not a mapping or string", key, parent.iri);
                summary.skipped += 1;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Forest;
    use crate::error::TreeError;
    use serde_json::json;

    fn object(value: Value) -> NestedMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    fn forest_with_root() -> (Forest, TermSet) {
        let mut forest = Forest::new();
        let root = forest
            .insert_term_set(NewTermSet::root("test", "1.0.0", Status::Published, None).unwrap())
            .unwrap();
        (forest, root)
    }

    #[test]
    fn classifies_by_first_entry() {
        let group = json!({"a": {"use": "Required"}, "b": "x"});
        assert!(matches!(classify(&group), Classification::Group(_)));

        let leaf = json!({"use": "Required", "nested": {"x": 1}});
        assert!(matches!(classify(&leaf), Classification::Leaf(_)));

        assert_eq!(classify(&json!("marker")), Classification::Leaf(LeafAttributes::default()));
        assert_eq!(classify(&json!(5)), Classification::Skip);
        assert_eq!(classify(&json!([1, 2])), Classification::Skip);
    }

    #[test]
    fn leaf_attributes_are_copied() {
        let value = json!({
            "use": "Required",
            "type": "int",
            "source": "registrar",
            "description": "Course code",
            "extra": "ignored"
        });
        let Classification::Leaf(attrs) = classify(&value) else {
            panic!("expected leaf");
        };
        assert_eq!(attrs.use_, Some(TermUse::Required));
        assert_eq!(attrs.data_type.as_deref(), Some("int"));
        assert_eq!(attrs.source.as_deref(), Some("registrar"));
        assert_eq!(attrs.description.as_deref(), Some("Course code"));
    }

    #[test]
    fn unrecognized_use_is_dropped() {
        let Classification::Leaf(attrs) = classify(&json!({"use": "Mandatory"})) else {
            panic!("expected leaf");
        };
        assert!(attrs.use_.is_none());
    }

    #[test]
    fn flattens_course_example() {
        let (mut forest, root) = forest_with_root();
        let definition = object(json!({
            "Course": {
                "Title": {"use": "Required"},
                "Code": {"use": "Required"}
            }
        }));

        let summary = flatten(&mut forest, &definition, root.id, Status::Published, None).unwrap();
        assert_eq!(summary, FlattenSummary { term_sets: 1, terms: 2, skipped: 0 });

        let children = forest.child_term_sets(root.id).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].iri, "xss:1.0.0@test/Course");

        let iris: Vec<_> = forest
            .terms_in(children[0].id)
            .unwrap()
            .into_iter()
            .map(|t| t.iri)
            .collect();
        assert_eq!(iris, vec!["xss:1.0.0@test/Course?Title", "xss:1.0.0@test/Course?Code"]);
        assert!(forest.terms_in(root.id).unwrap().is_empty());
    }

    #[test]
    fn threads_status_and_actor_to_every_node() {
        let (mut forest, root) = forest_with_root();
        let definition = object(json!({
            "A": {"B": {"C": {"use": "Optional"}}},
            "D": "marker"
        }));

        flatten(&mut forest, &definition, root.id, Status::Retired, Some("bob")).unwrap();

        let a = forest.child_named(&root, "A").unwrap().unwrap();
        let b = forest.child_named(&a, "B").unwrap().unwrap();
        let c = forest.term_named(&b, "C").unwrap().unwrap();
        let d = forest.term_named(&root, "D").unwrap().unwrap();
        for status in [a.status, b.status, c.status, d.status] {
            assert_eq!(status, Status::Retired);
        }
        assert_eq!(c.updated_by.as_deref(), Some("bob"));
        assert!(d.attributes.is_empty());
    }

    #[test]
    fn skips_values_that_are_not_mappings_or_strings() {
        let (mut forest, root) = forest_with_root();
        let definition = object(json!({"count": 3, "flag": true, "name": "x"}));

        let summary = flatten(&mut forest, &definition, root.id, Status::Published, None).unwrap();
        assert_eq!(summary.terms, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn normalizes_spaces_in_names() {
        let (mut forest, root) = forest_with_root();
        let definition = object(json!({"Contact Info": {"Email Address": {"use": "Optional"}}}));

        flatten(&mut forest, &definition, root.id, Status::Published, None).unwrap();
        assert!(forest
            .find_term("xss:1.0.0@test/Contact_Info?Email_Address")
            .unwrap()
            .is_some());
    }

    #[test]
    fn fails_on_pathological_depth() {
        let (mut forest, root) = forest_with_root();
        let mut value = json!({"leaf": {"use": "Required"}});
        for i in 0..(crate::tree::MAX_TREE_DEPTH + 2) {
            let mut level = NestedMap::new();
            level.insert(format!("level{}", i), value);
            value = Value::Object(level);
        }

        let err = flatten(&mut forest, &object(value), root.id, Status::Published, None).unwrap_err();
        assert!(matches!(err, TreeError::DepthExceeded { .. }));
    }
}
