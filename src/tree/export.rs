use serde_json::Value;

use super::{check_depth, NestedMap, TermStore};
use crate::error::Result;
use crate::models::*;

/// Serialize the published part of a tree back into nested key/value form.
///
/// A retired term set hides its whole subtree, whatever the status of the
/// nodes below it. When a child term set and a term share a name, the term
/// entry is kept.
pub fn export<S: TermStore + ?Sized>(store: &S, node: TermSetId) -> Result<NestedMap> {
    let node = store.term_set(node)?;
    if !node.status.is_published() {
        return Ok(NestedMap::new());
    }
    export_node(store, &node, 0)
}

fn export_node<S: TermStore + ?Sized>(store: &S, node: &TermSet, depth: usize) -> Result<NestedMap> {
    check_depth(depth, &node.iri)?;

    let mut out = NestedMap::new();
    for child in store.child_term_sets(node.id)? {
        if child.status.is_published() {
            let exported = export_node(store, &child, depth + 1)?;
            out.insert(child.name, Value::Object(exported));
        }
    }

    for term in store.terms_in(node.id)? {
        if term.status.is_published() {
            if out.contains_key(&term.name) {
                tracing::warn!("Term {} shadows a term set of the same name", term.iri);
            }
            out.insert(term.name, Value::Object(leaf_map(&term.attributes)));
        }
    }

    Ok(out)
}

fn leaf_map(attributes: &LeafAttributes) -> NestedMap {
    let mut out = NestedMap::new();
    let fields = [
        ("use", attributes.use_.map(|u| u.as_str().to_string())),
        ("data_type", attributes.data_type.clone()),
        ("source", attributes.source.clone()),
        ("description", attributes.description.clone()),
    ];
    for (key, value) in fields {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            out.insert(key.to_string(), Value::String(value));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{flatten, propagate_status, Forest};
    use serde_json::json;

    fn tree(definition: Value) -> (Forest, TermSet) {
        let mut forest = Forest::new();
        let root = forest
            .insert_term_set(NewTermSet::root("test", "1.0.0", Status::Published, None).unwrap())
            .unwrap();
        let definition: NestedMap = serde_json::from_value(definition).unwrap();
        flatten(&mut forest, &definition, root.id, Status::Published, None).unwrap();
        (forest, root)
    }

    #[test]
    fn round_trips_a_published_tree() {
        let definition = json!({
            "Course": {
                "Title": {"use": "Required", "data_type": "str", "description": "Name"},
                "Code": {"use": "Optional", "source": "registrar"}
            },
            "Id": {"use": "Required"}
        });
        let (forest, root) = tree(definition.clone());

        let exported = export(&forest, root.id).unwrap();
        assert_eq!(Value::Object(exported), definition);
    }

    #[test]
    fn omits_retired_subtree_even_with_published_grandchild() {
        let (mut forest, root) = tree(json!({
            "Keep": {"A": {"use": "Required"}},
            "Drop": {"Inner": {"B": {"use": "Required"}}, "C": {"use": "Optional"}}
        }));
        let drop = forest.child_named(&root, "Drop").unwrap().unwrap();
        forest
            .update_term_set_status(drop.id, Status::Retired, None)
            .unwrap();

        let exported = export(&forest, root.id).unwrap();
        assert_eq!(
            Value::Object(exported),
            json!({"Keep": {"A": {"use": "Required"}}})
        );
    }

    #[test]
    fn omits_retired_terms() {
        let (mut forest, root) = tree(json!({"A": {"use": "Required"}, "B": {"use": "Optional"}}));
        let b = forest.term_named(&root, "B").unwrap().unwrap();
        forest.update_term_status(b.id, Status::Retired, None).unwrap();

        let exported = export(&forest, root.id).unwrap();
        assert_eq!(Value::Object(exported), json!({"A": {"use": "Required"}}));
    }

    #[test]
    fn retired_root_exports_nothing() {
        let (mut forest, root) = tree(json!({"A": {"use": "Required"}}));
        propagate_status(&mut forest, root.id, Status::Retired, None).unwrap();
        assert!(export(&forest, root.id).unwrap().is_empty());
    }

    #[test]
    fn term_shadows_group_of_same_name() {
        let (mut forest, root) = tree(json!({}));
        let group = forest
            .insert_term_set(NewTermSet::child(&root, "X", Status::Published, None))
            .unwrap();
        forest
            .insert_term(NewTerm::new(&group, "in", LeafAttributes::default(), Status::Published, None))
            .unwrap();
        let required = LeafAttributes {
            use_: Some(TermUse::Required),
            ..Default::default()
        };
        let term = forest
            .insert_term(NewTerm::new(&root, "X", required, Status::Published, None))
            .unwrap();

        let exported = export(&forest, root.id).unwrap();
        assert_eq!(Value::Object(exported), json!({"X": {"use": "Required"}}));

        forest.update_term_status(term.id, Status::Retired, None).unwrap();
        let exported = export(&forest, root.id).unwrap();
        assert_eq!(Value::Object(exported), json!({"X": {"in": {}}}));
    }

    #[test]
    fn bare_string_leaf_exports_as_empty_map() {
        let (forest, root) = tree(json!({"Marker": "anything"}));
        assert_eq!(Value::Object(export(&forest, root.id).unwrap()), json!({"Marker": {}}));
    }
}
