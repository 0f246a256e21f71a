//! ASCII tree rendering for term trees.

use super::{check_depth, TermStore};
use crate::error::Result;
use crate::models::{Status, Term, TermSet, TermSetId};

const PUBLISHED: char = '●';
const RETIRED: char = '✗';

fn status_symbol(status: Status) -> char {
    match status {
        Status::Published => PUBLISHED,
        Status::Retired => RETIRED,
    }
}

/// Render a term set and everything below it.
///
/// Example output:
/// ```text
/// course_catalog (xss:1.0.0@course_catalog)
/// ├── ● Course/
/// │   ├── ● Title [Required, str]
/// │   └── ✗ Legacy Code
/// └── ● Id [Required]
/// ```
pub fn render_tree<S: TermStore + ?Sized>(store: &S, root: TermSetId) -> Result<String> {
    let root = store.term_set(root)?;
    let mut output = format!("{} ({})\n", root.name, root.iri);
    render_children(store, &mut output, &root, "", 0)?;
    Ok(output)
}

enum Entry {
    Group(TermSet),
    Leaf(Term),
}

fn render_children<S: TermStore + ?Sized>(
    store: &S,
    output: &mut String,
    node: &TermSet,
    prefix: &str,
    depth: usize,
) -> Result<()> {
    check_depth(depth, &node.iri)?;

    let entries: Vec<Entry> = store
        .child_term_sets(node.id)?
        .into_iter()
        .map(Entry::Group)
        .chain(store.terms_in(node.id)?.into_iter().map(Entry::Leaf))
        .collect();

    for (i, entry) in entries.iter().enumerate() {
        let is_last = i == entries.len() - 1;
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);

        match entry {
            Entry::Group(child) => {
                output.push(status_symbol(child.status));
                output.push(' ');
                output.push_str(&child.name);
                output.push_str("/\n");

                let continuation = if is_last { "    " } else { "│   " };
                let child_prefix = format!("{}{}", prefix, continuation);
                render_children(store, output, child, &child_prefix, depth + 1)?;
            }
            Entry::Leaf(term) => {
                output.push(status_symbol(term.status));
                output.push(' ');
                output.push_str(&term.name);
                output.push_str(&annotation(term));
                output.push('\n');
            }
        }
    }

    Ok(())
}

fn annotation(term: &Term) -> String {
    let parts: Vec<&str> = [
        term.attributes.use_.map(|u| u.as_str()),
        term.attributes.data_type.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        String::new()
    } else {
        format!(" [{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTermSet;
    use crate::tree::{flatten, Forest, NestedMap};
    use serde_json::json;

    fn forest(definition: serde_json::Value) -> (Forest, TermSetId) {
        let mut forest = Forest::new();
        let root = forest
            .insert_term_set(
                NewTermSet::root("course_catalog", "1.0.0", Status::Published, None).unwrap(),
            )
            .unwrap();
        let definition: NestedMap = serde_json::from_value(definition).unwrap();
        flatten(&mut forest, &definition, root.id, Status::Published, None).unwrap();
        (forest, root.id)
    }

    #[test]
    fn test_root_only() {
        let (forest, root) = forest(json!({}));
        let output = render_tree(&forest, root).unwrap();
        assert_eq!(output, "course_catalog (xss:1.0.0@course_catalog)\n");
    }

    #[test]
    fn test_nested_groups_and_terms() {
        let (mut forest, root) = forest(json!({
            "Course": {
                "Title": {"use": "Required", "data_type": "str"},
                "Legacy Code": "marker"
            },
            "Id": {"use": "Required"}
        }));
        let legacy = forest
            .find_term("xss:1.0.0@course_catalog/Course?Legacy_Code")
            .unwrap()
            .unwrap();
        forest
            .update_term_status(legacy.id, Status::Retired, None)
            .unwrap();

        let output = render_tree(&forest, root).unwrap();
        let expected = "course_catalog (xss:1.0.0@course_catalog)\n\
                        ├── ● Course/\n\
                        │   ├── ● Title [Required, str]\n\
                        │   └── ✗ Legacy Code\n\
                        └── ● Id [Required]\n";
        assert_eq!(output, expected);
    }
}
