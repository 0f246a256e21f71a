//! Term-tree algorithms and the storage seam they run against.
//!
//! Every operation here is written once against [`TermStore`] and runs
//! unchanged over the in-memory [`Forest`] arena and over the SQLite store
//! handed out by [`crate::db::Database::transaction`].
//!
//! All walks are recursive over schema nesting and carry an explicit depth
//! counter; anything deeper than [`MAX_TREE_DEPTH`] fails with
//! [`TreeError::DepthExceeded`].

mod export;
mod flatten;
mod forest;
mod mapping;
mod render;
mod status;

pub use export::export;
pub use flatten::{classify, flatten, Classification, FlattenSummary};
pub use forest::Forest;
pub use mapping::{apply_mapping, reapply_mapping, resolve_mapped_to, MappingReport, UnresolvedLeaf};
pub use render::render_tree;
pub use status::propagate_status;

use crate::error::{Result, TreeError};
use crate::iri::{derive_iri, IriContext};
use crate::models::*;

/// Nested key/value data: schema definitions, mapping specs, and query results.
pub type NestedMap = serde_json::Map<String, serde_json::Value>;

pub const MAX_TREE_DEPTH: usize = 64;

/// Record primitives the tree algorithms need from storage.
///
/// Lookups by id fail with [`TreeError::NotFound`]; lookups by iri return
/// `None`. Listing methods return records in creation order.
pub trait TermStore {
    fn term_set(&self, id: TermSetId) -> Result<TermSet>;
    fn term(&self, id: TermId) -> Result<Term>;
    fn find_term_set(&self, iri: &str) -> Result<Option<TermSet>>;
    fn find_term(&self, iri: &str) -> Result<Option<Term>>;
    fn child_term_sets(&self, parent: TermSetId) -> Result<Vec<TermSet>>;
    fn terms_in(&self, term_set: TermSetId) -> Result<Vec<Term>>;

    /// Store a new term set. Fails with [`TreeError::Duplicate`] if the iri is taken.
    fn insert_term_set(&mut self, new: NewTermSet) -> Result<TermSet>;
    /// Store a new term. Fails with [`TreeError::Duplicate`] if the iri is taken.
    fn insert_term(&mut self, new: NewTerm) -> Result<Term>;

    fn update_term_set_status(
        &mut self,
        id: TermSetId,
        status: Status,
        updated_by: Option<&str>,
    ) -> Result<()>;
    fn update_term_status(&mut self, id: TermId, status: Status, updated_by: Option<&str>)
        -> Result<()>;
    fn update_term_set_name(&mut self, id: TermSetId, name: &str, iri: &str) -> Result<()>;
    fn update_term_name(&mut self, id: TermId, name: &str, iri: &str) -> Result<()>;

    /// Record that `term` maps to `mapped`. Returns false if it already did.
    fn add_mapping(&mut self, term: TermId, mapped: TermId) -> Result<bool>;
    /// Returns false if there was nothing to remove.
    fn remove_mapping(&mut self, term: TermId, mapped: TermId) -> Result<bool>;
    /// Terms that `term` maps to.
    fn mapped_terms(&self, term: TermId) -> Result<Vec<Term>>;

    fn child_named(&self, parent: &TermSet, name: &str) -> Result<Option<TermSet>> {
        let iri = derive_iri(
            IriContext::Child {
                parent_iri: &parent.iri,
            },
            name,
        );
        self.find_term_set(&iri)
    }

    fn term_named(&self, term_set: &TermSet, name: &str) -> Result<Option<Term>> {
        let iri = derive_iri(
            IriContext::Term {
                term_set_iri: &term_set.iri,
            },
            name,
        );
        self.find_term(&iri)
    }
}

pub(crate) fn check_depth(depth: usize, iri: &str) -> Result<()> {
    if depth > MAX_TREE_DEPTH {
        return Err(TreeError::DepthExceeded {
            limit: MAX_TREE_DEPTH,
            iri: iri.to_string(),
        });
    }
    Ok(())
}

/// Walk parent links up from `id` to the root term set.
pub fn root_of<S: TermStore + ?Sized>(store: &S, id: TermSetId) -> Result<TermSet> {
    let mut node = store.term_set(id)?;
    let mut depth = 0;
    while let Some(parent) = node.parent() {
        depth += 1;
        check_depth(depth, &node.iri)?;
        node = store.term_set(parent)?;
    }
    Ok(node)
}

/// The version a node reports: its own for roots, the root ancestor's for children.
pub fn version_of<S: TermStore + ?Sized>(store: &S, id: TermSetId) -> Result<String> {
    let root = root_of(store, id)?;
    root.stored_version()
        .map(str::to_string)
        .ok_or_else(|| TreeError::not_found(format!("no root version above '{}'", root.iri)))
}

/// Dotted path of a term relative to its tree root, e.g. `Course.Title`.
///
/// The root's own name is not part of the path, so the result can be used
/// directly as a leaf value of a mapping specification.
pub fn dotted_path<S: TermStore + ?Sized>(store: &S, term: &Term) -> Result<String> {
    let mut segments = vec![term.name.clone()];
    let mut node = store.term_set(term.term_set)?;
    while let Some(parent) = node.parent() {
        check_depth(segments.len(), &node.iri)?;
        segments.push(node.name);
        node = store.term_set(parent)?;
    }
    segments.reverse();
    Ok(segments.join("."))
}

/// Every term under `node`, depth-first, term sets before their terms.
pub fn collect_terms<S: TermStore + ?Sized>(store: &S, node: &TermSet) -> Result<Vec<Term>> {
    fn walk<S: TermStore + ?Sized>(
        store: &S,
        node: &TermSet,
        depth: usize,
        out: &mut Vec<Term>,
    ) -> Result<()> {
        check_depth(depth, &node.iri)?;
        for child in store.child_term_sets(node.id)? {
            walk(store, &child, depth + 1, out)?;
        }
        out.extend(store.terms_in(node.id)?);
        Ok(())
    }

    let mut out = Vec::new();
    walk(store, node, 0, &mut out)?;
    Ok(out)
}

/// Rename a term set and re-derive its iri.
///
/// Descendant iris embed this node's iri and are never rewritten, so a node
/// that already owns child term sets or terms cannot be renamed.
pub fn rename_term_set<S: TermStore + ?Sized>(
    store: &mut S,
    id: TermSetId,
    name: &str,
) -> Result<TermSet> {
    let mut node = store.term_set(id)?;
    if !store.child_term_sets(id)?.is_empty() || !store.terms_in(id)?.is_empty() {
        return Err(TreeError::RenameUnsupported(node.iri));
    }

    let iri = match &node.kind {
        NodeKind::Root { version } => derive_iri(IriContext::Root { version }, name),
        NodeKind::Child { parent } => {
            let parent = store.term_set(*parent)?;
            derive_iri(
                IriContext::Child {
                    parent_iri: &parent.iri,
                },
                name,
            )
        }
    };
    if iri != node.iri && store.find_term_set(&iri)?.is_some() {
        return Err(TreeError::Duplicate(iri));
    }

    store.update_term_set_name(id, name, &iri)?;
    node.name = name.to_string();
    node.iri = iri;
    Ok(node)
}

/// Rename a term and re-derive its iri. Mapping links are kept.
pub fn rename_term<S: TermStore + ?Sized>(store: &mut S, id: TermId, name: &str) -> Result<Term> {
    let mut term = store.term(id)?;
    let term_set = store.term_set(term.term_set)?;
    let iri = derive_iri(
        IriContext::Term {
            term_set_iri: &term_set.iri,
        },
        name,
    );
    if iri != term.iri && store.find_term(&iri)?.is_some() {
        return Err(TreeError::Duplicate(iri));
    }

    store.update_term_name(id, name, &iri)?;
    term.name = name.to_string();
    term.iri = iri;
    Ok(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Forest, TermSet, TermSet, Term) {
        let mut forest = Forest::new();
        let root = forest
            .insert_term_set(NewTermSet::root("test", "1.2.3", Status::Published, None).unwrap())
            .unwrap();
        let course = forest
            .insert_term_set(NewTermSet::child(&root, "Course", Status::Published, None))
            .unwrap();
        let title = forest
            .insert_term(NewTerm::new(
                &course,
                "Title",
                LeafAttributes::default(),
                Status::Published,
                None,
            ))
            .unwrap();
        (forest, root, course, title)
    }

    #[test]
    fn child_reads_root_version() {
        let (forest, root, course, _) = sample();
        assert_eq!(version_of(&forest, course.id).unwrap(), "1.2.3");
        assert_eq!(root_of(&forest, course.id).unwrap().id, root.id);
    }

    #[test]
    fn dotted_path_excludes_root_name() {
        let (forest, _, _, title) = sample();
        assert_eq!(dotted_path(&forest, &title).unwrap(), "Course.Title");
    }

    #[test]
    fn lookup_by_name_normalizes_spaces() {
        let (mut forest, root, _, _) = sample();
        let spaced = forest
            .insert_term_set(NewTermSet::child(&root, "Contact Info", Status::Published, None))
            .unwrap();
        let found = forest.child_named(&root, "Contact Info").unwrap().unwrap();
        assert_eq!(found.id, spaced.id);
        assert!(forest.child_named(&root, "Missing").unwrap().is_none());
    }

    #[test]
    fn renaming_a_node_with_descendants_is_rejected() {
        let (mut forest, root, course, _) = sample();
        assert!(matches!(
            rename_term_set(&mut forest, root.id, "renamed"),
            Err(TreeError::RenameUnsupported(_))
        ));
        assert!(matches!(
            rename_term_set(&mut forest, course.id, "Class"),
            Err(TreeError::RenameUnsupported(_))
        ));
    }

    #[test]
    fn renaming_a_leaf_group_rederives_iri() {
        let (mut forest, root, _, _) = sample();
        let empty = forest
            .insert_term_set(NewTermSet::child(&root, "Empty", Status::Published, None))
            .unwrap();
        let renamed = rename_term_set(&mut forest, empty.id, "Still Empty").unwrap();
        assert_eq!(renamed.iri, "xss:1.2.3@test/Still_Empty");
        assert!(forest.find_term_set("xss:1.2.3@test/Empty").unwrap().is_none());
        assert!(forest.find_term_set(&renamed.iri).unwrap().is_some());
    }

    #[test]
    fn renaming_a_term_rederives_iri() {
        let (mut forest, _, _, title) = sample();
        let renamed = rename_term(&mut forest, title.id, "Name").unwrap();
        assert_eq!(renamed.iri, "xss:1.2.3@test/Course?Name");
        assert_eq!(forest.term(title.id).unwrap().name, "Name");
    }

    #[test]
    fn collect_terms_walks_every_level() {
        let (mut forest, root, _, _) = sample();
        forest
            .insert_term(NewTerm::new(
                &root,
                "Top",
                LeafAttributes::default(),
                Status::Published,
                None,
            ))
            .unwrap();
        let names: Vec<_> = collect_terms(&forest, &root)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Title", "Top"]);
    }
}
