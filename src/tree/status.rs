use super::{check_depth, TermStore};
use crate::error::Result;
use crate::models::*;

/// Set `status` on a term set and everything below it.
///
/// Nodes already carrying `status` are left untouched, including their
/// `updated_by`. Returns how many nodes were changed, so a repeated call
/// returns 0.
pub fn propagate_status<S: TermStore + ?Sized>(
    store: &mut S,
    node: TermSetId,
    status: Status,
    updated_by: Option<&str>,
) -> Result<usize> {
    let node = store.term_set(node)?;
    let changed = propagate(store, &node, status, updated_by, 0)?;
    tracing::debug!("Set {} nodes under {} to {}", changed, node.iri, status.as_str());
    Ok(changed)
}

fn propagate<S: TermStore + ?Sized>(
    store: &mut S,
    node: &TermSet,
    status: Status,
    updated_by: Option<&str>,
    depth: usize,
) -> Result<usize> {
    check_depth(depth, &node.iri)?;

    let mut changed = 0;
    if node.status != status {
        store.update_term_set_status(node.id, status, updated_by)?;
        changed += 1;
    }

    for child in store.child_term_sets(node.id)? {
        changed += propagate(store, &child, status, updated_by, depth + 1)?;
    }

    for term in store.terms_in(node.id)? {
        if term.status != status {
            store.update_term_status(term.id, status, updated_by)?;
            changed += 1;
        }
    }

    Ok(changed)
}
