use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_depth, collect_terms, dotted_path, NestedMap, TermStore};
use crate::error::Result;
use crate::iri::{is_within, normalize_name};
use crate::models::*;

/// One mapping entry that could not be turned into a correspondence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedLeaf {
    /// Dotted path of the entry in the mapping specification (target side).
    pub target_path: String,
    /// The source path the entry named, if it named one.
    pub source_path: Option<String>,
    pub reason: String,
}

/// Outcome of walking a mapping specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingReport {
    /// Correspondences resolved on both sides, including ones already recorded.
    pub applied: usize,
    /// Correspondences removed before a re-apply.
    pub cleared: usize,
    pub unresolved: Vec<UnresolvedLeaf>,
}

impl MappingReport {
    fn skip(&mut self, target_path: &[String], source_path: Option<&str>, reason: String) {
        let target_path = target_path.join(".");
        tracing::warn!("Skipping mapping for '{}': {}", target_path, reason);
        self.unresolved.push(UnresolvedLeaf {
            target_path,
            source_path: source_path.map(str::to_string),
            reason,
        });
    }
}

/// Record the correspondences described by `spec` between two trees.
///
/// `spec` mirrors the target tree: nested keys name target term sets, and a
/// string value at key `k` is the dotted path (from the source root) of the
/// source term that target term `k` corresponds to. Entries that fail to
/// resolve on either side are reported and skipped; the walk always visits
/// the whole specification.
pub fn apply_mapping<S: TermStore + ?Sized>(
    store: &mut S,
    target_root: TermSetId,
    source_root: TermSetId,
    spec: &NestedMap,
) -> Result<MappingReport> {
    let target = store.term_set(target_root)?;
    let source = store.term_set(source_root)?;

    let mut report = MappingReport::default();
    apply_level(store, &target, &source, spec, &mut Vec::new(), &mut report, 0)?;

    tracing::info!(
        "Mapped {} terms from {} into {} ({} skipped)",
        report.applied,
        source.iri,
        target.iri,
        report.unresolved.len()
    );
    Ok(report)
}

/// Replace every correspondence from the target tree into the source tree
/// with the ones described by `spec`.
pub fn reapply_mapping<S: TermStore + ?Sized>(
    store: &mut S,
    target_root: TermSetId,
    source_root: TermSetId,
    spec: &NestedMap,
) -> Result<MappingReport> {
    let target = store.term_set(target_root)?;
    let source = store.term_set(source_root)?;

    let mut cleared = 0;
    for term in collect_terms(store, &target)? {
        for mapped in store.mapped_terms(term.id)? {
            if is_within(&mapped.iri, &source.iri) && store.remove_mapping(term.id, mapped.id)? {
                cleared += 1;
            }
        }
    }

    let mut report = apply_mapping(store, target_root, source_root, spec)?;
    report.cleared = cleared;
    Ok(report)
}

fn apply_level<S: TermStore + ?Sized>(
    store: &mut S,
    target: &TermSet,
    source: &TermSet,
    spec: &NestedMap,
    path: &mut Vec<String>,
    report: &mut MappingReport,
    depth: usize,
) -> Result<()> {
    check_depth(depth, &target.iri)?;

    for (key, value) in spec {
        path.push(key.clone());
        match value {
            Value::String(source_path) => {
                apply_leaf(store, target, source, key, source_path, path, report)?;
            }
            Value::Object(nested) => match store.child_named(target, key)? {
                Some(child) => apply_level(store, &child, source, nested, path, report, depth + 1)?,
                None => report.skip(
                    path,
                    None,
                    format!("target {} has no term set '{}'", target.iri, key),
                ),
            },
            other => report.skip(path, None, format!("unsupported mapping value {}", other)),
        }
        path.pop();
    }

    Ok(())
}

fn apply_leaf<S: TermStore + ?Sized>(
    store: &mut S,
    target: &TermSet,
    source: &TermSet,
    key: &str,
    source_path: &str,
    path: &[String],
    report: &mut MappingReport,
) -> Result<()> {
    let Some(target_term) = store.term_named(target, key)? else {
        report.skip(
            path,
            Some(source_path),
            format!("target {} has no term '{}'", target.iri, key),
        );
        return Ok(());
    };

    let segments: Vec<String> = source_path.split('.').map(normalize_name).collect();
    let Some((term_name, groups)) = segments.split_last() else {
        return Ok(());
    };

    let mut node = source.clone();
    for group in groups {
        match store.child_named(&node, group)? {
            Some(child) => node = child,
            None => {
                report.skip(
                    path,
                    Some(source_path),
                    format!("source {} has no term set '{}'", node.iri, group),
                );
                return Ok(());
            }
        }
    }

    let Some(source_term) = store.term_named(&node, term_name)? else {
        report.skip(
            path,
            Some(source_path),
            format!("source {} has no term '{}'", node.iri, term_name),
        );
        return Ok(());
    };

    store.add_mapping(target_term.id, source_term.id)?;
    report.applied += 1;
    Ok(())
}

/// Which published terms under `node` map to something under `target_root`.
///
/// `target_root` is matched as a plain iri prefix. The result mirrors the
/// published structure under `node`, keeps only mapped terms, and drops
/// term sets with nothing mapped. A term with one correspondent maps to its
/// dotted path; one with several maps to a list of paths ordered by iri.
/// Starting from a retired term set yields an empty map.
pub fn resolve_mapped_to<S: TermStore + ?Sized>(
    store: &S,
    node: TermSetId,
    target_root: &str,
) -> Result<NestedMap> {
    let node = store.term_set(node)?;
    if !node.status.is_published() {
        return Ok(NestedMap::new());
    }
    resolve_node(store, &node, target_root, 0)
}

fn resolve_node<S: TermStore + ?Sized>(
    store: &S,
    node: &TermSet,
    target_root: &str,
    depth: usize,
) -> Result<NestedMap> {
    check_depth(depth, &node.iri)?;

    let mut out = NestedMap::new();
    for child in store.child_term_sets(node.id)? {
        if !child.status.is_published() {
            continue;
        }
        let resolved = resolve_node(store, &child, target_root, depth + 1)?;
        if !resolved.is_empty() {
            out.insert(child.name, Value::Object(resolved));
        }
    }

    for term in store.terms_in(node.id)? {
        if !term.status.is_published() {
            continue;
        }

        let mut mapped: Vec<Term> = store
            .mapped_terms(term.id)?
            .into_iter()
            .filter(|t| t.iri.starts_with(target_root))
            .collect();
        if mapped.is_empty() {
            continue;
        }
        mapped.sort_by(|a, b| a.iri.cmp(&b.iri));

        let mut paths = mapped
            .iter()
            .map(|t| dotted_path(store, t))
            .collect::<Result<Vec<_>>>()?;
        let value = if paths.len() == 1 {
            Value::String(paths.remove(0))
        } else {
            Value::Array(paths.into_iter().map(Value::String).collect())
        };
        out.insert(term.name, value);
    }

    Ok(out)
}
