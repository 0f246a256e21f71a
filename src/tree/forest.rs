use std::collections::{BTreeSet, HashMap};

use super::TermStore;
use crate::error::{Result, TreeError};
use crate::models::*;

/// In-memory arena of term trees.
///
/// Ids are indices into the node vectors, so they stay valid for the life
/// of the forest. Mappings are an adjacency set keyed by [`TermId`]; no node
/// holds a reference to another.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    term_sets: Vec<TermSet>,
    terms: Vec<Term>,
    term_sets_by_iri: HashMap<String, TermSetId>,
    terms_by_iri: HashMap<String, TermId>,
    children: HashMap<TermSetId, Vec<TermSetId>>,
    members: HashMap<TermSetId, Vec<TermId>>,
    mappings: HashMap<TermId, BTreeSet<TermId>>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term_set_count(&self) -> usize {
        self.term_sets.len()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    fn term_set_mut(&mut self, id: TermSetId) -> Result<&mut TermSet> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.term_sets.get_mut(index))
            .ok_or_else(|| TreeError::not_found(format!("term set {} not found", id.0)))
    }

    fn term_mut(&mut self, id: TermId) -> Result<&mut Term> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.terms.get_mut(index))
            .ok_or_else(|| TreeError::not_found(format!("term {} not found", id.0)))
    }

    fn term_ref(&self, id: TermId) -> Result<&Term> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.terms.get(index))
            .ok_or_else(|| TreeError::not_found(format!("term {} not found", id.0)))
    }
}

impl TermStore for Forest {
    fn term_set(&self, id: TermSetId) -> Result<TermSet> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.term_sets.get(index))
            .cloned()
            .ok_or_else(|| TreeError::not_found(format!("term set {} not found", id.0)))
    }

    fn term(&self, id: TermId) -> Result<Term> {
        self.term_ref(id).cloned()
    }

    fn find_term_set(&self, iri: &str) -> Result<Option<TermSet>> {
        self.term_sets_by_iri
            .get(iri)
            .map(|id| self.term_set(*id))
            .transpose()
    }

    fn find_term(&self, iri: &str) -> Result<Option<Term>> {
        self.terms_by_iri
            .get(iri)
            .map(|id| self.term(*id))
            .transpose()
    }

    fn child_term_sets(&self, parent: TermSetId) -> Result<Vec<TermSet>> {
        self.children
            .get(&parent)
            .map(|ids| ids.iter().map(|id| self.term_set(*id)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn terms_in(&self, term_set: TermSetId) -> Result<Vec<Term>> {
        self.members
            .get(&term_set)
            .map(|ids| ids.iter().map(|id| self.term(*id)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn insert_term_set(&mut self, new: NewTermSet) -> Result<TermSet> {
        if self.term_sets_by_iri.contains_key(&new.iri) {
            return Err(TreeError::Duplicate(new.iri));
        }
        if let NodeKind::Child { parent } = new.kind {
            self.term_set(parent)?;
        }

        let id = TermSetId(self.term_sets.len() as i64);
        let term_set = TermSet {
            id,
            name: new.name,
            kind: new.kind,
            status: new.status,
            iri: new.iri,
            updated_by: new.updated_by,
        };

        if let Some(parent) = term_set.parent() {
            self.children.entry(parent).or_default().push(id);
        }
        self.term_sets_by_iri.insert(term_set.iri.clone(), id);
        self.term_sets.push(term_set.clone());
        Ok(term_set)
    }

    fn insert_term(&mut self, new: NewTerm) -> Result<Term> {
        if self.terms_by_iri.contains_key(&new.iri) {
            return Err(TreeError::Duplicate(new.iri));
        }
        self.term_set(new.term_set)?;

        let id = TermId(self.terms.len() as i64);
        let term = Term {
            id,
            term_set: new.term_set,
            name: new.name,
            attributes: new.attributes,
            status: new.status,
            iri: new.iri,
            updated_by: new.updated_by,
        };

        self.members.entry(term.term_set).or_default().push(id);
        self.terms_by_iri.insert(term.iri.clone(), id);
        self.terms.push(term.clone());
        Ok(term)
    }

    fn update_term_set_status(
        &mut self,
        id: TermSetId,
        status: Status,
        updated_by: Option<&str>,
    ) -> Result<()> {
        let term_set = self.term_set_mut(id)?;
        term_set.status = status;
        term_set.updated_by = updated_by.map(str::to_string);
        Ok(())
    }

    fn update_term_status(
        &mut self,
        id: TermId,
        status: Status,
        updated_by: Option<&str>,
    ) -> Result<()> {
        let term = self.term_mut(id)?;
        term.status = status;
        term.updated_by = updated_by.map(str::to_string);
        Ok(())
    }

    fn update_term_set_name(&mut self, id: TermSetId, name: &str, iri: &str) -> Result<()> {
        let term_set = self.term_set_mut(id)?;
        let old_iri = std::mem::replace(&mut term_set.iri, iri.to_string());
        term_set.name = name.to_string();
        self.term_sets_by_iri.remove(&old_iri);
        self.term_sets_by_iri.insert(iri.to_string(), id);
        Ok(())
    }

    fn update_term_name(&mut self, id: TermId, name: &str, iri: &str) -> Result<()> {
        let term = self.term_mut(id)?;
        let old_iri = std::mem::replace(&mut term.iri, iri.to_string());
        term.name = name.to_string();
        self.terms_by_iri.remove(&old_iri);
        self.terms_by_iri.insert(iri.to_string(), id);
        Ok(())
    }

    fn add_mapping(&mut self, term: TermId, mapped: TermId) -> Result<bool> {
        self.term_ref(term)?;
        self.term_ref(mapped)?;
        Ok(self.mappings.entry(term).or_default().insert(mapped))
    }

    fn remove_mapping(&mut self, term: TermId, mapped: TermId) -> Result<bool> {
        Ok(self
            .mappings
            .get_mut(&term)
            .map(|set| set.remove(&mapped))
            .unwrap_or(false))
    }

    fn mapped_terms(&self, term: TermId) -> Result<Vec<Term>> {
        self.term_ref(term)?;
        self.mappings
            .get(&term)
            .map(|ids| ids.iter().map(|id| self.term(*id)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_iris() {
        let mut forest = Forest::new();
        let new = NewTermSet::root("test", "1.0.0", Status::Published, None).unwrap();
        forest.insert_term_set(new.clone()).unwrap();
        assert!(matches!(
            forest.insert_term_set(new),
            Err(TreeError::Duplicate(iri)) if iri == "xss:1.0.0@test"
        ));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let forest = Forest::new();
        assert!(matches!(forest.term_set(TermSetId(3)), Err(TreeError::NotFound(_))));
        assert!(matches!(forest.term(TermId(-1)), Err(TreeError::NotFound(_))));
    }

    #[test]
    fn mappings_are_a_set() {
        let mut forest = Forest::new();
        let root = forest
            .insert_term_set(NewTermSet::root("t", "1.0.0", Status::Published, None).unwrap())
            .unwrap();
        let a = forest
            .insert_term(NewTerm::new(&root, "a", LeafAttributes::default(), Status::Published, None))
            .unwrap();
        let b = forest
            .insert_term(NewTerm::new(&root, "b", LeafAttributes::default(), Status::Published, None))
            .unwrap();

        assert!(forest.add_mapping(a.id, b.id).unwrap());
        assert!(!forest.add_mapping(a.id, b.id).unwrap());
        assert_eq!(forest.mapped_terms(a.id).unwrap().len(), 1);
        assert!(forest.mapped_terms(b.id).unwrap().is_empty());

        assert!(forest.remove_mapping(a.id, b.id).unwrap());
        assert!(!forest.remove_mapping(a.id, b.id).unwrap());
    }
}
