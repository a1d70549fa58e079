//! Triples and the in-memory graph

use super::term::{Iri, Term};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A (subject, predicate, object) statement.
///
/// Subjects are IRIs or blank nodes; the JSON-LD parser never produces a
/// literal subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Iri,
    pub object: Term,
}

impl Triple {
    pub fn new(
        subject: impl Into<Term>,
        predicate: impl Into<Iri>,
        object: impl Into<Term>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}> {} .", self.subject, self.predicate, self.object)
    }
}

/// An unordered set of triples.
///
/// Set semantics: inserting a triple that is already present is a no-op.
/// Iteration order is deterministic (SPO lexicographic).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Graph {
    triples: BTreeSet<Triple>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple. Returns false if it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    /// Convenience form of [`Graph::insert`]
    pub fn add(
        &mut self,
        subject: impl Into<Term>,
        predicate: impl Into<Iri>,
        object: impl Into<Term>,
    ) {
        self.insert(Triple::new(subject, predicate, object));
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Distinct subjects that have `predicate` pointing at `object`
    pub fn subjects_with<'a>(&'a self, predicate: &'a str, object: &'a Term) -> Vec<&'a Term> {
        let mut subjects: Vec<&Term> = self
            .triples
            .iter()
            .filter(|t| t.predicate.as_str() == predicate && &t.object == object)
            .map(|t| &t.subject)
            .collect();
        subjects.dedup();
        subjects
    }

    /// Objects of `subject` under `predicate`
    pub fn objects<'a>(&'a self, subject: &'a Term, predicate: &'a str) -> Vec<&'a Term> {
        self.triples
            .iter()
            .filter(|t| &t.subject == subject && t.predicate.as_str() == predicate)
            .map(|t| &t.object)
            .collect()
    }

    /// True if any triple has `subject` in subject position
    pub fn has_subject(&self, subject: &Term) -> bool {
        self.triples.iter().any(|t| &t.subject == subject)
    }

    /// Copy of this graph without the triples about `subject`.
    /// See [`super::trim`].
    pub fn without_subject(&self, subject: &Term) -> Graph {
        super::trim(self, subject)
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}

impl Extend<Triple> for Graph {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        self.triples.extend(iter);
    }
}

impl IntoIterator for Graph {
    type Item = Triple;
    type IntoIter = std::collections::btree_set::IntoIter<Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}

impl<'a> IntoIterator for &'a Graph {
    type Item = &'a Triple;
    type IntoIter = std::collections::btree_set::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}
