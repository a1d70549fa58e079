//! Shape decoders: recognize one change-event kind in a parsed graph
//!
//! Payloads carry no explicit type tag, so each [`ShapeDecoder`] checks
//! whether the graph has the shape of its kind and reports a
//! [`ShapeMismatch`] value when it does not. [`VariantDecoder`] runs them in
//! priority order and stops at the first match.

use super::types::{ChangeDetails, ChangeEvent, ChangeKind};
use super::vocab::trs;
use crate::graph::{ns, Graph, Iri, Term};
use std::sync::Arc;
use thiserror::Error;

/// Why a graph does not have a particular event shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MismatchReason {
    #[error("no resource typed <{0}>")]
    NoTypedResource(String),
    #[error("{count} resources typed <{class}>, expected exactly one")]
    MultipleTypedResources { class: String, count: usize },
    #[error("event {0} has no trs:changed")]
    MissingChanged(String),
    #[error("event {about} has {count} trs:changed values, expected exactly one")]
    MultipleChanged { about: String, count: usize },
    #[error("trs:changed must be an absolute IRI, got {0}")]
    ChangedNotIri(String),
    #[error("trs:order must be a single integer, got {0}")]
    InvalidOrder(String),
}

/// A failed attempt to read a graph as one event kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a {kind} event: {reason}")]
pub struct ShapeMismatch {
    pub kind: ChangeKind,
    pub reason: MismatchReason,
}

impl ShapeMismatch {
    pub fn new(kind: ChangeKind, reason: MismatchReason) -> Self {
        Self { kind, reason }
    }
}

/// Recognizes a single change-event kind.
pub trait ShapeDecoder: Send + Sync {
    fn kind(&self) -> ChangeKind;

    /// Read the graph as this decoder's kind, or say why it does not fit.
    fn decode(&self, graph: &Graph) -> Result<ChangeEvent, ShapeMismatch>;
}

/// Decoder for the TRS event shape: exactly one node typed with the kind's
/// class, with exactly one IRI-valued `trs:changed` and at most one integer
/// `trs:order`.
#[derive(Debug, Clone, Copy)]
pub struct TrsShapeDecoder {
    kind: ChangeKind,
}

impl TrsShapeDecoder {
    pub fn new(kind: ChangeKind) -> Self {
        Self { kind }
    }

    fn mismatch(&self, reason: MismatchReason) -> ShapeMismatch {
        ShapeMismatch::new(self.kind, reason)
    }
}

impl ShapeDecoder for TrsShapeDecoder {
    fn kind(&self) -> ChangeKind {
        self.kind
    }

    fn decode(&self, graph: &Graph) -> Result<ChangeEvent, ShapeMismatch> {
        let class_iri = self.kind.class_iri();
        let class = Term::iri(class_iri);

        let about = match graph.subjects_with(ns::RDF_TYPE, &class).as_slice() {
            [] => return Err(self.mismatch(MismatchReason::NoTypedResource(class_iri.to_string()))),
            [about] => (*about).clone(),
            many => {
                return Err(self.mismatch(MismatchReason::MultipleTypedResources {
                    class: class_iri.to_string(),
                    count: many.len(),
                }))
            }
        };

        let changed = match graph.objects(&about, trs::CHANGED).as_slice() {
            [] => return Err(self.mismatch(MismatchReason::MissingChanged(about.to_string()))),
            [Term::Iri(iri)] if Iri::is_absolute(iri.as_str()) => iri.clone(),
            [other] => return Err(self.mismatch(MismatchReason::ChangedNotIri(other.to_string()))),
            many => {
                return Err(self.mismatch(MismatchReason::MultipleChanged {
                    about: about.to_string(),
                    count: many.len(),
                }))
            }
        };

        let order = match graph.objects(&about, trs::ORDER).as_slice() {
            [] => None,
            [Term::Literal(lit)] => match lit.as_i64() {
                Some(order) => Some(order),
                None => return Err(self.mismatch(MismatchReason::InvalidOrder(lit.to_string()))),
            },
            [other] => return Err(self.mismatch(MismatchReason::InvalidOrder(other.to_string()))),
            many => {
                return Err(self.mismatch(MismatchReason::InvalidOrder(format!(
                    "{} values",
                    many.len()
                ))))
            }
        };

        let mut details = ChangeDetails::new(about, changed);
        details.order = order;
        Ok(ChangeEvent::new(self.kind, details))
    }
}

/// The TRS decoders in [`ChangeKind::PRIORITY`] order
pub fn default_decoders() -> Vec<Arc<dyn ShapeDecoder>> {
    ChangeKind::PRIORITY
        .iter()
        .map(|kind| Arc::new(TrsShapeDecoder::new(*kind)) as Arc<dyn ShapeDecoder>)
        .collect()
}

/// Every shape attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_attempts(.attempts))]
pub struct UnrecognizedChangeEvent {
    /// Mismatches in the order the decoders ran
    pub attempts: Vec<ShapeMismatch>,
}

impl UnrecognizedChangeEvent {
    /// Detail of the final attempt
    pub fn last(&self) -> Option<&ShapeMismatch> {
        self.attempts.last()
    }
}

fn describe_attempts(attempts: &[ShapeMismatch]) -> String {
    match attempts.last() {
        Some(last) => format!(
            "no change-event shape matched ({} tried); last: {}",
            attempts.len(),
            last
        ),
        None => "no change-event decoders configured".to_string(),
    }
}

/// Tries an ordered list of shape decoders and returns the first success.
#[derive(Clone)]
pub struct VariantDecoder {
    decoders: Vec<Arc<dyn ShapeDecoder>>,
}

impl VariantDecoder {
    pub fn new(decoders: Vec<Arc<dyn ShapeDecoder>>) -> Self {
        Self { decoders }
    }

    /// Kinds in the order they are tried
    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.decoders.iter().map(|d| d.kind()).collect()
    }

    /// Run decoders in order. Later decoders are never invoked once one
    /// succeeds.
    pub fn decode(&self, graph: &Graph) -> Result<ChangeEvent, UnrecognizedChangeEvent> {
        let mut attempts = Vec::with_capacity(self.decoders.len());
        for decoder in &self.decoders {
            match decoder.decode(graph) {
                Ok(event) => return Ok(event),
                Err(mismatch) => {
                    tracing::trace!(kind = %decoder.kind(), %mismatch, "shape did not match");
                    attempts.push(mismatch);
                }
            }
        }
        Err(UnrecognizedChangeEvent { attempts })
    }
}

impl Default for VariantDecoder {
    fn default() -> Self {
        Self::new(default_decoders())
    }
}

impl std::fmt::Debug for VariantDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantDecoder")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Literal;

    fn event_graph(kind: ChangeKind, changed: Term) -> Graph {
        let mut g = Graph::new();
        g.add(Term::iri("urn:ev"), ns::RDF_TYPE, Term::iri(kind.class_iri()));
        g.add(Term::iri("urn:ev"), trs::CHANGED, changed);
        g
    }

    #[test]
    fn decodes_matching_kind() {
        let mut g = event_graph(ChangeKind::Creation, Term::iri("urn:r1"));
        g.add(Term::iri("urn:ev"), trs::ORDER, Term::literal(Literal::integer(9)));

        let event = TrsShapeDecoder::new(ChangeKind::Creation).decode(&g).unwrap();
        assert_eq!(event.kind(), ChangeKind::Creation);
        assert_eq!(event.changed().as_str(), "urn:r1");
        assert_eq!(event.about(), &Term::iri("urn:ev"));
        assert_eq!(event.order(), Some(9));
    }

    #[test]
    fn other_kind_is_a_mismatch() {
        let g = event_graph(ChangeKind::Creation, Term::iri("urn:r1"));
        let err = TrsShapeDecoder::new(ChangeKind::Deletion).decode(&g).unwrap_err();
        assert_eq!(err.kind, ChangeKind::Deletion);
        assert!(matches!(err.reason, MismatchReason::NoTypedResource(_)));
    }

    #[test]
    fn literal_changed_is_rejected() {
        let g = event_graph(ChangeKind::Modification, Term::literal(Literal::string("urn:r1")));
        let err = TrsShapeDecoder::new(ChangeKind::Modification).decode(&g).unwrap_err();
        assert!(matches!(err.reason, MismatchReason::ChangedNotIri(_)));
    }

    #[test]
    fn relative_changed_is_rejected() {
        let g = event_graph(ChangeKind::Creation, Term::iri("r1"));
        let err = TrsShapeDecoder::new(ChangeKind::Creation).decode(&g).unwrap_err();
        assert_eq!(err.reason, MismatchReason::ChangedNotIri("<r1>".to_string()));
    }

    #[test]
    fn missing_changed_is_rejected() {
        let mut g = Graph::new();
        g.add(Term::iri("urn:ev"), ns::RDF_TYPE, Term::iri(trs::DELETION));
        let err = TrsShapeDecoder::new(ChangeKind::Deletion).decode(&g).unwrap_err();
        assert!(matches!(err.reason, MismatchReason::MissingChanged(_)));
    }

    #[test]
    fn two_changed_values_are_rejected() {
        let mut g = event_graph(ChangeKind::Deletion, Term::iri("urn:r1"));
        g.add(Term::iri("urn:ev"), trs::CHANGED, Term::iri("urn:r2"));
        let err = TrsShapeDecoder::new(ChangeKind::Deletion).decode(&g).unwrap_err();
        assert!(matches!(err.reason, MismatchReason::MultipleChanged { count: 2, .. }));
    }

    #[test]
    fn two_events_of_same_kind_are_rejected() {
        let mut g = event_graph(ChangeKind::Creation, Term::iri("urn:r1"));
        g.add(Term::iri("urn:ev2"), ns::RDF_TYPE, Term::iri(trs::CREATION));
        let err = TrsShapeDecoder::new(ChangeKind::Creation).decode(&g).unwrap_err();
        assert!(matches!(err.reason, MismatchReason::MultipleTypedResources { count: 2, .. }));
    }

    #[test]
    fn non_integer_order_is_rejected() {
        let mut g = event_graph(ChangeKind::Creation, Term::iri("urn:r1"));
        g.add(Term::iri("urn:ev"), trs::ORDER, Term::literal(Literal::string("first")));
        let err = TrsShapeDecoder::new(ChangeKind::Creation).decode(&g).unwrap_err();
        assert!(matches!(err.reason, MismatchReason::InvalidOrder(_)));
    }

    #[test]
    fn ambiguous_graph_resolves_by_priority() {
        // typed both ways: Modification is tried first and wins
        let mut g = event_graph(ChangeKind::Deletion, Term::iri("urn:r1"));
        g.add(Term::iri("urn:ev"), ns::RDF_TYPE, Term::iri(trs::MODIFICATION));

        let event = VariantDecoder::default().decode(&g).unwrap();
        assert_eq!(event.kind(), ChangeKind::Modification);
    }

    #[test]
    fn all_mismatches_are_reported_in_order() {
        let mut g = Graph::new();
        g.add(Term::iri("urn:x"), "urn:p", Term::iri("urn:y"));

        let err = VariantDecoder::default().decode(&g).unwrap_err();
        let kinds: Vec<ChangeKind> = err.attempts.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, ChangeKind::PRIORITY.to_vec());
        assert_eq!(err.last().map(|m| m.kind), Some(ChangeKind::Deletion));
    }

    #[test]
    fn empty_decoder_list_never_matches() {
        let err = VariantDecoder::new(Vec::new()).decode(&Graph::new()).unwrap_err();
        assert!(err.attempts.is_empty());
        assert_eq!(err.to_string(), "no change-event decoders configured");
    }
}
