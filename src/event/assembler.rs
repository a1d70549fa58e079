//! EventAssembler: payload bytes to a [`ChangeEventMessage`]
//!
//! Decode steps:
//! 1. Reject payloads that start with a known bad-producer marker
//! 2. Parse the payload into a graph (fatal on failure)
//! 3. Try the event shapes in priority order
//! 4. Trim the changed resource's own triples to form the context graph

use super::decoder::{ShapeDecoder, UnrecognizedChangeEvent, VariantDecoder};
use super::types::ChangeEventMessage;
use crate::graph::{Graph, Term};
use crate::jsonld::{JsonLdParser, ParseError, PayloadParser};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Prefix of a model object's debug rendering sent in place of a
/// serialized graph
pub const MODEL_DUMP_MARKER: &str = "<ModelCom";

/// Errors from decoding a payload
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: starts with '{marker}', a model dump rather than a graph")]
    MalformedPayload { marker: String },

    #[error("unparsable payload: {0}")]
    UnparsablePayload(#[from] ParseError),

    #[error("unrecognized change event: {0}")]
    UnrecognizedChangeEvent(#[from] UnrecognizedChangeEvent),
}

/// Builds change-event messages from raw payloads.
///
/// Holds no per-payload state, so one assembler is shared by every
/// worker task.
#[derive(Clone)]
pub struct EventAssembler {
    parser: Arc<dyn PayloadParser>,
    variants: VariantDecoder,
    malformed_markers: Vec<String>,
}

impl EventAssembler {
    /// JSON-LD parser, TRS decoders, and the model-dump marker.
    pub fn new() -> Self {
        Self {
            parser: Arc::new(JsonLdParser::new()),
            variants: VariantDecoder::default(),
            malformed_markers: vec![MODEL_DUMP_MARKER.to_string()],
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn PayloadParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replace the decoder list. Order is the order they are tried.
    pub fn with_decoders(mut self, decoders: Vec<Arc<dyn ShapeDecoder>>) -> Self {
        self.variants = VariantDecoder::new(decoders);
        self
    }

    pub fn with_malformed_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.malformed_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn malformed_markers(&self) -> &[String] {
        &self.malformed_markers
    }

    /// Fail if the payload starts with a malformed-payload marker.
    pub fn check_wellformed(&self, payload: &[u8]) -> Result<(), DecodeError> {
        match self
            .malformed_markers
            .iter()
            .find(|m| !m.is_empty() && payload.starts_with(m.as_bytes()))
        {
            Some(marker) => Err(DecodeError::MalformedPayload {
                marker: marker.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Decode a raw payload into a change-event message.
    pub fn decode(&self, payload: &[u8]) -> Result<ChangeEventMessage, DecodeError> {
        self.check_wellformed(payload)?;

        let text = std::str::from_utf8(payload).map_err(ParseError::from)?;
        debug!(media_type = self.parser.media_type(), bytes = payload.len(), "parsing payload");
        let graph = self.parser.parse(text)?;

        self.assemble(graph)
    }

    /// Decode an already-parsed graph.
    pub fn assemble(&self, graph: Graph) -> Result<ChangeEventMessage, DecodeError> {
        let event = self.variants.decode(&graph)?;
        let context = graph.without_subject(&Term::Iri(event.changed().clone()));
        debug!(
            kind = %event.kind(),
            changed = %event.changed(),
            triples = graph.len(),
            context_triples = context.len(),
            "change event decoded"
        );
        Ok(ChangeEventMessage::new(event, context))
    }
}

impl Default for EventAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventAssembler")
            .field("media_type", &self.parser.media_type())
            .field("variants", &self.variants)
            .field("malformed_markers", &self.malformed_markers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::decoder::{MismatchReason, ShapeMismatch};
    use crate::event::types::{ChangeEvent, ChangeKind};
    use crate::event::vocab::trs;
    use crate::event::TrsShapeDecoder;
    use crate::graph::{Literal, Triple};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // === Test doubles ===

    /// Wraps a decoder and counts how often it runs
    struct CountingDecoder {
        inner: TrsShapeDecoder,
        calls: Arc<AtomicUsize>,
    }

    impl CountingDecoder {
        fn new(kind: ChangeKind) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    inner: TrsShapeDecoder::new(kind),
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    impl ShapeDecoder for CountingDecoder {
        fn kind(&self) -> ChangeKind {
            self.inner.kind()
        }

        fn decode(&self, graph: &Graph) -> Result<ChangeEvent, ShapeMismatch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.decode(graph)
        }
    }

    /// Parser that records whether it was called
    struct CountingParser {
        calls: AtomicUsize,
    }

    impl PayloadParser for CountingParser {
        fn media_type(&self) -> &str {
            "application/ld+json"
        }

        fn parse(&self, payload: &str) -> Result<Graph, ParseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            JsonLdParser::new().parse(payload)
        }
    }

    fn payload(kind: &str, changed: &str) -> Vec<u8> {
        json!({
            "@context": {
                "trs": trs::NS,
                "ex": "http://example.org/",
                "changed": { "@id": "trs:changed", "@type": "@id" }
            },
            "@graph": [
                { "@id": "urn:event:1", "@type": format!("trs:{}", kind), "changed": changed },
                { "@id": changed, "ex:p": { "@id": "urn:o1" } },
                { "@id": "urn:s2", "ex:p2": { "@id": "urn:o2" } }
            ]
        })
        .to_string()
        .into_bytes()
    }

    // === Scenario: Modification yields event plus trimmed context ===
    #[test]
    fn modification_payload_yields_event_and_context() {
        let message = EventAssembler::new()
            .decode(&payload("Modification", "urn:r1"))
            .unwrap();

        assert_eq!(message.event().kind(), ChangeKind::Modification);
        assert_eq!(message.event().changed().as_str(), "urn:r1");

        let context = message.context();
        assert!(!context.has_subject(&Term::iri("urn:r1")));
        assert!(context.contains(&Triple::new(
            Term::iri("urn:s2"),
            "http://example.org/p2",
            Term::iri("urn:o2")
        )));
        // the event node itself is not the changed resource, so it stays
        assert!(context.has_subject(&Term::iri("urn:event:1")));
    }

    // === Scenario: context graph holds exactly the unrelated triple ===
    #[test]
    fn context_graph_excludes_changed_resource() {
        let mut graph = Graph::new();
        let about = Term::iri("urn:r1");
        graph.add(about.clone(), ns_type(), Term::iri(trs::MODIFICATION));
        graph.add(about.clone(), trs::CHANGED, Term::iri("urn:r1"));
        graph.add(about, "urn:p", Term::iri("urn:o1"));
        graph.add(Term::iri("urn:s2"), "urn:p2", Term::iri("urn:o2"));

        let message = EventAssembler::new().assemble(graph).unwrap();

        let expected: Graph = [Triple::new(Term::iri("urn:s2"), "urn:p2", Term::iri("urn:o2"))]
            .into_iter()
            .collect();
        assert_eq!(message.event().changed().as_str(), "urn:r1");
        assert_eq!(message.context(), &expected);
    }

    fn ns_type() -> &'static str {
        crate::graph::ns::RDF_TYPE
    }

    // === Scenario: Creation short-circuits before Deletion ===
    #[test]
    fn creation_never_attempts_deletion() {
        let (modification, m_calls) = CountingDecoder::new(ChangeKind::Modification);
        let (creation, c_calls) = CountingDecoder::new(ChangeKind::Creation);
        let (deletion, d_calls) = CountingDecoder::new(ChangeKind::Deletion);

        let assembler =
            EventAssembler::new().with_decoders(vec![modification, creation, deletion]);
        let message = assembler.decode(&payload("Creation", "urn:r1")).unwrap();

        assert_eq!(message.event().kind(), ChangeKind::Creation);
        assert_eq!(m_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 1);
        assert_eq!(d_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn deletion_is_tried_last() {
        let message = EventAssembler::new()
            .decode(&payload("Deletion", "urn:gone"))
            .unwrap();
        assert_eq!(message.event().kind(), ChangeKind::Deletion);
        assert_eq!(message.event().changed().as_str(), "urn:gone");
    }

    // === Scenario: malformed marker rejected before parsing ===
    #[test]
    fn model_dump_is_rejected_without_parsing() {
        let parser = Arc::new(CountingParser { calls: AtomicUsize::new(0) });
        let assembler = EventAssembler::new().with_parser(parser.clone());

        // otherwise-valid content after the marker changes nothing
        let mut bytes = b"<ModelCom ".to_vec();
        bytes.extend(payload("Creation", "urn:r1"));

        let err = assembler.decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MalformedPayload { ref marker } if marker == MODEL_DUMP_MARKER
        ));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn custom_markers_replace_default() {
        let assembler = EventAssembler::new().with_malformed_markers(["#DUMP"]);
        assert_eq!(assembler.malformed_markers(), ["#DUMP".to_string()]);
        assert!(assembler.check_wellformed(b"<ModelCom {}").is_ok());
        assert!(matches!(
            assembler.check_wellformed(b"#DUMP 1"),
            Err(DecodeError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn parser_failure_is_unparsable() {
        let err = EventAssembler::new().decode(b"{ not json").unwrap_err();
        assert!(matches!(err, DecodeError::UnparsablePayload(ParseError::Json(_))));
    }

    #[test]
    fn invalid_utf8_is_unparsable() {
        let err = EventAssembler::new().decode(&[0xff, 0xfe, b'{']).unwrap_err();
        assert!(matches!(err, DecodeError::UnparsablePayload(ParseError::Encoding(_))));
    }

    // === Scenario: no shape matches ===
    #[test]
    fn unknown_shape_is_unrecognized_with_last_attempt() {
        let doc = json!({
            "@id": "urn:ev",
            "@type": "http://example.org/Unrelated",
            "http://example.org/p": "v"
        });
        let err = EventAssembler::new()
            .decode(doc.to_string().as_bytes())
            .unwrap_err();

        match err {
            DecodeError::UnrecognizedChangeEvent(unrecognized) => {
                assert_eq!(unrecognized.attempts.len(), 3);
                assert_eq!(unrecognized.last().map(|m| m.kind), Some(ChangeKind::Deletion));
            }
            other => panic!("expected UnrecognizedChangeEvent, got {:?}", other),
        }
    }

    // === Scenario: relative reference without a base is not a changed resource ===
    #[test]
    fn relative_changed_reference_is_unrecognized() {
        let doc = json!({
            "@id": "urn:ev",
            "@type": trs::CREATION,
            trs::CHANGED: { "@id": "r1" }
        });
        let err = EventAssembler::new().decode(doc.to_string().as_bytes()).unwrap_err();
        match err {
            DecodeError::UnrecognizedChangeEvent(unrecognized) => {
                let creation = &unrecognized.attempts[1];
                assert_eq!(creation.kind, ChangeKind::Creation);
                assert!(matches!(creation.reason, MismatchReason::ChangedNotIri(_)));
            }
            other => panic!("expected UnrecognizedChangeEvent, got {:?}", other),
        }
    }

    #[test]
    fn order_is_carried_through() {
        let doc = json!({
            "@id": "urn:ev",
            "@type": trs::CREATION,
            trs::CHANGED: { "@id": "urn:r9" },
            trs::ORDER: { "@value": "17", "@type": "http://www.w3.org/2001/XMLSchema#integer" },
            "http://example.org/note": { "@value": "x" }
        });
        let message = EventAssembler::new().decode(doc.to_string().as_bytes()).unwrap();
        assert_eq!(message.event().order(), Some(17));
        assert_eq!(message.event().changed().as_str(), "urn:r9");
        let note = Triple::new(
            Term::iri("urn:ev"),
            "http://example.org/note",
            Term::literal(Literal::string("x")),
        );
        assert!(message.context().contains(&note));
    }
}
