//! Change events and the message handed downstream

use super::vocab::trs;
use crate::graph::{Graph, Iri, Term};
use serde::{Deserialize, Serialize};

/// The three kinds of change a TRS event can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Creation,
    Modification,
    Deletion,
}

impl ChangeKind {
    /// Order in which payload shapes are tried. A payload that fits more
    /// than one shape resolves to the earliest kind in this list.
    pub const PRIORITY: [ChangeKind; 3] = [
        ChangeKind::Modification,
        ChangeKind::Creation,
        ChangeKind::Deletion,
    ];

    /// The `rdf:type` that marks an event node of this kind
    pub fn class_iri(&self) -> &'static str {
        match self {
            Self::Creation => trs::CREATION,
            Self::Modification => trs::MODIFICATION,
            Self::Deletion => trs::DELETION,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Modification => "modification",
            Self::Deletion => "deletion",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes shared by every change event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDetails {
    /// The event node itself (IRI or blank node)
    pub about: Term,
    /// The resource that was created, modified or deleted
    pub changed: Iri,
    /// `trs:order`, when the producer supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

impl ChangeDetails {
    pub fn new(about: Term, changed: impl Into<Iri>) -> Self {
        Self {
            about,
            changed: changed.into(),
            order: None,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }
}

/// A decoded change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChangeEvent {
    Creation(ChangeDetails),
    Modification(ChangeDetails),
    Deletion(ChangeDetails),
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, details: ChangeDetails) -> Self {
        match kind {
            ChangeKind::Creation => Self::Creation(details),
            ChangeKind::Modification => Self::Modification(details),
            ChangeKind::Deletion => Self::Deletion(details),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Creation(_) => ChangeKind::Creation,
            Self::Modification(_) => ChangeKind::Modification,
            Self::Deletion(_) => ChangeKind::Deletion,
        }
    }

    pub fn details(&self) -> &ChangeDetails {
        match self {
            Self::Creation(d) | Self::Modification(d) | Self::Deletion(d) => d,
        }
    }

    pub fn changed(&self) -> &Iri {
        &self.details().changed
    }

    pub fn about(&self) -> &Term {
        &self.details().about
    }

    pub fn order(&self) -> Option<i64> {
        self.details().order
    }
}

/// A change event paired with the rest of the payload's graph.
///
/// Built once per decoded payload and not mutated afterwards; the handler
/// receives it by value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEventMessage {
    event: ChangeEvent,
    context: Graph,
}

impl ChangeEventMessage {
    pub fn new(event: ChangeEvent, context: Graph) -> Self {
        Self { event, context }
    }

    pub fn event(&self) -> &ChangeEvent {
        &self.event
    }

    /// Payload triples that are not about the changed resource
    pub fn context(&self) -> &Graph {
        &self.context
    }

    pub fn into_parts(self) -> (ChangeEvent, Graph) {
        (self.event, self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_exposes_common_attributes() {
        let event = ChangeEvent::new(
            ChangeKind::Deletion,
            ChangeDetails::new(Term::iri("urn:ev"), "urn:r1").with_order(4),
        );
        assert_eq!(event.kind(), ChangeKind::Deletion);
        assert_eq!(event.changed().as_str(), "urn:r1");
        assert_eq!(event.about(), &Term::iri("urn:ev"));
        assert_eq!(event.order(), Some(4));
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = ChangeEvent::Creation(ChangeDetails::new(Term::blank("b0"), "urn:r1"));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "Creation",
                "about": { "kind": "blank", "value": "b0" },
                "changed": "urn:r1"
            })
        );
    }

    #[test]
    fn priority_lists_every_kind_once() {
        let mut kinds = ChangeKind::PRIORITY.to_vec();
        kinds.sort_by_key(|k| k.as_str());
        kinds.dedup();
        assert_eq!(kinds.len(), 3);
        assert_eq!(ChangeKind::PRIORITY[0], ChangeKind::Modification);
    }
}
