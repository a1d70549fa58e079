//! Shared fixtures for listener integration tests
//!
//! Payload builders produce JSON-LD documents shaped like the ones a TRS
//! server publishes, plus a handler that records what it is given.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use trs_listener::event::vocab::trs;
use trs_listener::{ChangeEventMessage, ChangeKind, EventHandler, HandlerError};

pub const DCTERMS_TITLE: &str = "http://purl.org/dc/terms/title";
pub const OSLC_RM_REQUIREMENT: &str = "http://open-services.net/ns/rm#Requirement";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Change event about `changed`, with the resource's own triples and one
/// unrelated triple about a neighbour resource.
pub fn event_with_context(kind: ChangeKind, event: &str, changed: &str, order: i64) -> Value {
    json!({
        "@context": {
            "trs": trs::NS,
            "dcterms": "http://purl.org/dc/terms/"
        },
        "@graph": [
            {
                "@id": event,
                "@type": kind.class_iri(),
                "trs:changed": { "@id": changed },
                "trs:order": order
            },
            {
                "@id": changed,
                "@type": OSLC_RM_REQUIREMENT,
                "dcterms:title": format!("title of {}", changed)
            },
            {
                "@id": format!("{}/neighbour", changed),
                "dcterms:title": "neighbour"
            }
        ]
    })
}

pub fn payload(doc: &Value) -> Vec<u8> {
    doc.to_string().into_bytes()
}

/// Records every message it receives
#[derive(Default)]
pub struct RecordingHandler {
    received: Mutex<Vec<ChangeEventMessage>>,
}

impl RecordingHandler {
    pub fn received(&self) -> Vec<ChangeEventMessage> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn process_change_event(&self, message: ChangeEventMessage) -> Result<(), HandlerError> {
        // yield so concurrent tasks interleave
        tokio::task::yield_now().await;
        self.received.lock().unwrap().push(message);
        Ok(())
    }
}
