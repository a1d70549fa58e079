//! trs-listener: change-event ingestion for Tracked Resource Sets
//!
//! Receives change notifications from a publish/subscribe transport, each a
//! JSON-LD graph describing the creation, modification or deletion of one
//! resource, and turns them into typed events for a downstream handler.
//!
//! # Core Concepts
//!
//! - **Graph**: the payload, parsed into a set of RDF triples
//! - **ChangeEvent**: the Creation / Modification / Deletion recognized in it
//! - **Context graph**: every payload triple not about the changed resource
//! - **Listener**: the transport callback that offloads decoding to worker tasks
//!
//! # Example
//!
//! ```
//! use trs_listener::EventAssembler;
//!
//! let payload = br#"{
//!     "@context": { "trs": "http://open-services.net/ns/core/trs#" },
//!     "@id": "urn:event:7",
//!     "@type": "trs:Creation",
//!     "trs:changed": { "@id": "urn:resource:1" }
//! }"#;
//!
//! let message = EventAssembler::new().decode(payload).unwrap();
//! assert_eq!(message.event().changed().as_str(), "urn:resource:1");
//! assert_eq!(message.context().len(), 2);
//! ```

pub mod event;
pub mod graph;
pub mod jsonld;
pub mod listener;

pub use event::{
    ChangeDetails, ChangeEvent, ChangeEventMessage, ChangeKind, DecodeError, EventAssembler,
    ShapeDecoder, ShapeMismatch, UnrecognizedChangeEvent, VariantDecoder,
};
pub use graph::{trim, Graph, Iri, Literal, Term, Triple};
pub use jsonld::{JsonLdParser, ParseError, PayloadParser};
pub use listener::{
    BackpressurePolicy, ConfigError, Delivered, Delivery, EventHandler, HandlerError,
    IngestError, Listener, ListenerConfig, TransportCallback,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
