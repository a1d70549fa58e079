//! Change-event decoding
//!
//! A payload graph is matched against the TRS event shapes
//! (Modification, Creation, Deletion, in that order) and paired with the
//! context graph left after removing the changed resource's triples.

mod assembler;
mod decoder;
mod types;
pub mod vocab;

pub use assembler::{DecodeError, EventAssembler, MODEL_DUMP_MARKER};
pub use decoder::{
    default_decoders, MismatchReason, ShapeDecoder, ShapeMismatch, TrsShapeDecoder,
    UnrecognizedChangeEvent, VariantDecoder,
};
pub use types::{ChangeDetails, ChangeEvent, ChangeEventMessage, ChangeKind};
