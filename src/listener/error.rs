//! Errors surfaced by the listener

use super::handler::HandlerError;
use crate::event::DecodeError;
use std::time::Duration;
use thiserror::Error;

/// Errors from ingesting one message.
///
/// `LegacyFormatUnsupported` and `Overloaded` are returned synchronously by
/// `on_message`; the rest are produced inside the worker task and reported
/// through [`super::Delivery::outcome`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("'NEW' payload is no longer supported; send an RDF graph")]
    LegacyFormatUnsupported,

    #[error("listener overloaded: {limit} messages already in flight")]
    Overloaded { limit: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("event handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("processing timed out after {0:?}")]
    TimedOut(Duration),

    #[error("processing task panicked: {0}")]
    TaskPanicked(String),

    #[error("processing task was cancelled")]
    Cancelled,
}

impl IngestError {
    /// True for failures raised on the delivery thread, before any task
    /// was submitted.
    pub fn is_ingress_rejection(&self) -> bool {
        matches!(self, Self::LegacyFormatUnsupported | Self::Overloaded { .. })
    }
}
