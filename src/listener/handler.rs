//! EventHandler: the downstream consumer of decoded events

use crate::event::ChangeEventMessage;
use async_trait::async_trait;
use thiserror::Error;

/// A failure reported by an [`EventHandler`]
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Receives each successfully decoded change event.
///
/// Called once per message, inside the worker task that decoded it.
/// Errors are logged by the listener and the message is dropped; there is
/// no retry.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn process_change_event(&self, message: ChangeEventMessage) -> Result<(), HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn handler_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = HandlerError::with_source("could not store event", io);
        assert_eq!(err.to_string(), "could not store event");
        assert_eq!(err.message(), "could not store event");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("disk full"));
    }
}
