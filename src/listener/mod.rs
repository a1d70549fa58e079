//! Pub/sub ingress
//!
//! The [`Listener`] receives `(topic, payload)` from a transport, rejects
//! the retired `NEW` ping synchronously, and decodes everything else on a
//! tokio runtime before handing the result to an [`EventHandler`].

mod config;
mod dispatch;
mod error;
mod handler;

pub use config::{BackpressurePolicy, ConfigError, ListenerConfig};
pub use dispatch::{Delivered, Delivery, Listener, TransportCallback};
pub use error::IngestError;
pub use handler::{EventHandler, HandlerError};
