//! Core graph data structures
//!
//! A payload decodes into a [`Graph`]: a set of [`Triple`]s over
//! [`Term`]s (IRIs, blank nodes, literals).

mod term;
mod trim;
mod triple;


pub use term::{ns, BlankId, Iri, Literal, Term};
pub use trim::trim;
pub use triple::{Graph, Triple};
