#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-ir
//!
//! Structural stream events exchanged between an EDI tokenizer and the
//! validator.
//!
//! A tokenizer turns raw interchange bytes into an ordered sequence of
//! [`StreamEvent`]s (segment start, composite start/end, element data, ...).
//! Each event carries its raw token, its [`Location`] within the segment and a
//! mutable [`TypeReference`] slot which the validator fills in, and may later
//! overwrite once an implementation variant has been selected.

/// Stream events and their kinds.
pub mod event;
/// Positions of events within a document.
pub mod location;
/// Structural kinds of schema nodes.
pub mod node;
/// Resolved schema references stored on events.
pub mod reference;

/// Event primitives.
pub use event::{EventKind, StreamEvent};
/// Segment/element/component position of an event.
pub use location::Location;
/// Structural kind of a schema node.
pub use node::NodeType;
/// Reference slot value.
pub use reference::TypeReference;
