//! Resolved type references
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent setters are designed for chaining.

use crate::node::NodeType;
use serde::{Deserialize, Serialize};

/// The schema definition an event was matched against.
///
/// For standard schema nodes `id` and `type_id` are the same. Nodes of an
/// implementation overlay carry their own `id` while `type_id` names the
/// standard type they narrow, so that two references can be compared by their
/// underlying standard type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeReference {
    /// Identifier of the definition (implementation id for overlay nodes)
    pub id: String,

    /// Identifier of the underlying standard type
    pub type_id: String,

    /// Code of the standard type (segment tag, element number, loop code)
    pub code: String,

    /// Structural kind
    pub node_type: NodeType,

    /// Minimum occurrences, ignoring version-specific overrides
    pub min_occurs: u32,

    /// Maximum occurrences, ignoring version-specific overrides
    pub max_occurs: u32,

    /// Whether the reference points into an implementation overlay
    pub implementation: bool,

    /// Human readable title
    pub title: Option<String>,
}

impl TypeReference {
    /// Create a reference to a standard type
    pub fn standard(
        type_id: impl Into<String>,
        code: impl Into<String>,
        node_type: NodeType,
        min_occurs: u32,
        max_occurs: u32,
    ) -> Self {
        let type_id = type_id.into();
        Self {
            id: type_id.clone(),
            type_id,
            code: code.into(),
            node_type,
            min_occurs,
            max_occurs,
            implementation: false,
            title: None,
        }
    }

    /// Create a reference to an implementation overlay definition
    pub fn implementation(
        id: impl Into<String>,
        type_id: impl Into<String>,
        code: impl Into<String>,
        node_type: NodeType,
        min_occurs: u32,
        max_occurs: u32,
    ) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            code: code.into(),
            node_type,
            min_occurs,
            max_occurs,
            implementation: true,
            title: None,
        }
    }

    /// Attach a title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Whether both references narrow the same standard type
    pub fn same_standard_type(&self, other: &TypeReference) -> bool {
        self.type_id == other.type_id
    }
}
