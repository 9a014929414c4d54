//! Structural kinds shared by the schema model and the stream events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural kind of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Complete transaction set / message
    Transaction,

    /// Functional group (envelope level)
    Group,

    /// Repeatable loop (segment group) of segments and sub-loops
    Loop,

    /// Individual segment
    Segment,

    /// Data element subdivided into components
    Composite,

    /// Simple data element or component
    Element,
}

impl NodeType {
    /// Whether nodes of this kind contain segments (loop-like containers)
    pub fn is_container(self) -> bool {
        matches!(self, NodeType::Transaction | NodeType::Group | NodeType::Loop)
    }

    /// Whether nodes of this kind own child references
    pub fn is_complex(self) -> bool {
        !matches!(self, NodeType::Element)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Transaction => "transaction",
            NodeType::Group => "group",
            NodeType::Loop => "loop",
            NodeType::Segment => "segment",
            NodeType::Composite => "composite",
            NodeType::Element => "element",
        };
        f.write_str(name)
    }
}
