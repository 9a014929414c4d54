//! Paired position in the standard and implementation trees

use crate::usage::{NodeId, UsageTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub standard: NodeId,
    pub implementation: Option<NodeId>,
}

impl Cursor {
    pub fn new(standard: NodeId, implementation: Option<NodeId>) -> Self {
        Self {
            standard,
            implementation,
        }
    }

    pub fn has_next_sibling(&self, tree: &UsageTree) -> bool {
        tree.next_sibling(self.standard).is_some()
    }

    /// Advance the standard position; the implementation position only moves
    /// when a next implementation node is known
    pub fn next(&mut self, tree: &UsageTree, next_implementation: Option<NodeId>) {
        if let Some(next) = tree.next_sibling(self.standard) {
            self.standard = next;
        }
        if next_implementation.is_some() {
            self.implementation = next_implementation;
        }
    }

    /// Move both positions to their parents. The implementation position is
    /// left alone when it is not deeper than `limit`.
    pub fn navigate_up(&mut self, standard: &UsageTree, implementation: &UsageTree, limit: u32) {
        if let Some(parent) = standard.parent(self.standard) {
            self.standard = parent;
        }

        if let Some(current) = self.implementation {
            if implementation.node(current).depth() > limit {
                self.implementation = implementation.parent(current);
            }
        }
    }
}
