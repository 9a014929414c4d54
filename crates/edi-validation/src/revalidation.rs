//! Values waiting for the transaction version

use crate::usage::NodeId;
use edi_ir::Location;

/// A value whose format can only be checked once the version is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RevalidationEntry {
    pub standard: NodeId,
    pub implementation: Option<NodeId>,
    pub value: String,
    pub location: Location,
}

impl RevalidationEntry {
    pub fn new(
        standard: NodeId,
        implementation: Option<NodeId>,
        value: &str,
        location: &Location,
    ) -> Self {
        Self {
            standard,
            implementation,
            value: value.to_string(),
            location: location.clone(),
        }
    }
}

/// First-in first-out queue of [`RevalidationEntry`]s for the current segment
#[derive(Debug, Clone, Default)]
pub(crate) struct RevalidationQueue {
    entries: Vec<RevalidationEntry>,
}

impl RevalidationQueue {
    pub fn push(&mut self, entry: RevalidationEntry) {
        self.entries.push(entry);
    }

    /// Remove all entries in the order they were queued
    pub fn take(&mut self) -> Vec<RevalidationEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order_and_copies() {
        let mut queue = RevalidationQueue::default();
        let mut location = Location::new(1, 1);
        let mut buffer = String::from("first");

        queue.push(RevalidationEntry::new(NodeId::from_index(0), None, &buffer, &location));
        buffer.clear();
        buffer.push_str("second");
        location.increment_element_position();
        queue.push(RevalidationEntry::new(NodeId::from_index(0), None, &buffer, &location));

        assert_eq!(queue.len(), 2);
        let entries = queue.take();
        assert_eq!(queue.len(), 0);
        assert_eq!(entries[0].value, "first");
        assert_eq!(entries[0].location.element_position, 1);
        assert_eq!(entries[1].value, "second");
        assert_eq!(entries[1].location.element_position, 2);
    }
}
