//! Usage trees
//!
//! A usage tree mirrors the structure of a schema with one node per position
//! and counts how often each position has been used in the current document.
//! Nodes live in an arena and are addressed by [`NodeId`]; child slots are
//! `Option`s so that an implementation overlay can leave a standard position
//! empty while staying aligned with the standard tree.

use crate::{Error, Result};
use edi_ir::{NodeType, TypeReference};
use edi_schema::{
    ComplexType, Discriminator, EdiType, Schema, SyntaxRule, TypeImplementation, VersionedOccurs,
};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Version used for segment and loop cardinalities, which do not vary by version
pub const SEGMENT_VERSION: &str = "";

/// Index of a node within its [`UsageTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[cfg(test)]
impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// One schema position and its live occurrence count
#[derive(Debug, Clone)]
pub struct UsageNode {
    parent: Option<NodeId>,
    children: Vec<Option<NodeId>>,
    versioned_children: HashMap<String, Vec<Option<NodeId>>>,
    depth: u32,
    index: usize,
    usage: u32,
    reference: TypeReference,
    versions: Vec<VersionedOccurs>,
    syntax_rules: Vec<SyntaxRule>,
    discriminator: Option<Discriminator>,
    values: BTreeSet<String>,
    has_versions: bool,
}

impl UsageNode {
    fn new(parent: Option<NodeId>, depth: u32, index: usize, reference: TypeReference) -> Self {
        Self {
            parent,
            children: Vec::new(),
            versioned_children: HashMap::new(),
            depth,
            index,
            usage: 0,
            reference,
            versions: Vec::new(),
            syntax_rules: Vec::new(),
            discriminator: None,
            values: BTreeSet::new(),
            has_versions: false,
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// All child slots, ignoring versions
    #[must_use]
    pub fn children(&self) -> &[Option<NodeId>] {
        &self.children
    }

    /// Depth in the tree, the root is at depth 1
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Position within the parent
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn usage(&self) -> u32 {
        self.usage
    }

    #[must_use]
    pub fn is_used(&self) -> bool {
        self.usage > 0
    }

    #[must_use]
    pub fn is_first_child(&self) -> bool {
        self.index == 0
    }

    #[must_use]
    pub fn reference(&self) -> &TypeReference {
        &self.reference
    }

    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.reference.node_type
    }

    /// Segment tag, element number or loop code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.reference.code
    }

    #[must_use]
    pub fn is_implementation(&self) -> bool {
        self.reference.implementation
    }

    #[must_use]
    pub fn syntax_rules(&self) -> &[SyntaxRule] {
        &self.syntax_rules
    }

    #[must_use]
    pub fn discriminator(&self) -> Option<&Discriminator> {
        self.discriminator.as_ref()
    }

    /// Code values an implementation narrows this element to
    #[must_use]
    pub fn values(&self) -> &BTreeSet<String> {
        &self.values
    }

    /// Whether the valid format of this element's values depends on the version
    #[must_use]
    pub fn has_versions(&self) -> bool {
        self.has_versions
    }

    fn versioned(&self, version: &str) -> Option<&VersionedOccurs> {
        self.versions.iter().find(|v| v.range.applies_to(version))
    }

    #[must_use]
    pub fn min_occurs(&self, version: &str) -> u32 {
        self.versioned(version)
            .map_or(self.reference.min_occurs, |v| v.min_occurs)
    }

    #[must_use]
    pub fn max_occurs(&self, version: &str) -> u32 {
        self.versioned(version)
            .map_or(self.reference.max_occurs, |v| v.max_occurs)
    }
}

/// Arena of [`UsageNode`]s built from a schema
#[derive(Debug, Clone, Default)]
pub struct UsageTree {
    nodes: Vec<UsageNode>,
}

impl UsageTree {
    /// Build the tree of the schema's standard structure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSchema`] when a referenced type is missing,
    /// a type is referenced from within itself, a complex type claims to be an
    /// element or a loop has no children.
    pub fn standard(schema: &Schema) -> Result<Self> {
        let root_type = schema.standard().ok_or_else(|| {
            Error::MalformedSchema(format!(
                "standard type '{}' of {} is not defined",
                schema.standard_id(),
                schema.qualified_name()
            ))
        })?;

        let mut root_reference = TypeReference::standard(
            &root_type.id,
            &root_type.code,
            root_type.node_type,
            1,
            1,
        );
        root_reference.title.clone_from(&root_type.title);

        let mut tree = Self::default();
        let mut root = UsageNode::new(None, 1, 0, root_reference);
        root.syntax_rules.clone_from(&root_type.syntax_rules);
        let root = tree.push(root);

        let mut pending: Vec<(NodeId, &ComplexType)> = vec![(root, root_type)];

        while let Some((parent, complex)) = pending.pop() {
            if complex.node_type == NodeType::Element {
                return Err(Error::MalformedSchema(format!(
                    "complex type '{}' is declared as an element",
                    complex.id
                )));
            }

            let depth = tree.node(parent).depth + 1;

            for (index, reference) in complex.references.iter().enumerate() {
                let ty = schema.get_type(&reference.type_id).ok_or_else(|| {
                    Error::MalformedSchema(format!(
                        "type '{}' referenced by '{}' is not defined",
                        reference.type_id, complex.id
                    ))
                })?;

                if tree.is_ancestor_type(parent, ty.id()) {
                    return Err(Error::MalformedSchema(format!(
                        "type '{}' is referenced from within itself",
                        ty.id()
                    )));
                }

                let mut node = UsageNode::new(
                    Some(parent),
                    depth,
                    index,
                    reference.to_type_reference(ty),
                );
                node.versions.clone_from(&reference.versions);

                match ty {
                    EdiType::Complex(child) => {
                        node.syntax_rules.clone_from(&child.syntax_rules);
                        let id = tree.push_child(parent, node);
                        pending.push((id, child));
                    }
                    EdiType::Simple(simple) => {
                        node.has_versions = simple.has_versions();
                        tree.push_child(parent, node);
                    }
                }
            }
        }

        tree.check_loops()?;
        debug!(
            "Built standard usage tree for {} with {} nodes",
            schema.qualified_name(),
            tree.len()
        );

        Ok(tree)
    }

    /// Build the tree of the schema's implementation overlay, or an empty
    /// tree when the schema has none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSchema`] when an overlay node narrows a type
    /// that does not exist or has a different structural kind, or when an
    /// overlay loop has no anchor segment.
    pub fn implementation(schema: &Schema) -> Result<Self> {
        let mut tree = Self::default();

        let Some(root_impl) = schema.implementation() else {
            return Ok(tree);
        };

        let root = tree.push(implementation_node(schema, None, 1, 0, root_impl)?);
        let mut pending: Vec<(NodeId, &TypeImplementation)> = vec![(root, root_impl)];

        while let Some((parent, implementation)) = pending.pop() {
            let depth = tree.node(parent).depth + 1;

            for (index, child) in implementation.sequence.iter().enumerate() {
                match child {
                    Some(child) => {
                        let node = implementation_node(schema, Some(parent), depth, index, child)?;
                        let id = tree.push_child(parent, node);
                        pending.push((id, child));
                    }
                    None => tree.nodes[parent.0].children.push(None),
                }
            }
        }

        tree.check_loops()?;
        debug!(
            "Built implementation usage tree for {} with {} nodes",
            schema.qualified_name(),
            tree.len()
        );

        Ok(tree)
    }

    fn push(&mut self, node: UsageNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn push_child(&mut self, parent: NodeId, node: UsageNode) -> NodeId {
        let id = self.push(node);
        self.nodes[parent.0].children.push(Some(id));
        id
    }

    fn is_ancestor_type(&self, node: NodeId, type_id: &str) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            let ancestor = self.node(id);
            if ancestor.reference.type_id == type_id {
                return true;
            }
            current = ancestor.parent;
        }
        false
    }

    fn check_loops(&self) -> Result<()> {
        for node in &self.nodes {
            let is_loop = matches!(node.node_type(), NodeType::Loop | NodeType::Group);
            if is_loop && node.children.first().copied().flatten().is_none() {
                return Err(Error::MalformedSchema(format!(
                    "loop '{}' has no starting segment",
                    node.reference.id
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root node, `None` for an empty tree
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    /// # Panics
    ///
    /// Panics when `id` does not belong to this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &UsageNode {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.first().copied().flatten()
    }

    /// Child slots that exist in `version`.
    ///
    /// A child is dropped when its maximum occurrence in that version is zero;
    /// empty overlay slots are kept. Results are cached per version.
    pub fn versioned_children(&mut self, id: NodeId, version: &str) -> &[Option<NodeId>] {
        if !self.nodes[id.0].versioned_children.contains_key(version) {
            let filtered: Vec<Option<NodeId>> = self.nodes[id.0]
                .children
                .iter()
                .copied()
                .filter(|child| child.is_none_or(|c| self.nodes[c.0].max_occurs(version) > 0))
                .collect();
            self.nodes[id.0]
                .versioned_children
                .insert(version.to_string(), filtered);
        }
        &self.nodes[id.0].versioned_children[version]
    }

    pub fn child_count(&mut self, id: NodeId, version: &str) -> usize {
        self.versioned_children(id, version).len()
    }

    /// Child at `index` in `version`, `None` for empty or missing slots
    pub fn child(&mut self, id: NodeId, version: &str, index: usize) -> Option<NodeId> {
        self.versioned_children(id, version)
            .get(index)
            .copied()
            .flatten()
    }

    /// Next present sibling, skipping empty overlay slots
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        let parent = self.node(node.parent?);
        parent
            .children
            .iter()
            .skip(node.index + 1)
            .copied()
            .flatten()
            .next()
    }

    /// Sibling segment (including the node itself) with the given tag
    #[must_use]
    pub fn sibling_segment(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        let parent = self.node(self.node(id).parent?);
        parent.children.iter().copied().flatten().find(|&sibling| {
            let sibling = self.node(sibling);
            sibling.node_type() == NodeType::Segment && sibling.code() == tag
        })
    }

    /// The segment a node starts with: itself for segments, the anchor
    /// segment for loops
    #[must_use]
    pub fn to_segment(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id).node_type() {
            NodeType::Segment => Some(id),
            NodeType::Loop | NodeType::Group | NodeType::Transaction => self.first_child(id),
            NodeType::Composite | NodeType::Element => None,
        }
    }

    pub fn increment_usage(&mut self, id: NodeId) {
        self.nodes[id.0].usage += 1;
    }

    /// Zero the usage of every node below `id`, for a new occurrence of `id`
    pub fn reset_children(&mut self, id: NodeId) {
        let mut pending: Vec<NodeId> = self.nodes[id.0].children.iter().copied().flatten().collect();

        while let Some(next) = pending.pop() {
            let node = &mut self.nodes[next.0];
            node.usage = 0;
            pending.extend(node.children.iter().copied().flatten());
        }
    }

    /// Zero the usage of `id` and everything below it
    pub fn reset_node(&mut self, id: NodeId) {
        self.nodes[id.0].usage = 0;
        self.reset_children(id);
    }

    /// Zero the usage of the whole tree, for a new document
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.usage = 0;
        }
    }

    #[must_use]
    pub fn has_minimum_usage(&self, id: NodeId, version: &str) -> bool {
        let node = self.node(id);
        node.usage >= node.min_occurs(version)
    }

    #[must_use]
    pub fn exceeds_maximum_usage(&self, id: NodeId, version: &str) -> bool {
        let node = self.node(id);
        node.usage > node.max_occurs(version)
    }

    /// Usage of every node in arena order
    #[must_use]
    pub fn usage_counts(&self) -> Vec<u32> {
        self.nodes.iter().map(|n| n.usage).collect()
    }
}

fn implementation_node(
    schema: &Schema,
    parent: Option<NodeId>,
    depth: u32,
    index: usize,
    implementation: &TypeImplementation,
) -> Result<UsageNode> {
    let ty = schema.get_type(&implementation.type_id).ok_or_else(|| {
        Error::MalformedSchema(format!(
            "type '{}' narrowed by implementation '{}' is not defined",
            implementation.type_id, implementation.id
        ))
    })?;

    if ty.node_type() != implementation.node_type {
        return Err(Error::MalformedSchema(format!(
            "implementation '{}' is a {} but narrows the {} '{}'",
            implementation.id,
            implementation.node_type,
            ty.node_type(),
            ty.id()
        )));
    }

    let mut reference = TypeReference::implementation(
        &implementation.id,
        &implementation.type_id,
        ty.code(),
        implementation.node_type,
        implementation.min_occurs,
        implementation.max_occurs,
    );
    reference.title = implementation
        .title
        .clone()
        .or_else(|| ty.title().map(str::to_string));

    let mut node = UsageNode::new(parent, depth, index, reference);
    node.discriminator.clone_from(&implementation.discriminator);
    node.values.clone_from(&implementation.values);
    if let EdiType::Simple(simple) = ty {
        node.has_versions = simple.has_versions();
    }

    Ok(node)
}
