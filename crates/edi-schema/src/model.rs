//! Schema model definitions
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent builders return Self for chaining.

use crate::implementation::TypeImplementation;
use crate::simple::SimpleType;
use edi_ir::{NodeType, TypeReference};
use serde::Deserialize;
use std::collections::HashMap;

/// A complete EDI schema: standard structure plus optional implementation
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub version: String,
    types: HashMap<String, EdiType>,
    standard: String,
    implementation: Option<TypeImplementation>,
}

/// Any type defined by a schema
#[derive(Debug, Clone)]
pub enum EdiType {
    Complex(ComplexType),
    Simple(SimpleType),
}

/// A type composed of references to other types
/// (transaction, group, loop, segment or composite)
#[derive(Debug, Clone)]
pub struct ComplexType {
    pub id: String,
    /// Segment tag, loop code or composite number
    pub code: String,
    pub node_type: NodeType,
    pub references: Vec<Reference>,
    pub syntax_rules: Vec<SyntaxRule>,
    pub title: Option<String>,
}

/// Reference from a complex type to one of its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub type_id: String,
    pub min_occurs: u32,
    pub max_occurs: u32,
    /// Occurrence overrides for specific versions, first match wins
    pub versions: Vec<VersionedOccurs>,
}

/// Inclusive range of version strings, compared lexicographically
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VersionRange {
    #[serde(default)]
    pub min_version: Option<String>,
    #[serde(default)]
    pub max_version: Option<String>,
}

/// Cardinality of a reference within a version range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedOccurs {
    pub range: VersionRange,
    pub min_occurs: u32,
    pub max_occurs: u32,
}

/// Kinds of conditional constraints between sibling positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntaxRuleKind {
    /// At most one of the positions may be used
    Single,
    /// If any position is used, all must be used
    Paired,
    /// At least one position must be used
    Required,
    /// At most one of the positions may be used
    Exclusion,
    /// If the first position is used, all others must be used
    Conditional,
    /// If the first position is used, at least one other must be used
    List,
}

/// A conditional constraint over 1-based child positions
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyntaxRule {
    pub kind: SyntaxRuleKind,
    pub positions: Vec<u32>,
}

impl Schema {
    /// Create an empty schema whose standard structure starts at `standard`
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        standard: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            types: HashMap::new(),
            standard: standard.into(),
            implementation: None,
        }
    }

    /// Add a type, replacing any type with the same id
    pub fn add_type(&mut self, ty: impl Into<EdiType>) {
        let ty = ty.into();
        self.types.insert(ty.id().to_string(), ty);
    }

    /// Add a type (builder style)
    pub fn with_type(mut self, ty: impl Into<EdiType>) -> Self {
        self.add_type(ty);
        self
    }

    /// Attach an implementation overlay
    pub fn with_implementation(mut self, implementation: TypeImplementation) -> Self {
        self.implementation = Some(implementation);
        self
    }

    /// Name and version joined for registry keys
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    /// Identifier of the standard root type
    pub fn standard_id(&self) -> &str {
        &self.standard
    }

    /// The standard root type
    pub fn standard(&self) -> Option<&ComplexType> {
        self.complex_type(&self.standard)
    }

    /// The implementation overlay root, if any
    pub fn implementation(&self) -> Option<&TypeImplementation> {
        self.implementation.as_ref()
    }

    pub fn get_type(&self, id: &str) -> Option<&EdiType> {
        self.types.get(id)
    }

    pub fn complex_type(&self, id: &str) -> Option<&ComplexType> {
        match self.types.get(id) {
            Some(EdiType::Complex(complex)) => Some(complex),
            _ => None,
        }
    }

    pub fn simple_type(&self, id: &str) -> Option<&SimpleType> {
        match self.types.get(id) {
            Some(EdiType::Simple(simple)) => Some(simple),
            _ => None,
        }
    }

    /// All defined types in no particular order
    pub fn types(&self) -> impl Iterator<Item = &EdiType> {
        self.types.values()
    }

    /// Whether a segment with the given tag is defined anywhere in this schema
    pub fn contains_segment(&self, tag: &str) -> bool {
        self.types.values().any(|ty| match ty {
            EdiType::Complex(complex) => {
                complex.node_type == NodeType::Segment && complex.code == tag
            }
            EdiType::Simple(_) => false,
        })
    }
}

impl EdiType {
    pub fn id(&self) -> &str {
        match self {
            EdiType::Complex(complex) => &complex.id,
            EdiType::Simple(simple) => &simple.id,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            EdiType::Complex(complex) => &complex.code,
            EdiType::Simple(simple) => &simple.code,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            EdiType::Complex(complex) => complex.node_type,
            EdiType::Simple(_) => NodeType::Element,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            EdiType::Complex(complex) => complex.title.as_deref(),
            EdiType::Simple(simple) => simple.title.as_deref(),
        }
    }
}

impl From<ComplexType> for EdiType {
    fn from(complex: ComplexType) -> Self {
        EdiType::Complex(complex)
    }
}

impl From<SimpleType> for EdiType {
    fn from(simple: SimpleType) -> Self {
        EdiType::Simple(simple)
    }
}

impl ComplexType {
    pub fn new(id: impl Into<String>, code: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            node_type,
            references: Vec::new(),
            syntax_rules: Vec::new(),
            title: None,
        }
    }

    /// Segment whose id and tag are the same
    pub fn segment(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self::new(tag.clone(), tag, NodeType::Segment)
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    pub fn with_rule(mut self, rule: SyntaxRule) -> Self {
        self.syntax_rules.push(rule);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Reference {
    pub fn new(type_id: impl Into<String>, min_occurs: u32, max_occurs: u32) -> Self {
        Self {
            type_id: type_id.into(),
            min_occurs,
            max_occurs,
            versions: Vec::new(),
        }
    }

    pub fn with_version(mut self, occurs: VersionedOccurs) -> Self {
        self.versions.push(occurs);
        self
    }

    fn versioned(&self, version: &str) -> Option<&VersionedOccurs> {
        self.versions.iter().find(|v| v.range.applies_to(version))
    }

    /// Minimum occurrences in `version` (empty = version not known)
    pub fn min_occurs_for(&self, version: &str) -> u32 {
        self.versioned(version).map_or(self.min_occurs, |v| v.min_occurs)
    }

    /// Maximum occurrences in `version` (empty = version not known)
    pub fn max_occurs_for(&self, version: &str) -> u32 {
        self.versioned(version).map_or(self.max_occurs, |v| v.max_occurs)
    }

    /// Build the reference slot value for a standard type
    pub fn to_type_reference(&self, ty: &EdiType) -> TypeReference {
        let reference = TypeReference::standard(
            ty.id(),
            ty.code(),
            ty.node_type(),
            self.min_occurs,
            self.max_occurs,
        );
        match ty.title() {
            Some(title) => reference.with_title(title),
            None => reference,
        }
    }
}

impl VersionRange {
    pub fn new(min_version: Option<&str>, max_version: Option<&str>) -> Self {
        Self {
            min_version: min_version.map(str::to_string),
            max_version: max_version.map(str::to_string),
        }
    }

    /// Whether `version` falls inside the range. An empty version is never
    /// inside any range.
    pub fn applies_to(&self, version: &str) -> bool {
        if version.is_empty() {
            return false;
        }
        let above_min = self
            .min_version
            .as_deref()
            .is_none_or(|min| version >= min);
        let below_max = self
            .max_version
            .as_deref()
            .is_none_or(|max| version <= max);
        above_min && below_max
    }
}

impl VersionedOccurs {
    pub fn new(range: VersionRange, min_occurs: u32, max_occurs: u32) -> Self {
        Self {
            range,
            min_occurs,
            max_occurs,
        }
    }
}

impl SyntaxRule {
    pub fn new(kind: SyntaxRuleKind, positions: impl Into<Vec<u32>>) -> Self {
        Self {
            kind,
            positions: positions.into(),
        }
    }
}
