//! Schema loader for YAML and JSON schema files

use crate::implementation::{Discriminator, TypeImplementation};
use crate::model::{
    ComplexType, EdiType, Reference, Schema, SyntaxRule, VersionRange, VersionedOccurs,
};
use crate::registry::SchemaRegistry;
use crate::simple::{Base, ElementVersion, SimpleType};
use crate::{Error, Result};
use edi_ir::NodeType;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Serializable schema format for loading from files
#[derive(Debug, Deserialize)]
struct SchemaFile {
    name: String,
    version: String,
    /// Id of the standard root type
    standard: String,
    #[serde(default)]
    types: Vec<TypeFile>,
    #[serde(default)]
    implementation: Option<ImplementationFile>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum TypeFile {
    Transaction(ComplexFile),
    Group(ComplexFile),
    Loop(ComplexFile),
    Segment(ComplexFile),
    Composite(ComplexFile),
    Element(ElementFile),
}

#[derive(Debug, Deserialize)]
struct ComplexFile {
    id: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    references: Vec<ReferenceFile>,
    #[serde(default)]
    syntax: Vec<SyntaxRule>,
}

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(rename = "ref")]
    type_id: String,
    #[serde(default)]
    min: u32,
    #[serde(default = "default_max_occurs")]
    max: u32,
    #[serde(default)]
    versions: Vec<VersionedOccursFile>,
}

#[derive(Debug, Deserialize)]
struct VersionedOccursFile {
    #[serde(flatten)]
    range: VersionRange,
    #[serde(default)]
    min: u32,
    #[serde(default = "default_max_occurs")]
    max: u32,
}

#[derive(Debug, Deserialize)]
struct ElementFile {
    id: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    title: Option<String>,
    base: Base,
    #[serde(default = "default_min_length")]
    min_length: usize,
    #[serde(default = "default_max_length")]
    max_length: usize,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    versions: Vec<ElementVersionFile>,
}

#[derive(Debug, Deserialize)]
struct ElementVersionFile {
    #[serde(flatten)]
    range: VersionRange,
    #[serde(default)]
    min_length: Option<usize>,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    values: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ImplementationFile {
    kind: NodeType,
    id: String,
    #[serde(rename = "type")]
    type_id: String,
    #[serde(default)]
    min: u32,
    #[serde(default = "default_max_occurs")]
    max: u32,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    discriminator: Option<DiscriminatorFile>,
    #[serde(default)]
    sequence: Vec<Option<ImplementationFile>>,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DiscriminatorFile {
    element: u32,
    #[serde(default)]
    component: u32,
    values: Vec<String>,
}

fn default_max_occurs() -> u32 {
    1
}

fn default_min_length() -> usize {
    1
}

fn default_max_length() -> usize {
    35
}

/// Schema loader with a shared cache
pub struct SchemaLoader {
    registry: Arc<SchemaRegistry>,
    schema_paths: Vec<PathBuf>,
}

impl SchemaLoader {
    /// Create a new schema loader with the given search paths
    pub fn new(schema_paths: Vec<PathBuf>) -> Self {
        Self {
            registry: Arc::new(SchemaRegistry::new()),
            schema_paths,
        }
    }

    /// Create a new schema loader with a pre-configured registry
    pub fn with_registry(registry: Arc<SchemaRegistry>, schema_paths: Vec<PathBuf>) -> Self {
        Self {
            registry,
            schema_paths,
        }
    }

    /// Load a schema by name and version.
    /// First checks the cache, then the search paths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no matching file exists, or the error
    /// of the file that failed to load.
    pub fn load(&self, name: &str, version: &str) -> Result<Arc<Schema>> {
        let qualified_name = format!("{name}:{version}");

        if let Some(cached) = self.registry.get(&qualified_name) {
            debug!("Cache hit for schema: {}", qualified_name);
            return Ok(cached);
        }

        trace!("Cache miss for schema: {}", qualified_name);

        let schema = self.load_from_disk(name, version)?;
        Ok(self.registry.register(qualified_name, schema))
    }

    /// Load a schema from a specific file path; `.yaml`/`.yml` files are read
    /// as YAML, everything else as JSON
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not a valid schema.
    pub fn load_from_file(&self, path: &Path) -> Result<Schema> {
        trace!("Loading schema from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            self.load_from_yaml(&content)
        } else {
            self.load_from_json(&content)
        }
    }

    /// Load a schema from JSON string
    ///
    /// # Errors
    ///
    /// Returns an error when the document is not a valid schema.
    pub fn load_from_json(&self, json: &str) -> Result<Schema> {
        let schema_file: SchemaFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))?;

        convert_schema_file(schema_file)
    }

    /// Load a schema from YAML string
    ///
    /// # Errors
    ///
    /// Returns an error when the document is not a valid schema.
    pub fn load_from_yaml(&self, yaml: &str) -> Result<Schema> {
        let schema_file: SchemaFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))?;

        convert_schema_file(schema_file)
    }

    /// Add a search path for schema files
    pub fn add_path(&mut self, path: PathBuf) {
        self.schema_paths.push(path);
    }

    /// Get the registry
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    fn load_from_disk(&self, name: &str, version: &str) -> Result<Schema> {
        let stem = format!("{}_{}", name.to_lowercase(), version.to_lowercase());

        for path in &self.schema_paths {
            for extension in ["yaml", "yml", "json"] {
                let file_path = path.join(format!("{stem}.{extension}"));
                if file_path.exists() {
                    trace!("Found schema file: {:?}", file_path);
                    return self.load_from_file(&file_path);
                }
            }
        }

        Err(Error::NotFound(format!(
            "Schema {name}:{version} not found in search paths: {:?}",
            self.schema_paths
        )))
    }
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")])
    }
}

fn convert_schema_file(schema_file: SchemaFile) -> Result<Schema> {
    let mut schema = Schema::new(schema_file.name, schema_file.version, schema_file.standard);

    for ty in schema_file.types {
        schema.add_type(convert_type(ty)?);
    }

    if schema.standard().is_none() {
        return Err(Error::UnknownType {
            type_id: schema.standard_id().to_string(),
            referenced_by: schema.qualified_name(),
        });
    }

    // Every reference must resolve so that the validator can build its trees
    for ty in schema.types() {
        if let EdiType::Complex(complex) = ty {
            for reference in &complex.references {
                if schema.get_type(&reference.type_id).is_none() {
                    return Err(Error::UnknownType {
                        type_id: reference.type_id.clone(),
                        referenced_by: complex.id.clone(),
                    });
                }
            }
        }
    }

    if let Some(implementation) = schema_file.implementation {
        let implementation = convert_implementation(implementation);
        check_implementation(&schema, &implementation)?;
        schema = schema.with_implementation(implementation);
    }

    debug!(
        "Loaded schema {} with {} types",
        schema.qualified_name(),
        schema.types().count()
    );

    Ok(schema)
}

fn convert_type(ty: TypeFile) -> Result<EdiType> {
    let (node_type, complex) = match ty {
        TypeFile::Transaction(c) => (NodeType::Transaction, c),
        TypeFile::Group(c) => (NodeType::Group, c),
        TypeFile::Loop(c) => (NodeType::Loop, c),
        TypeFile::Segment(c) => (NodeType::Segment, c),
        TypeFile::Composite(c) => (NodeType::Composite, c),
        TypeFile::Element(e) => return convert_element(e).map(EdiType::Simple),
    };

    let code = complex.code.unwrap_or_else(|| complex.id.clone());
    let mut converted = ComplexType::new(complex.id, code, node_type);
    converted.title = complex.title;
    converted.syntax_rules = complex.syntax;
    converted.references = complex
        .references
        .into_iter()
        .map(|r| Reference {
            type_id: r.type_id,
            min_occurs: r.min,
            max_occurs: r.max,
            versions: r
                .versions
                .into_iter()
                .map(|v| VersionedOccurs::new(v.range, v.min, v.max))
                .collect(),
        })
        .collect();

    Ok(EdiType::Complex(converted))
}

fn convert_element(element: ElementFile) -> Result<SimpleType> {
    let code = element.code.unwrap_or_else(|| element.id.clone());
    let mut simple = SimpleType::new(element.id, code, element.base)
        .with_length(element.min_length, element.max_length)
        .with_values(element.values);
    simple.title = element.title;

    if let Some(pattern) = element.pattern {
        let regex = Regex::new(&pattern).map_err(|e| {
            Error::Parse(format!("Invalid pattern '{pattern}' for {}: {e}", simple.id))
        })?;
        simple = simple.with_pattern(regex);
    }

    for version in element.versions {
        simple = simple.with_version(ElementVersion {
            range: version.range,
            min_length: version.min_length,
            max_length: version.max_length,
            values: version.values.map(|v| v.into_iter().collect()),
        });
    }

    Ok(simple)
}

fn convert_implementation(file: ImplementationFile) -> TypeImplementation {
    let mut implementation =
        TypeImplementation::new(file.kind, file.id, file.type_id, file.min, file.max)
            .with_values(file.values);
    implementation.title = file.title;
    implementation.discriminator = file
        .discriminator
        .map(|d| Discriminator::new(d.element, d.component, d.values));
    implementation.sequence = file
        .sequence
        .into_iter()
        .map(|child| child.map(convert_implementation))
        .collect();
    implementation
}

fn check_implementation(schema: &Schema, implementation: &TypeImplementation) -> Result<()> {
    let mut pending = vec![implementation];

    while let Some(node) = pending.pop() {
        if schema.get_type(&node.type_id).is_none() {
            return Err(Error::UnknownType {
                type_id: node.type_id.clone(),
                referenced_by: node.id.clone(),
            });
        }
        pending.extend(node.sequence.iter().flatten());
    }

    Ok(())
}
