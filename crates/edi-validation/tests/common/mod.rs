//! Shared driver for the integration tests.
//!
//! Documents are written with `~` between segments, `*` between elements and
//! `:` between components. The driver feeds them to a [`Validator`] the way a
//! tokenizer would and keeps every emitted event so that reference rewrites
//! can be inspected.
#![allow(dead_code)]

use edi_ir::{EventKind, Location, StreamEvent, TypeReference};
use edi_schema::{Schema, SchemaLoader};
use edi_validation::{
    ElementErrorReport, TransactionDialect, ValidationConfig, ValidationErrorKind,
    ValidationEventHandler, ValidationReport, ValidationReporter, Validator,
};
use std::sync::Arc;

pub const PURCHASE_ORDER: &str = r#"
name: PO
version: "1"
standard: TX_PO
types:
  - kind: transaction
    id: TX_PO
    code: "850"
    references:
      - { ref: ST, min: 1 }
      - { ref: BEG, min: 1 }
      - { ref: REF, max: 3 }
      - { ref: L_N1, max: 5 }
      - { ref: L_PO1, min: 1, max: 100 }
      - { ref: SE, min: 1 }
  - kind: loop
    id: L_N1
    code: N1
    references:
      - { ref: N1, min: 1 }
      - { ref: N3, max: 2 }
      - { ref: PER }
  - kind: loop
    id: L_PO1
    code: PO1
    references:
      - { ref: PO1, min: 1 }
      - { ref: L_SCH, max: 2 }
  - kind: loop
    id: L_SCH
    code: SCH
    references:
      - { ref: SCH, min: 1 }
      - { ref: DTM, min: 1 }
  - { kind: segment, id: ST, references: [ { ref: E143, min: 1 }, { ref: E329, min: 1 } ] }
  - { kind: segment, id: BEG, references: [ { ref: E353, min: 1 }, { ref: E92, min: 1 }, { ref: E324, min: 1 } ] }
  - { kind: segment, id: REF, references: [ { ref: E128, min: 1 }, { ref: E127 } ] }
  - { kind: segment, id: N1, references: [ { ref: E98, min: 1 }, { ref: E93 } ] }
  - { kind: segment, id: N3, references: [ { ref: E166, min: 1 } ] }
  - { kind: segment, id: PER, references: [ { ref: E366, min: 1 } ] }
  - { kind: segment, id: PO1, references: [ { ref: E350 }, { ref: E330, min: 1 } ] }
  - { kind: segment, id: SCH, references: [ { ref: E380, min: 1 } ] }
  - { kind: segment, id: DTM, references: [ { ref: E374, min: 1 }, { ref: E373 } ] }
  - { kind: segment, id: SE, references: [ { ref: E96, min: 1 }, { ref: E329, min: 1 } ] }
  - { kind: element, id: E143, code: "143", base: identifier, min_length: 3, max_length: 3, values: ["850"] }
  - { kind: element, id: E329, code: "329", base: string, min_length: 4, max_length: 9 }
  - { kind: element, id: E353, code: "353", base: identifier, min_length: 2, max_length: 2, values: ["00", "01"] }
  - { kind: element, id: E92, code: "92", base: identifier, min_length: 2, max_length: 2 }
  - { kind: element, id: E324, code: "324", base: string, max_length: 22 }
  - { kind: element, id: E128, code: "128", base: identifier, min_length: 2, max_length: 3 }
  - { kind: element, id: E127, code: "127", base: string, max_length: 30 }
  - { kind: element, id: E98, code: "98", base: identifier, min_length: 2, max_length: 3 }
  - { kind: element, id: E93, code: "93", base: string, max_length: 60 }
  - { kind: element, id: E166, code: "166", base: string, max_length: 55 }
  - { kind: element, id: E366, code: "366", base: identifier, min_length: 2, max_length: 2 }
  - { kind: element, id: E350, code: "350", base: string, max_length: 20 }
  - { kind: element, id: E330, code: "330", base: decimal, max_length: 15 }
  - { kind: element, id: E380, code: "380", base: decimal, max_length: 15 }
  - { kind: element, id: E374, code: "374", base: identifier, min_length: 3, max_length: 3 }
  - { kind: element, id: E373, code: "373", base: date, min_length: 8, max_length: 8 }
  - { kind: element, id: E96, code: "96", base: numeric, max_length: 10 }
"#;

/// Install a test subscriber once; `RUST_LOG` controls the output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn load(yaml: &str) -> anyhow::Result<Arc<Schema>> {
    Ok(Arc::new(SchemaLoader::default().load_from_yaml(yaml)?))
}

/// Collects errors and turns loop boundaries into stream events
#[derive(Debug, Default)]
pub struct Recorder {
    pub reporter: ValidationReporter,
    loops: Vec<StreamEvent>,
}

impl ValidationEventHandler for Recorder {
    fn loop_begin(&mut self, reference: &TypeReference) {
        self.reporter.loop_begin(reference);
        self.loops.push(
            StreamEvent::new(EventKind::StartLoop, Location::default())
                .with_reference(reference.clone()),
        );
    }

    fn loop_end(&mut self, reference: &TypeReference) {
        self.reporter.loop_end(reference);
        self.loops.push(
            StreamEvent::new(EventKind::EndLoop, Location::default())
                .with_reference(reference.clone()),
        );
    }

    fn segment_error(
        &mut self,
        tag: &str,
        reference: Option<&TypeReference>,
        kind: ValidationErrorKind,
    ) {
        self.reporter.segment_error(tag, reference, kind);
    }

    fn element_error(&mut self, error: &ElementErrorReport<'_>) {
        self.reporter.element_error(error);
    }
}

/// Plays the part of a tokenizer in front of a [`Validator`]
pub struct Driver {
    pub validator: Validator,
    pub recorder: Recorder,
    pub dialect: TransactionDialect,
    pub events: Vec<StreamEvent>,
    version_element: Option<(String, u32)>,
    segment_count: u32,
}

impl Driver {
    pub fn new(validator: Validator, version: &str) -> Self {
        Self {
            validator,
            recorder: Recorder::default(),
            dialect: TransactionDialect::new(version),
            events: Vec::new(),
            version_element: None,
            segment_count: 0,
        }
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let schema = load(yaml)?;
        let version = schema.version.clone();
        let validator = Validator::new(schema, None, ValidationConfig::default())?;
        Ok(Self::new(validator, &version))
    }

    /// Read the transaction version from element `position` of `tag`
    pub fn with_version_element(mut self, tag: &str, position: u32) -> Self {
        self.version_element = Some((tag.to_string(), position));
        self
    }

    pub fn report(&self) -> &ValidationReport {
        self.recorder.reporter.report()
    }

    pub fn kinds(&self) -> Vec<ValidationErrorKind> {
        self.report().kinds()
    }

    /// Reference ids of the events of `kind`, in stream order
    pub fn reference_ids(&self, kind: EventKind) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| e.kind == kind)
            .filter_map(|e| e.reference.as_ref().map(|r| r.id.clone()))
            .collect()
    }

    pub fn feed(&mut self, document: &str) -> anyhow::Result<()> {
        for segment in document.split('~').map(str::trim).filter(|s| !s.is_empty()) {
            self.segment(segment)?;
        }
        Ok(())
    }

    fn segment(&mut self, text: &str) -> anyhow::Result<()> {
        self.segment_count += 1;
        let position = self.segment_count;

        let mut fields = text.split('*');
        let tag = fields.next().unwrap_or_default().to_string();
        let window_start = self.events.len();

        self.validator.validate_segment(&mut self.recorder, &tag);
        self.events.append(&mut self.recorder.loops);
        self.events.push(
            StreamEvent::new(
                EventKind::StartSegment,
                Location::new(position, 0).with_segment_tag(&tag),
            )
            .with_data(&tag)
            .with_reference(self.validator.segment_reference().clone()),
        );

        let mut element_position = 0;
        for field in fields {
            element_position += 1;
            let location = Location::new(position, element_position).with_segment_tag(&tag);

            if field.contains(':') {
                self.composite(&location, field, window_start)?;
            } else {
                self.element(&location, field, window_start);
            }

            if self
                .version_element
                .as_ref()
                .is_some_and(|(t, p)| *t == tag && *p == element_position)
            {
                self.dialect.set_version(field);
                self.validator
                    .validate_version_constraints(&self.dialect, &mut self.recorder);
            }
        }

        let end = Location::new(position, element_position).with_segment_tag(&tag);
        self.validator
            .validate_syntax(&self.dialect, &mut self.recorder, &end, false);
        self.events.push(StreamEvent::new(EventKind::EndSegment, end));
        Ok(())
    }

    fn composite(&mut self, location: &Location, field: &str, window_start: usize) -> anyhow::Result<()> {
        if !self
            .validator
            .valid_composite_occurrences(&self.dialect, location)?
        {
            self.validator
                .report_element_errors(&mut self.recorder, location, None);
        }

        let mut start = StreamEvent::new(EventKind::StartComposite, location.clone());
        if let Some(reference) = self.validator.composite_reference() {
            start = start.with_reference(reference.clone());
        }
        self.events.push(start);

        let mut component = location.clone();
        for (index, value) in field.split(':').enumerate() {
            component = location.clone().with_component(u32::try_from(index + 1)?);
            self.element(&component, value, window_start);
        }

        self.validator
            .validate_syntax(&self.dialect, &mut self.recorder, &component, true);
        self.events
            .push(StreamEvent::new(EventKind::EndComposite, component));
        Ok(())
    }

    fn element(&mut self, location: &Location, value: &str, window_start: usize) {
        let data = Some(value).filter(|v| !v.is_empty());

        if !self.validator.validate_element(&self.dialect, location, data) {
            self.validator
                .report_element_errors(&mut self.recorder, location, data);
        }

        let mut event = StreamEvent::element(value, location.clone());
        if let Some(reference) = self.validator.element_reference() {
            event = event.with_reference(reference.clone());
        }
        self.events.push(event);

        if self.validator.is_pending_discrimination() {
            let window = window_start..self.events.len();
            self.validator
                .select_implementation(&mut self.events, window, &mut self.recorder);
        }
    }
}
