//! Segment ordering, cardinality and loop handling

mod common;

use common::{Driver, PURCHASE_ORDER, init_tracing, load};
use edi_ir::NodeType;
use edi_schema::{ComplexType, Reference, Schema, SchemaLoader};
use edi_validation::{LoopMarker, ValidationConfig, ValidationErrorKind, Validator};
use std::sync::Arc;

const CLEAN_ORDER: &str = "ST*850*0001~BEG*00*SA*PO123~REF*DP*038~\
N1*ST*ACME~N3*1 MAIN ST~N1*BT*ACME~PER*IC~\
PO1*1*10~SCH*5~DTM*002*20240105~SCH*3~DTM*002*20240110~\
PO1*2*4~SE*14*0001";

#[test]
fn test_well_formed_document_has_no_errors() -> anyhow::Result<()> {
    init_tracing();
    let mut driver = Driver::from_yaml(PURCHASE_ORDER)?;
    driver.feed(CLEAN_ORDER)?;

    let report = driver.report();
    assert!(!report.has_errors(), "unexpected issues: {:?}", report.issues);
    assert_eq!(report.loop_begins(), 6);
    assert_eq!(report.loop_ends(), 6);
    assert_eq!(driver.validator.depth(), 1);
    assert_eq!(driver.validator.open_loops(), 0);
    Ok(())
}

#[test]
fn test_loop_events_are_balanced_in_order() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PURCHASE_ORDER)?;
    driver.feed("ST*850*0001~BEG*00*SA*PO1~PO1*1*1~SCH*1~DTM*002~PO1*2*2~SE*6*0001")?;

    assert_eq!(
        driver.report().loops,
        vec![
            LoopMarker::Begin("L_PO1".into()),
            LoopMarker::Begin("L_SCH".into()),
            LoopMarker::End("L_SCH".into()),
            LoopMarker::End("L_PO1".into()),
            LoopMarker::Begin("L_PO1".into()),
            LoopMarker::End("L_PO1".into()),
        ]
    );
    Ok(())
}

#[test]
fn test_segment_over_maximum_in_nested_loop() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PURCHASE_ORDER)?;
    driver.feed(
        "ST*850*0001~BEG*00*SA*PO1~N1*ST~N3*A~N3*B~N3*C~PO1*1*1~SE*8*0001",
    )?;

    let report = driver.report();
    assert_eq!(report.kinds(), vec![ValidationErrorKind::SegmentExceedsMaximumUse]);
    assert_eq!(report.issues[0].code.as_deref(), Some("N3"));
    assert_eq!(report.issues[0].reference_id.as_deref(), Some("N3"));
    Ok(())
}

#[test]
fn test_segment_over_maximum_at_transaction_level() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PURCHASE_ORDER)?;
    driver.feed(
        "ST*850*0001~BEG*00*SA*PO1~REF*A1~REF*A2~REF*A3~REF*A4~PO1*1*1~SE*8*0001",
    )?;

    assert_eq!(
        driver.kinds(),
        vec![ValidationErrorKind::SegmentExceedsMaximumUse]
    );
    assert_eq!(driver.report().issues[0].code.as_deref(), Some("REF"));
    Ok(())
}

#[test]
fn test_loop_over_maximum() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PURCHASE_ORDER)?;
    driver.feed(
        "ST*850*0001~BEG*00*SA*PO1~PO1*1*1~SCH*1~DTM*002~SCH*2~DTM*002~SCH*3~DTM*002~SE*10*0001",
    )?;

    assert_eq!(
        driver.kinds(),
        vec![ValidationErrorKind::LoopOccursOverMaximumTimes]
    );
    assert_eq!(driver.report().issues[0].reference_id.as_deref(), Some("L_SCH"));
    Ok(())
}

#[test]
fn test_out_of_sequence_segment_is_accepted() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PURCHASE_ORDER)?;
    driver.feed("ST*850*0001~REF*DP~BEG*00*SA*PO1~PO1*1*1~SE*5*0001")?;

    assert_eq!(
        driver.kinds(),
        vec![
            ValidationErrorKind::MandatorySegmentMissing,
            ValidationErrorKind::SegmentNotInProperSequence,
        ]
    );
    let issues = &driver.report().issues;
    assert_eq!(issues[0].code.as_deref(), Some("BEG"));
    assert_eq!(issues[1].code.as_deref(), Some("BEG"));
    Ok(())
}

#[test]
fn test_mandatory_segment_missing_in_completed_loop() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PURCHASE_ORDER)?;
    driver.feed("ST*850*0001~BEG*00*SA*PO1~PO1*1*1~SCH*1~PO1*2*2~SE*6*0001")?;

    assert_eq!(
        driver.kinds(),
        vec![ValidationErrorKind::MandatorySegmentMissing]
    );
    assert_eq!(driver.report().issues[0].code.as_deref(), Some("DTM"));
    Ok(())
}

#[test]
fn test_unexpected_segment_restores_depth() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PURCHASE_ORDER)?;
    driver.feed("ST*850*0001~BEG*00*SA*PO1~PO1*1*1")?;
    assert_eq!(driver.validator.depth(), 2);

    driver.feed("N1*ST")?;
    assert_eq!(driver.kinds(), vec![ValidationErrorKind::UnexpectedSegment]);
    assert_eq!(driver.report().issues[0].reference_id, None);
    assert_eq!(driver.validator.depth(), 2);

    driver.feed("ZZZ*1")?;
    assert_eq!(
        driver.kinds(),
        vec![
            ValidationErrorKind::UnexpectedSegment,
            ValidationErrorKind::SegmentNotInDefinedTransactionSet,
        ]
    );
    assert_eq!(driver.validator.depth(), 2);

    // Matching resumes from the last accepted segment
    driver.feed("SE*5*0001")?;
    assert_eq!(driver.kinds().len(), 2);
    assert_eq!(driver.validator.depth(), 1);
    Ok(())
}

#[test]
fn test_container_segment_ends_transaction() -> anyhow::Result<()> {
    let container = Schema::new("ENV", "1", "ENVELOPE")
        .with_type(
            ComplexType::new("ENVELOPE", "ENVELOPE", NodeType::Transaction)
                .with_reference(Reference::new("GS", 1, 1))
                .with_reference(Reference::new("GE", 1, 1)),
        )
        .with_type(ComplexType::segment("GS"))
        .with_type(ComplexType::segment("GE"));

    let validator = Validator::new(load(PURCHASE_ORDER)?, None, ValidationConfig::default())?
        .with_container(Arc::new(container));
    let mut driver = Driver::new(validator, "1");
    driver.feed("ST*850*0001~BEG*00*SA*PO1~PO1*1*1~SCH*1~DTM*002~GE*1*1")?;

    let report = driver.report();
    assert_eq!(report.kinds(), vec![ValidationErrorKind::MandatorySegmentMissing]);
    assert_eq!(report.issues[0].code.as_deref(), Some("SE"));
    assert_eq!(report.loop_begins(), 2);
    assert_eq!(report.loop_ends(), 2);
    assert_eq!(driver.validator.open_loops(), 0);
    Ok(())
}

#[test]
fn test_repeated_loop_anchor_starts_new_iteration() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PURCHASE_ORDER)?;
    driver.feed("ST*850*0001~BEG*00*SA*PO1~N1*ST~N1*BT~N1*SF~PO1*1*1~SE*7*0001")?;

    let report = driver.report();
    assert!(!report.has_errors(), "unexpected issues: {:?}", report.issues);
    assert_eq!(
        report
            .loops
            .iter()
            .filter(|m| **m == LoopMarker::Begin("L_N1".into()))
            .count(),
        3
    );
    Ok(())
}

#[test]
fn test_reset_matches_fresh_validator() -> anyhow::Result<()> {
    let schema = load(PURCHASE_ORDER)?;
    let fresh = Validator::new(schema.clone(), None, ValidationConfig::default())?;

    let mut driver = Driver::new(
        Validator::new(schema, None, ValidationConfig::default())?,
        "1",
    );
    driver.feed("ST*850*0001~BEG*00*SA*PO1~N1*ST~N3*A~PO1*1*1~SCH*1")?;
    assert_ne!(driver.validator.usage_counts(), fresh.usage_counts());

    driver.validator.reset();

    assert_eq!(driver.validator.usage_counts(), fresh.usage_counts());
    assert_eq!(driver.validator.depth(), 1);
    assert_eq!(driver.validator.open_loops(), 0);
    assert_eq!(driver.validator.pending_revalidations(), 0);
    assert!(!driver.validator.is_pending_discrimination());
    assert!(driver.validator.element_errors().is_empty());
    assert_eq!(driver.validator.segment_reference(), fresh.segment_reference());

    // The next document starts from the first segment again
    driver.recorder.reporter.clear();
    driver.feed(CLEAN_ORDER)?;
    assert!(!driver.report().has_errors(), "{:?}", driver.report().issues);
    Ok(())
}

#[test]
fn test_validator_from_schema_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("po_1.yaml"), PURCHASE_ORDER)?;

    let loader = SchemaLoader::new(vec![dir.path().to_path_buf()]);
    let validator = Validator::from_loader(&loader, "PO", "1", ValidationConfig::default())?;
    assert_eq!(validator.schema().name, "PO");

    let mut driver = Driver::new(validator, "1");
    driver.feed(CLEAN_ORDER)?;
    assert!(!driver.report().has_errors());
    Ok(())
}

#[test]
fn test_missing_schema_file() {
    let loader = SchemaLoader::new(vec![]);
    let result = Validator::from_loader(&loader, "PO", "1", ValidationConfig::default());
    assert!(matches!(result, Err(edi_validation::Error::Schema(_))));
}

const PARTY_LOOP: &str = r#"
name: PARTY
version: "1"
standard: TX_P
types:
  - kind: transaction
    id: TX_P
    references:
      - { ref: ST, min: 1 }
      - { ref: B, max: 5 }
      - { ref: L_N1, max: 5 }
      - { ref: C }
      - { ref: SE, min: 1 }
  - kind: loop
    id: L_N1
    code: N1
    references:
      - { ref: N1, min: 1 }
      - { ref: N3 }
      - { ref: PER }
    syntax:
      - { kind: paired, positions: [2, 3] }
  - { kind: segment, id: ST, references: [ { ref: E1, min: 1 } ] }
  - { kind: segment, id: B, references: [ { ref: E1, min: 1 } ] }
  - { kind: segment, id: C, references: [ { ref: E1, min: 1 } ] }
  - { kind: segment, id: N1, references: [ { ref: E1, min: 1 } ] }
  - { kind: segment, id: N3, references: [ { ref: E1 } ] }
  - { kind: segment, id: PER, references: [ { ref: E1 } ] }
  - { kind: segment, id: SE, references: [ { ref: E1, min: 1 } ] }
  - { kind: element, id: E1, code: "1", base: string, max_length: 10 }
"#;

#[test]
fn test_loop_syntax_checked_once_per_occurrence() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PARTY_LOOP)?;
    driver.feed("ST*1~N1*A~N3*B~SE*1")?;

    let summary: Vec<_> = driver
        .report()
        .issues
        .iter()
        .map(|i| (i.kind, i.element_position, i.reference_id.as_deref()))
        .collect();
    assert_eq!(
        summary,
        vec![(
            ValidationErrorKind::ConditionalRequiredDataElementMissing,
            Some(3),
            Some("PER")
        )]
    );
    Ok(())
}

#[test]
fn test_loop_syntax_each_iteration() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PARTY_LOOP)?;
    driver.feed("ST*1~N1*A~N3*B~PER*C~N1*D~PER*E~N1*F~SE*1")?;

    let positions: Vec<_> = driver
        .report()
        .issues
        .iter()
        .map(|i| (i.kind, i.element_position))
        .collect();
    assert_eq!(
        positions,
        vec![(ValidationErrorKind::ConditionalRequiredDataElementMissing, Some(2))]
    );
    Ok(())
}

#[test]
fn test_out_of_sequence_segment_starts_fresh_elements() -> anyhow::Result<()> {
    let mut driver = Driver::from_yaml(PARTY_LOOP)?;
    driver.feed("ST*1~B*X~C*Z~B*Y~SE*1")?;

    let report = driver.report();
    assert_eq!(
        report.kinds(),
        vec![ValidationErrorKind::SegmentNotInProperSequence]
    );
    assert_eq!(report.issues[0].code.as_deref(), Some("B"));
    Ok(())
}
