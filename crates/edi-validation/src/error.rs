//! Document-level validation errors

use crate::handler::ValidationEventHandler;
use edi_ir::TypeReference;
use edi_schema::ValueError;
use serde::Serialize;
use std::fmt;

/// Broad class of a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCategory {
    /// Segment placement, ordering or cardinality
    SegmentError,
    /// Element presence, repetition or position
    ElementOccurrenceError,
    /// Element value format or code
    ElementDataError,
}

/// Every violation a document can be reported for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidationErrorKind {
    MandatorySegmentMissing,
    SegmentExceedsMaximumUse,
    LoopOccursOverMaximumTimes,
    SegmentNotInProperSequence,
    UnexpectedSegment,
    SegmentNotInDefinedTransactionSet,
    ImplementationUnusedSegmentPresent,
    ImplementationSegmentBelowMinimumUse,
    ImplementationLoopOccursUnderMinimumTimes,

    RequiredDataElementMissing,
    ConditionalRequiredDataElementMissing,
    TooManyDataElements,
    ExclusionConditionViolated,
    TooManyRepetitions,
    TooManyComponents,
    ImplementationUnusedDataElementPresent,
    ImplementationTooFewRepetitions,

    DataElementTooShort,
    DataElementTooLong,
    InvalidCharacterData,
    InvalidCodeValue,
    InvalidDate,
    InvalidTime,
    ImplementationInvalidCodeValue,
}

impl ValidationErrorKind {
    #[must_use]
    pub fn category(self) -> ErrorCategory {
        use ValidationErrorKind::{
            ConditionalRequiredDataElementMissing, ExclusionConditionViolated,
            ImplementationLoopOccursUnderMinimumTimes, ImplementationSegmentBelowMinimumUse,
            ImplementationTooFewRepetitions, ImplementationUnusedDataElementPresent,
            ImplementationUnusedSegmentPresent, LoopOccursOverMaximumTimes,
            MandatorySegmentMissing, RequiredDataElementMissing, SegmentExceedsMaximumUse,
            SegmentNotInDefinedTransactionSet, SegmentNotInProperSequence, TooManyComponents,
            TooManyDataElements, TooManyRepetitions, UnexpectedSegment,
        };

        match self {
            MandatorySegmentMissing
            | SegmentExceedsMaximumUse
            | LoopOccursOverMaximumTimes
            | SegmentNotInProperSequence
            | UnexpectedSegment
            | SegmentNotInDefinedTransactionSet
            | ImplementationUnusedSegmentPresent
            | ImplementationSegmentBelowMinimumUse
            | ImplementationLoopOccursUnderMinimumTimes => ErrorCategory::SegmentError,

            RequiredDataElementMissing
            | ConditionalRequiredDataElementMissing
            | TooManyDataElements
            | ExclusionConditionViolated
            | TooManyRepetitions
            | TooManyComponents
            | ImplementationUnusedDataElementPresent
            | ImplementationTooFewRepetitions => ErrorCategory::ElementOccurrenceError,

            _ => ErrorCategory::ElementDataError,
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MandatorySegmentMissing => "Mandatory segment missing",
            Self::SegmentExceedsMaximumUse => "Segment exceeds maximum use",
            Self::LoopOccursOverMaximumTimes => "Loop occurs over maximum times",
            Self::SegmentNotInProperSequence => "Segment not in proper sequence",
            Self::UnexpectedSegment => "Unexpected segment",
            Self::SegmentNotInDefinedTransactionSet => "Segment not in defined transaction set",
            Self::ImplementationUnusedSegmentPresent => "Implementation unused segment present",
            Self::ImplementationSegmentBelowMinimumUse => "Implementation segment below minimum use",
            Self::ImplementationLoopOccursUnderMinimumTimes => {
                "Implementation loop occurs under minimum times"
            }
            Self::RequiredDataElementMissing => "Required data element missing",
            Self::ConditionalRequiredDataElementMissing => {
                "Conditional required data element missing"
            }
            Self::TooManyDataElements => "Too many data elements",
            Self::ExclusionConditionViolated => "Exclusion condition violated",
            Self::TooManyRepetitions => "Too many repetitions",
            Self::TooManyComponents => "Too many components",
            Self::ImplementationUnusedDataElementPresent => {
                "Implementation unused data element present"
            }
            Self::ImplementationTooFewRepetitions => "Implementation too few repetitions",
            Self::DataElementTooShort => "Data element too short",
            Self::DataElementTooLong => "Data element too long",
            Self::InvalidCharacterData => "Invalid character data",
            Self::InvalidCodeValue => "Invalid code value",
            Self::InvalidDate => "Invalid date",
            Self::InvalidTime => "Invalid time",
            Self::ImplementationInvalidCodeValue => "Implementation invalid code value",
        };
        f.write_str(text)
    }
}

impl From<ValueError> for ValidationErrorKind {
    fn from(error: ValueError) -> Self {
        match error {
            ValueError::TooShort => Self::DataElementTooShort,
            ValueError::TooLong => Self::DataElementTooLong,
            ValueError::InvalidCharacterData => Self::InvalidCharacterData,
            ValueError::InvalidCodeValue => Self::InvalidCodeValue,
            ValueError::InvalidDate => Self::InvalidDate,
            ValueError::InvalidTime => Self::InvalidTime,
        }
    }
}

/// A violation bound to the schema position it was found at.
///
/// Segment-level errors are buffered with the tree depth of the offending
/// node so that only the errors below a completed loop are flushed when the
/// loop ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    pub kind: ValidationErrorKind,
    pub reference: Option<TypeReference>,
    pub depth: u32,
}

impl UsageError {
    #[must_use]
    pub fn new(kind: ValidationErrorKind, reference: Option<TypeReference>, depth: u32) -> Self {
        Self {
            kind,
            reference,
            depth,
        }
    }

    /// Element-level error, which is never buffered by depth
    #[must_use]
    pub fn element(kind: ValidationErrorKind, reference: Option<TypeReference>) -> Self {
        Self::new(kind, reference, 0)
    }

    #[must_use]
    pub fn is_depth_greater_than(&self, depth: u32) -> bool {
        self.depth > depth
    }

    /// Code of the offending node, empty when unknown
    #[must_use]
    pub fn code(&self) -> &str {
        self.reference.as_ref().map_or("", |r| r.code.as_str())
    }

    pub(crate) fn report_segment_error(&self, handler: &mut dyn ValidationEventHandler) {
        handler.segment_error(self.code(), self.reference.as_ref(), self.kind);
    }
}
