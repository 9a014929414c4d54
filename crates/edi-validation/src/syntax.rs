//! Syntax rules between sibling positions
//!
//! Each [`SyntaxRuleKind`] is checked by its own stateless strategy. A rule
//! only looks at whether the positions it names were used by the time the
//! owning segment, composite or loop completed.

use crate::error::ValidationErrorKind;
use crate::handler::{ElementErrorReport, ValidationEventHandler};
use edi_ir::TypeReference;
use edi_schema::{SyntaxRule, SyntaxRuleKind};

/// Used/unused state of the children of one completed structure
#[derive(Debug, Clone, Default)]
pub struct SyntaxScope<'a> {
    used: Vec<bool>,
    references: Vec<Option<&'a TypeReference>>,
    composite_position: Option<u32>,
}

impl<'a> SyntaxScope<'a> {
    /// Empty scope; `composite_position` is the 1-based element position of
    /// the composite when the structure is one
    #[must_use]
    pub fn new(composite_position: Option<u32>) -> Self {
        Self {
            used: Vec::new(),
            references: Vec::new(),
            composite_position,
        }
    }

    /// Scope with the given usage flags and no references
    #[must_use]
    pub fn with_usage(flags: impl IntoIterator<Item = bool>, composite_position: Option<u32>) -> Self {
        let mut scope = Self::new(composite_position);
        for used in flags {
            scope.push(used, None);
        }
        scope
    }

    pub fn push(&mut self, used: bool, reference: Option<&'a TypeReference>) {
        self.used.push(used);
        self.references.push(reference);
    }

    /// Positions past the last child count as unused
    fn is_used(&self, position: u32) -> bool {
        position_index(position).is_some_and(|i| self.used.get(i).copied().unwrap_or(false))
    }

    fn reference(&self, position: u32) -> Option<&'a TypeReference> {
        position_index(position).and_then(|i| self.references.get(i).copied().flatten())
    }

    fn element_position(&self, position: u32) -> u32 {
        self.composite_position.unwrap_or(position)
    }

    fn component_position(&self, position: u32) -> Option<u32> {
        self.composite_position.map(|_| position)
    }
}

fn position_index(position: u32) -> Option<usize> {
    (position as usize).checked_sub(1)
}

#[derive(Debug, Clone, Copy, Default)]
struct SyntaxStatus {
    used_count: usize,
    anchor_present: bool,
}

/// Strategy checking one kind of syntax rule
pub trait SyntaxValidator: Sync {
    fn validate(
        &self,
        rule: &SyntaxRule,
        scope: &SyntaxScope<'_>,
        handler: &mut dyn ValidationEventHandler,
    );
}

struct SingleSyntax;
struct PairedSyntax;
struct RequiredSyntax;
struct ExclusionSyntax;
struct ConditionalSyntax;
struct ListSyntax;

/// The strategy for a rule kind
#[must_use]
pub fn validator_for(kind: SyntaxRuleKind) -> &'static dyn SyntaxValidator {
    match kind {
        SyntaxRuleKind::Single => &SingleSyntax,
        SyntaxRuleKind::Paired => &PairedSyntax,
        SyntaxRuleKind::Required => &RequiredSyntax,
        SyntaxRuleKind::Exclusion => &ExclusionSyntax,
        SyntaxRuleKind::Conditional => &ConditionalSyntax,
        SyntaxRuleKind::List => &ListSyntax,
    }
}

/// Check every rule against the scope
pub fn validate_rules(
    rules: &[SyntaxRule],
    scope: &SyntaxScope<'_>,
    handler: &mut dyn ValidationEventHandler,
) {
    for rule in rules {
        validator_for(rule.kind).validate(rule, scope, handler);
    }
}

fn scan(rule: &SyntaxRule, scope: &SyntaxScope<'_>) -> SyntaxStatus {
    let mut status = SyntaxStatus::default();

    for (i, &position) in rule.positions.iter().enumerate() {
        if scope.is_used(position) {
            status.used_count += 1;
            if i == 0 {
                status.anchor_present = true;
            }
        }
    }

    status
}

fn report(
    kind: ValidationErrorKind,
    position: u32,
    scope: &SyntaxScope<'_>,
    handler: &mut dyn ValidationEventHandler,
) {
    handler.element_error(&ElementErrorReport {
        kind,
        reference: scope.reference(position),
        data: None,
        element_position: scope.element_position(position),
        component_position: scope.component_position(position),
        element_occurrence: None,
    });
}

/// One error for every unused position of the rule
fn signal_condition_error(
    rule: &SyntaxRule,
    scope: &SyntaxScope<'_>,
    handler: &mut dyn ValidationEventHandler,
) {
    for &position in &rule.positions {
        if !scope.is_used(position) {
            report(
                ValidationErrorKind::ConditionalRequiredDataElementMissing,
                position,
                scope,
                handler,
            );
        }
    }
}

/// One error for every used position after the first
fn signal_exclusion_error(
    rule: &SyntaxRule,
    scope: &SyntaxScope<'_>,
    handler: &mut dyn ValidationEventHandler,
) {
    let mut tally = 0;

    for &position in &rule.positions {
        if scope.is_used(position) {
            tally += 1;
            if tally > 1 {
                report(
                    ValidationErrorKind::ExclusionConditionViolated,
                    position,
                    scope,
                    handler,
                );
            }
        }
    }
}

impl SyntaxValidator for SingleSyntax {
    fn validate(&self, rule: &SyntaxRule, scope: &SyntaxScope<'_>, handler: &mut dyn ValidationEventHandler) {
        if scan(rule, scope).used_count > 1 {
            signal_exclusion_error(rule, scope, handler);
        }
    }
}

impl SyntaxValidator for PairedSyntax {
    fn validate(&self, rule: &SyntaxRule, scope: &SyntaxScope<'_>, handler: &mut dyn ValidationEventHandler) {
        let status = scan(rule, scope);
        if status.used_count > 0 && status.used_count < rule.positions.len() {
            signal_condition_error(rule, scope, handler);
        }
    }
}

impl SyntaxValidator for RequiredSyntax {
    fn validate(&self, rule: &SyntaxRule, scope: &SyntaxScope<'_>, handler: &mut dyn ValidationEventHandler) {
        if scan(rule, scope).used_count == 0 {
            signal_condition_error(rule, scope, handler);
        }
    }
}

impl SyntaxValidator for ExclusionSyntax {
    fn validate(&self, rule: &SyntaxRule, scope: &SyntaxScope<'_>, handler: &mut dyn ValidationEventHandler) {
        if scan(rule, scope).used_count > 1 {
            signal_exclusion_error(rule, scope, handler);
        }
    }
}

impl SyntaxValidator for ConditionalSyntax {
    fn validate(&self, rule: &SyntaxRule, scope: &SyntaxScope<'_>, handler: &mut dyn ValidationEventHandler) {
        let status = scan(rule, scope);
        if status.anchor_present && status.used_count < rule.positions.len() {
            signal_condition_error(rule, scope, handler);
        }
    }
}

impl SyntaxValidator for ListSyntax {
    fn validate(&self, rule: &SyntaxRule, scope: &SyntaxScope<'_>, handler: &mut dyn ValidationEventHandler) {
        let status = scan(rule, scope);
        if status.anchor_present && status.used_count < 2 {
            signal_condition_error(rule, scope, handler);
        }
    }
}
