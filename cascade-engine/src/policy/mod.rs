//! Policy evaluator
//!
//! A registry of pure predicate rules evaluated against a typed workflow
//! document. Rules carry a severity: `deny` rules veto the run at
//! validate time, `warn` rules are surfaced but never block. Evaluation
//! order is undefined; rules must not depend on each other.

mod rules;

pub use rules::{
    MandatoryStageRule, MutableTagRule, ProhibitedCredentialRule, StageVocabulary,
    default_ruleset,
};

use cascade_core::domain::policy::{Severity, Violation};
use cascade_core::domain::workflow::WorkflowDefinition;

/// A named pure predicate over a workflow definition
///
/// Rules are immutable and side-effect free. A rule referencing a field
/// absent from the input must evaluate to "does not match" rather than
/// erroring; absence only triggers a violation when the rule explicitly
/// checks for absence (e.g. mandatory stage presence).
pub trait PolicyRule: Send + Sync {
    fn name(&self) -> &str;
    fn severity(&self) -> Severity;

    /// Returns a violation when the rule matches, None otherwise
    fn evaluate(&self, workflow: &WorkflowDefinition) -> Option<Violation>;
}

/// An immutable collection of rules, loaded once per evaluation
pub struct Ruleset {
    rules: Vec<Box<dyn PolicyRule>>,
}

impl Ruleset {
    pub fn new(rules: Vec<Box<dyn PolicyRule>>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Result of evaluating a ruleset against a workflow definition
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub violations: Vec<Violation>,
    /// True iff no deny-severity violation was produced
    pub allowed: bool,
}

impl Evaluation {
    /// The deny violations, for error reporting
    pub fn denials(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Deny)
    }
}

/// Evaluates every rule against the workflow definition
pub fn evaluate(workflow: &WorkflowDefinition, ruleset: &Ruleset) -> Evaluation {
    let violations: Vec<Violation> = ruleset
        .rules
        .iter()
        .filter_map(|rule| rule.evaluate(workflow))
        .collect();

    let allowed = !violations.iter().any(|v| v.severity == Severity::Deny);

    for violation in &violations {
        match violation.severity {
            Severity::Deny => {
                tracing::warn!(rule = %violation.rule, "policy denial: {}", violation.message)
            }
            Severity::Warn => {
                tracing::info!(rule = %violation.rule, "policy warning: {}", violation.message)
            }
        }
    }

    Evaluation {
        violations,
        allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::domain::workflow::JobDefinition;

    struct AlwaysDeny;
    impl PolicyRule for AlwaysDeny {
        fn name(&self) -> &str {
            "always_deny"
        }
        fn severity(&self) -> Severity {
            Severity::Deny
        }
        fn evaluate(&self, _: &WorkflowDefinition) -> Option<Violation> {
            Some(Violation {
                rule: "always_deny".into(),
                severity: Severity::Deny,
                message: "denied".into(),
            })
        }
    }

    struct AlwaysWarn;
    impl PolicyRule for AlwaysWarn {
        fn name(&self) -> &str {
            "always_warn"
        }
        fn severity(&self) -> Severity {
            Severity::Warn
        }
        fn evaluate(&self, _: &WorkflowDefinition) -> Option<Violation> {
            Some(Violation {
                rule: "always_warn".into(),
                severity: Severity::Warn,
                message: "warned".into(),
            })
        }
    }

    fn workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            name: "ci".into(),
            permissions: None,
            jobs: vec![JobDefinition {
                name: "Build".into(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_warn_never_blocks() {
        let ruleset = Ruleset::new(vec![Box::new(AlwaysWarn)]);
        let eval = evaluate(&workflow(), &ruleset);
        assert!(eval.allowed);
        assert_eq!(eval.violations.len(), 1);
    }

    #[test]
    fn test_deny_blocks() {
        let ruleset = Ruleset::new(vec![Box::new(AlwaysWarn), Box::new(AlwaysDeny)]);
        let eval = evaluate(&workflow(), &ruleset);
        assert!(!eval.allowed);
        assert_eq!(eval.violations.len(), 2);
        assert_eq!(eval.denials().count(), 1);
    }

    #[test]
    fn test_empty_ruleset_allows() {
        let ruleset = Ruleset::new(vec![]);
        let eval = evaluate(&workflow(), &ruleset);
        assert!(eval.allowed);
        assert!(eval.violations.is_empty());
    }

    #[test]
    fn test_evaluation_is_order_independent() {
        let forward = Ruleset::new(vec![Box::new(AlwaysWarn), Box::new(AlwaysDeny)]);
        let reversed = Ruleset::new(vec![Box::new(AlwaysDeny), Box::new(AlwaysWarn)]);
        let a = evaluate(&workflow(), &forward);
        let b = evaluate(&workflow(), &reversed);
        assert_eq!(a.allowed, b.allowed);
        assert_eq!(a.violations.len(), b.violations.len());
    }
}
