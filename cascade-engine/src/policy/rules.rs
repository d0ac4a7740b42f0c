//! Shipped policy rules
//!
//! Three rule families: mandatory-stage presence, prohibited credentials
//! in step env/with fields, and artifact tag immutability.

use cascade_core::domain::artifact::MUTABLE_TAG_ALIASES;
use cascade_core::domain::policy::{Severity, Violation};
use cascade_core::domain::workflow::WorkflowDefinition;

use super::PolicyRule;

/// A canonical stage name and its accepted aliases
#[derive(Debug, Clone)]
pub struct StageVocabulary {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

/// The fixed vocabulary a workflow's job names are matched against
pub const STAGE_VOCABULARY: [StageVocabulary; 4] = [
    StageVocabulary {
        canonical: "build",
        aliases: &["compile", "package"],
    },
    StageVocabulary {
        canonical: "test",
        aliases: &["unit-test", "unit_tests", "check"],
    },
    StageVocabulary {
        canonical: "scan",
        aliases: &["security-scan", "security_scan", "audit"],
    },
    StageVocabulary {
        canonical: "deploy",
        aliases: &["release", "ship"],
    },
];

/// How a job name matched a vocabulary entry
///
/// Precedence is exact match, then alias list, then substring; the first
/// match wins.
fn matches_stage(job_name: &str, vocab: &StageVocabulary) -> bool {
    let name = job_name.to_ascii_lowercase();
    if name == vocab.canonical {
        return true;
    }
    if vocab.aliases.iter().any(|a| name == *a) {
        return true;
    }
    name.contains(vocab.canonical)
}

/// Denies workflows missing a mandatory stage
pub struct MandatoryStageRule {
    vocab: StageVocabulary,
}

impl MandatoryStageRule {
    pub fn new(vocab: StageVocabulary) -> Self {
        Self { vocab }
    }
}

impl PolicyRule for MandatoryStageRule {
    fn name(&self) -> &str {
        self.vocab.canonical
    }

    fn severity(&self) -> Severity {
        Severity::Deny
    }

    fn evaluate(&self, workflow: &WorkflowDefinition) -> Option<Violation> {
        let present = workflow
            .job_names()
            .any(|name| matches_stage(name, &self.vocab));

        if present {
            None
        } else {
            Some(Violation {
                rule: format!("mandatory_stage_{}", self.vocab.canonical),
                severity: Severity::Deny,
                message: format!(
                    "workflow '{}' has no job matching mandatory stage '{}'",
                    workflow.name, self.vocab.canonical
                ),
            })
        }
    }
}

/// Denies steps that reference blocklisted long-lived credentials
pub struct ProhibitedCredentialRule {
    blocklist: Vec<String>,
}

impl ProhibitedCredentialRule {
    pub fn new(blocklist: Vec<String>) -> Self {
        Self { blocklist }
    }

    /// Blocklist of static cloud credential names; short-lived token
    /// exchange is the only accepted authentication path.
    pub fn default_blocklist() -> Vec<String> {
        [
            "AWS_ACCESS_KEY_ID",
            "AWS_SECRET_ACCESS_KEY",
            "AWS_SESSION_TOKEN",
            "GCP_SERVICE_ACCOUNT_KEY",
            "AZURE_CLIENT_SECRET",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn is_blocked(&self, key: &str) -> bool {
        let upper = key.to_ascii_uppercase();
        self.blocklist.iter().any(|b| upper == *b)
    }
}

impl PolicyRule for ProhibitedCredentialRule {
    fn name(&self) -> &str {
        "prohibited_credentials"
    }

    fn severity(&self) -> Severity {
        Severity::Deny
    }

    fn evaluate(&self, workflow: &WorkflowDefinition) -> Option<Violation> {
        for step in workflow.steps() {
            let hit = step
                .env
                .keys()
                .chain(step.with.keys())
                .find(|key| self.is_blocked(key));

            if let Some(key) = hit {
                let step_name = step.name.as_deref().unwrap_or("<unnamed>");
                return Some(Violation {
                    rule: "prohibited_credentials".into(),
                    severity: Severity::Deny,
                    message: format!(
                        "step '{step_name}' references prohibited static credential '{key}'"
                    ),
                });
            }
        }
        None
    }
}

/// Denies tag-like step parameters bound to mutable aliases
pub struct MutableTagRule {
    blocked_values: Vec<String>,
}

impl MutableTagRule {
    pub fn new(blocked_values: Vec<String>) -> Self {
        Self { blocked_values }
    }

    pub fn with_default_aliases() -> Self {
        Self::new(MUTABLE_TAG_ALIASES.iter().map(|s| s.to_string()).collect())
    }

    fn is_tag_key(key: &str) -> bool {
        let lower = key.to_ascii_lowercase();
        lower == "tag" || lower == "version" || lower.ends_with("_tag") || lower.ends_with("-tag")
    }
}

impl PolicyRule for MutableTagRule {
    fn name(&self) -> &str {
        "immutable_artifact_tags"
    }

    fn severity(&self) -> Severity {
        Severity::Deny
    }

    fn evaluate(&self, workflow: &WorkflowDefinition) -> Option<Violation> {
        for step in workflow.steps() {
            for (key, value) in step.with.iter().chain(step.env.iter()) {
                if Self::is_tag_key(key) && self.blocked_values.iter().any(|b| value == b) {
                    let step_name = step.name.as_deref().unwrap_or("<unnamed>");
                    return Some(Violation {
                        rule: "immutable_artifact_tags".into(),
                        severity: Severity::Deny,
                        message: format!(
                            "step '{step_name}' binds tag field '{key}' to mutable value '{value}'"
                        ),
                    });
                }
            }
        }
        None
    }
}

/// The default ruleset: every mandatory stage, credential blocklist, and
/// tag immutability
pub fn default_ruleset() -> super::Ruleset {
    let mut rules: Vec<Box<dyn PolicyRule>> = STAGE_VOCABULARY
        .iter()
        .cloned()
        .map(|v| Box::new(MandatoryStageRule::new(v)) as Box<dyn PolicyRule>)
        .collect();
    rules.push(Box::new(ProhibitedCredentialRule::new(
        ProhibitedCredentialRule::default_blocklist(),
    )));
    rules.push(Box::new(MutableTagRule::with_default_aliases()));
    super::Ruleset::new(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::evaluate;
    use cascade_core::domain::workflow::{JobDefinition, StepDefinition};
    use std::collections::HashMap;

    fn job(name: &str) -> JobDefinition {
        JobDefinition {
            name: name.into(),
            ..Default::default()
        }
    }

    fn workflow_with_jobs(names: &[&str]) -> WorkflowDefinition {
        WorkflowDefinition {
            name: "ci".into(),
            permissions: None,
            jobs: names.iter().map(|n| job(n)).collect(),
        }
    }

    #[test]
    fn test_stage_match_exact() {
        assert!(matches_stage("build", &STAGE_VOCABULARY[0]));
        assert!(matches_stage("Build", &STAGE_VOCABULARY[0]));
    }

    #[test]
    fn test_stage_match_alias() {
        assert!(matches_stage("compile", &STAGE_VOCABULARY[0]));
        assert!(matches_stage("security-scan", &STAGE_VOCABULARY[2]));
    }

    #[test]
    fn test_stage_match_substring() {
        assert!(matches_stage("build-and-push", &STAGE_VOCABULARY[0]));
        assert!(matches_stage("integration-test", &STAGE_VOCABULARY[1]));
    }

    #[test]
    fn test_stage_no_match() {
        assert!(!matches_stage("lint", &STAGE_VOCABULARY[0]));
    }

    #[test]
    fn test_mandatory_stage_missing_denies() {
        let rule = MandatoryStageRule::new(STAGE_VOCABULARY[2].clone());
        let wf = workflow_with_jobs(&["build", "test", "deploy"]);
        let violation = rule.evaluate(&wf).unwrap();
        assert_eq!(violation.severity, Severity::Deny);
        assert!(violation.message.contains("scan"));
    }

    #[test]
    fn test_mandatory_stage_present_passes() {
        let rule = MandatoryStageRule::new(STAGE_VOCABULARY[2].clone());
        let wf = workflow_with_jobs(&["build", "audit", "deploy"]);
        assert!(rule.evaluate(&wf).is_none());
    }

    #[test]
    fn test_prohibited_credential_in_env() {
        let mut env = HashMap::new();
        env.insert("AWS_SECRET_ACCESS_KEY".to_string(), "xxx".to_string());
        let wf = WorkflowDefinition {
            name: "ci".into(),
            permissions: None,
            jobs: vec![JobDefinition {
                name: "deploy".into(),
                permissions: None,
                steps: vec![StepDefinition {
                    name: Some("push".into()),
                    env,
                    with: HashMap::new(),
                }],
            }],
        };
        let rule = ProhibitedCredentialRule::new(ProhibitedCredentialRule::default_blocklist());
        let violation = rule.evaluate(&wf).unwrap();
        assert!(violation.message.contains("AWS_SECRET_ACCESS_KEY"));
    }

    #[test]
    fn test_missing_fields_do_not_error() {
        // A workflow with no steps and no permissions block: credential and
        // tag rules must simply not match.
        let wf = workflow_with_jobs(&["build", "test", "scan", "deploy"]);
        let cred = ProhibitedCredentialRule::new(ProhibitedCredentialRule::default_blocklist());
        let tag = MutableTagRule::with_default_aliases();
        assert!(cred.evaluate(&wf).is_none());
        assert!(tag.evaluate(&wf).is_none());
    }

    #[test]
    fn test_mutable_tag_denied() {
        let mut with = HashMap::new();
        with.insert("image_tag".to_string(), "latest".to_string());
        let wf = WorkflowDefinition {
            name: "ci".into(),
            permissions: None,
            jobs: vec![JobDefinition {
                name: "deploy".into(),
                permissions: None,
                steps: vec![StepDefinition {
                    name: Some("push".into()),
                    env: HashMap::new(),
                    with,
                }],
            }],
        };
        let rule = MutableTagRule::with_default_aliases();
        let violation = rule.evaluate(&wf).unwrap();
        assert!(violation.message.contains("latest"));
    }

    #[test]
    fn test_non_tag_field_with_mutable_value_passes() {
        let mut with = HashMap::new();
        with.insert("branch".to_string(), "main".to_string());
        let wf = WorkflowDefinition {
            name: "ci".into(),
            permissions: None,
            jobs: vec![JobDefinition {
                name: "deploy".into(),
                permissions: None,
                steps: vec![StepDefinition {
                    name: None,
                    env: HashMap::new(),
                    with,
                }],
            }],
        };
        let rule = MutableTagRule::with_default_aliases();
        assert!(rule.evaluate(&wf).is_none());
    }

    #[test]
    fn test_default_ruleset_allows_complete_workflow() {
        let wf = workflow_with_jobs(&["build", "test", "scan", "deploy"]);
        let eval = evaluate(&wf, &default_ruleset());
        assert!(eval.allowed, "violations: {:?}", eval.violations);
    }

    #[test]
    fn test_default_ruleset_denies_incomplete_workflow() {
        let wf = workflow_with_jobs(&["build", "test"]);
        let eval = evaluate(&wf, &default_ruleset());
        assert!(!eval.allowed);
        assert_eq!(eval.denials().count(), 2); // scan and deploy missing
    }
}
