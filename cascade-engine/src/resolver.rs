//! Branch/environment resolver
//!
//! Maps a branch name to the ordered set of target environments. An
//! unmatched branch resolves to an empty list: the run still builds,
//! tests, and scans, then completes without deploying. That is a valid
//! terminal state, not a failure.

/// One branch pattern and the environments it targets
#[derive(Debug, Clone)]
pub struct BranchRule {
    /// Either an exact name ("main") or a prefix glob ("feature/*").
    pub pattern: String,
    pub environments: Vec<String>,
}

impl BranchRule {
    pub fn new(pattern: impl Into<String>, environments: &[&str]) -> Self {
        Self {
            pattern: pattern.into(),
            environments: environments.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn matches(&self, branch: &str) -> bool {
        if let Some(prefix) = self.pattern.strip_suffix("/*") {
            branch
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
        } else {
            branch == self.pattern
        }
    }
}

/// Resolves branch names against an ordered rule list; first match wins
pub struct BranchResolver {
    rules: Vec<BranchRule>,
}

impl BranchResolver {
    pub fn new(rules: Vec<BranchRule>) -> Self {
        Self { rules }
    }

    /// The standard mapping: feature/bugfix branches stop at dev, main and
    /// release branches promote staging -> production, hotfix branches walk
    /// the whole chain. Production is only ever reached through the
    /// promotion gate.
    pub fn with_default_rules() -> Self {
        Self::new(vec![
            BranchRule::new("feature/*", &["dev"]),
            BranchRule::new("bugfix/*", &["dev"]),
            BranchRule::new("main", &["staging", "production"]),
            BranchRule::new("release/*", &["staging", "production"]),
            BranchRule::new("hotfix/*", &["dev", "staging", "production"]),
        ])
    }

    /// Ordered environments for a branch; empty when no rule matches
    pub fn resolve(&self, branch: &str) -> Vec<String> {
        self.rules
            .iter()
            .find(|rule| rule.matches(branch))
            .map(|rule| rule.environments.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_branch_targets_dev() {
        let resolver = BranchResolver::with_default_rules();
        assert_eq!(resolver.resolve("feature/login"), vec!["dev"]);
        assert_eq!(resolver.resolve("bugfix/null-deref"), vec!["dev"]);
    }

    #[test]
    fn test_main_targets_staging_then_production() {
        let resolver = BranchResolver::with_default_rules();
        assert_eq!(resolver.resolve("main"), vec!["staging", "production"]);
        assert_eq!(
            resolver.resolve("release/2.3"),
            vec!["staging", "production"]
        );
    }

    #[test]
    fn test_hotfix_walks_whole_chain() {
        let resolver = BranchResolver::with_default_rules();
        assert_eq!(
            resolver.resolve("hotfix/cve-2026-1234"),
            vec!["dev", "staging", "production"]
        );
    }

    #[test]
    fn test_unmatched_branch_resolves_empty() {
        let resolver = BranchResolver::with_default_rules();
        assert!(resolver.resolve("experiment").is_empty());
        assert!(resolver.resolve("dependabot/cargo/serde-1.0").is_empty());
    }

    #[test]
    fn test_glob_needs_a_suffix() {
        let resolver = BranchResolver::with_default_rules();
        // "feature/" alone and the bare prefix are not matches
        assert!(resolver.resolve("feature").is_empty());
        assert!(resolver.resolve("feature/").is_empty());
        // A name that merely starts with the prefix text is not a match
        assert!(resolver.resolve("features/x").is_empty());
    }

    #[test]
    fn test_exact_pattern_is_not_a_prefix() {
        let resolver = BranchResolver::with_default_rules();
        assert!(resolver.resolve("main-backup").is_empty());
    }
}
