//! Policy evaluation output types

use serde::{Deserialize, Serialize};

/// Severity of a policy rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks the run when matched
    Deny,
    /// Surfaced but never blocking
    Warn,
}

/// A rendered rule match produced during evaluation
///
/// Violations are ephemeral evaluation output; they are kept only in the
/// run's audit record, never persisted on their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
}
