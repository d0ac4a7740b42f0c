//! Scan result types
//!
//! Scan stage bodies are external collaborators; the engine only consumes
//! their reported finding counts when gating promotion to production.

use serde::{Deserialize, Serialize};

/// Summary of the latest security scan for an artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub artifact_tag: String,
    pub critical_findings: u32,
    pub total_findings: u32,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.critical_findings == 0
    }
}
