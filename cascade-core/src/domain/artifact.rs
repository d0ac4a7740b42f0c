//! Artifact domain types
//!
//! An artifact is the sealed output of a build stage. Its tag must be an
//! immutable identifier (commit SHA or semantic version); once published,
//! the (tag, digest) pair is a permanent mapping.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata keys every published artifact must carry, non-empty
pub const REQUIRED_METADATA_KEYS: [&str; 4] = [
    "source_commit",
    "repository_url",
    "build_timestamp",
    "run_id",
];

/// Tag aliases that are mutable by convention and therefore never accepted
pub const MUTABLE_TAG_ALIASES: [&str; 5] = ["latest", "main", "master", "prod", "stable"];

/// The build output tracked by the artifact ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub tag: String,
    pub digest: String,
    pub metadata: HashMap<String, String>,
    pub registry_location: String,
    pub state: ArtifactState,
    /// Environments this artifact has been deployed to, in order.
    pub deployed_to: Vec<String>,
}

impl Artifact {
    /// Builds the standard metadata map for an artifact produced by a run
    pub fn build_metadata(
        commit_sha: &str,
        repository_url: &str,
        run_id: Uuid,
    ) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("source_commit".to_string(), commit_sha.to_string());
        metadata.insert("repository_url".to_string(), repository_url.to_string());
        metadata.insert(
            "build_timestamp".to_string(),
            chrono::Utc::now().to_rfc3339(),
        );
        metadata.insert("run_id".to_string(), run_id.to_string());
        metadata
    }
}

/// Artifact lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    Created,
    /// Digest sealed, tag locked
    Published,
    Deployed,
    Archived,
}

/// Checks commit SHA syntax: full 40-hex or an accepted 7-12 hex short form
pub fn is_valid_commit_sha(sha: &str) -> bool {
    let len = sha.len();
    (len == 40 || (7..=12).contains(&len)) && sha.chars().all(|c| c.is_ascii_hexdigit())
}

/// Checks whether a tag is an immutable identifier
///
/// Accepted forms are a commit SHA or a semantic version (optionally
/// prefixed with `v`). Known mutable aliases are always rejected.
pub fn is_immutable_tag(tag: &str) -> bool {
    if MUTABLE_TAG_ALIASES.contains(&tag) {
        return false;
    }
    is_valid_commit_sha(tag) || is_semantic_version(tag)
}

fn is_semantic_version(tag: &str) -> bool {
    let tag = tag.strip_prefix('v').unwrap_or(tag);
    let parts: Vec<&str> = tag.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
