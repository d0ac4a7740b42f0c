//! Artifact ledger
//!
//! Tracks artifact identity, immutability, and metadata over an external
//! registry. Once a tag is published its digest mapping is permanent:
//! re-publishing the identical (tag, digest) pair is idempotent, any
//! other digest is rejected.

use async_trait::async_trait;
use std::collections::HashMap;

use cascade_core::domain::artifact::{
    Artifact, ArtifactState, REQUIRED_METADATA_KEYS, is_immutable_tag, is_valid_commit_sha,
};
use cascade_core::error::EngineError;

/// The artifact registry the ledger records into
///
/// This is the storage engine's API surface, treated as an external
/// collaborator; the ledger owns all invariants on top of it.
#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    /// Returns the digest currently bound to a tag, if any
    async fn exists(&self, tag: &str) -> Result<Option<String>, EngineError>;

    /// Binds a tag to a digest with its metadata
    async fn publish(
        &self,
        tag: &str,
        digest: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), EngineError>;

    /// Reads the metadata stored for a tag
    async fn read_metadata(&self, tag: &str) -> Result<HashMap<String, String>, EngineError>;
}

/// Ledger enforcing immutability and metadata completeness
pub struct ArtifactLedger {
    registry: std::sync::Arc<dyn ArtifactRegistry>,
    registry_location: String,
}

impl ArtifactLedger {
    pub fn new(
        registry: std::sync::Arc<dyn ArtifactRegistry>,
        registry_location: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            registry_location: registry_location.into(),
        }
    }

    /// Publishes an artifact, sealing its (tag, digest) mapping
    ///
    /// Rejects mutable tag aliases, incomplete metadata, and tag reuse
    /// with a different digest. All rejections are terminal for the build
    /// stage; none is retried.
    pub async fn publish(
        &self,
        name: &str,
        tag: &str,
        digest: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Artifact, EngineError> {
        if !is_immutable_tag(tag) {
            return Err(EngineError::Validation(format!(
                "tag '{tag}' is not an immutable identifier (commit SHA or semantic version)"
            )));
        }

        let artifact = Artifact {
            name: name.to_string(),
            tag: tag.to_string(),
            digest: digest.to_string(),
            metadata,
            registry_location: self.registry_location.clone(),
            state: ArtifactState::Published,
            deployed_to: Vec::new(),
        };
        self.validate_metadata(&artifact)?;

        match self.registry.exists(tag).await? {
            Some(existing) if existing == digest => {
                // Idempotent re-publish, supports pipeline retries
                tracing::debug!(tag, "tag already published with identical digest");
                Ok(artifact)
            }
            Some(existing) => Err(EngineError::ImmutabilityViolation {
                tag: tag.to_string(),
                existing,
                attempted: digest.to_string(),
            }),
            None => {
                self.registry
                    .publish(tag, digest, &artifact.metadata)
                    .await?;
                tracing::info!(tag, digest, "artifact published");
                Ok(artifact)
            }
        }
    }

    /// Checks every required metadata field is present and non-empty, and
    /// that the referenced commit SHA is syntactically valid
    pub fn validate_metadata(&self, artifact: &Artifact) -> Result<(), EngineError> {
        for key in REQUIRED_METADATA_KEYS {
            match artifact.metadata.get(key) {
                Some(value) if !value.is_empty() => {}
                _ => {
                    return Err(EngineError::Validation(format!(
                        "artifact '{}' is missing required metadata field '{key}'",
                        artifact.tag
                    )));
                }
            }
        }

        let commit = &artifact.metadata["source_commit"];
        if !is_valid_commit_sha(commit) {
            return Err(EngineError::Validation(format!(
                "artifact '{}' references malformed commit SHA '{commit}'",
                artifact.tag
            )));
        }

        Ok(())
    }
}

/// In-memory registry used by the engine's tests and local development
#[derive(Default)]
pub struct InMemoryRegistry {
    entries: std::sync::Mutex<HashMap<String, (String, HashMap<String, String>)>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactRegistry for InMemoryRegistry {
    async fn exists(&self, tag: &str) -> Result<Option<String>, EngineError> {
        let entries = self.entries.lock().expect("registry lock poisoned");
        Ok(entries.get(tag).map(|(digest, _)| digest.clone()))
    }

    async fn publish(
        &self,
        tag: &str,
        digest: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), EngineError> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        entries.insert(tag.to_string(), (digest.to_string(), metadata.clone()));
        Ok(())
    }

    async fn read_metadata(&self, tag: &str) -> Result<HashMap<String, String>, EngineError> {
        let entries = self.entries.lock().expect("registry lock poisoned");
        entries
            .get(tag)
            .map(|(_, metadata)| metadata.clone())
            .ok_or_else(|| EngineError::Validation(format!("unknown tag '{tag}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn ledger() -> ArtifactLedger {
        ArtifactLedger::new(Arc::new(InMemoryRegistry::new()), "registry.local/app")
    }

    fn metadata() -> HashMap<String, String> {
        Artifact::build_metadata(
            "0123456789abcdef0123456789abcdef01234567",
            "https://example.com/org/app",
            Uuid::new_v4(),
        )
    }

    const TAG: &str = "0123456789abcdef0123456789abcdef01234567";

    #[tokio::test]
    async fn test_publish_seals_tag() {
        let ledger = ledger();
        let artifact = ledger
            .publish("app", TAG, "sha256:aaa", metadata())
            .await
            .unwrap();
        assert_eq!(artifact.state, ArtifactState::Published);
        assert_eq!(artifact.digest, "sha256:aaa");
    }

    #[tokio::test]
    async fn test_republish_same_digest_is_idempotent() {
        let ledger = ledger();
        ledger
            .publish("app", TAG, "sha256:aaa", metadata())
            .await
            .unwrap();
        let again = ledger.publish("app", TAG, "sha256:aaa", metadata()).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_republish_different_digest_rejected() {
        let ledger = ledger();
        ledger
            .publish("app", TAG, "sha256:aaa", metadata())
            .await
            .unwrap();
        let err = ledger
            .publish("app", TAG, "sha256:bbb", metadata())
            .await
            .unwrap_err();
        match err {
            EngineError::ImmutabilityViolation {
                tag,
                existing,
                attempted,
            } => {
                assert_eq!(tag, TAG);
                assert_eq!(existing, "sha256:aaa");
                assert_eq!(attempted, "sha256:bbb");
            }
            other => panic!("expected immutability violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mutable_tag_rejected() {
        let ledger = ledger();
        let err = ledger
            .publish("app", "latest", "sha256:aaa", metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_metadata_rejected() {
        let ledger = ledger();
        let mut incomplete = metadata();
        incomplete.remove("repository_url");
        let err = ledger
            .publish("app", TAG, "sha256:aaa", incomplete)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_malformed_commit_sha_rejected() {
        let ledger = ledger();
        let mut bad = metadata();
        bad.insert("source_commit".to_string(), "not-hex".to_string());
        let err = ledger
            .publish("app", TAG, "sha256:aaa", bad)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
