//! Command stage body
//!
//! Invokes one external command per stage kind, passing the stage
//! context through environment variables. The command's exit status maps
//! onto the error signal the retry controller classifies with:
//! 75 (EX_TEMPFAIL) and 124 (timeout wrappers) read as transient-ish
//! signals, anything else carries no signal.
//!
//! A build command must print the artifact's content digest as its last
//! stdout line.

use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;

use cascade_core::domain::stage::StageKind;
use cascade_engine::executor::{StageBody, StageBodyError, StageBodyOutput, StageSpec};

/// Runs a configured command per stage kind
pub struct CommandStageBody {
    commands: HashMap<StageKind, String>,
    shell: String,
}

impl CommandStageBody {
    pub fn new(commands: HashMap<StageKind, String>) -> Self {
        Self {
            commands,
            shell: "/bin/sh".to_string(),
        }
    }

    /// Reads stage commands from CASCADE_<KIND>_CMD environment variables
    pub fn from_env() -> Self {
        let mut commands = HashMap::new();
        for (kind, var) in [
            (StageKind::Build, "CASCADE_BUILD_CMD"),
            (StageKind::Test, "CASCADE_TEST_CMD"),
            (StageKind::Scan, "CASCADE_SCAN_CMD"),
            (StageKind::Deploy, "CASCADE_DEPLOY_CMD"),
            (StageKind::Verify, "CASCADE_VERIFY_CMD"),
        ] {
            if let Ok(cmd) = std::env::var(var) {
                commands.insert(kind, cmd);
            }
        }
        Self::new(commands)
    }

    fn signal_for_exit(code: i32) -> Option<String> {
        match code {
            75 => Some("unavailable".to_string()),
            124 => Some("timeout".to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl StageBody for CommandStageBody {
    async fn invoke(&self, spec: &StageSpec) -> Result<StageBodyOutput, StageBodyError> {
        let command = self.commands.get(&spec.kind).ok_or_else(|| {
            StageBodyError::new(format!("no command configured for stage '{}'", spec.kind))
        })?;

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .env("CASCADE_RUN_ID", spec.run_id.to_string())
            .env("CASCADE_STAGE", spec.kind.to_string())
            .env("CASCADE_REPOSITORY", &spec.repository)
            .env("CASCADE_COMMIT_SHA", &spec.commit_sha)
            .env(
                "CASCADE_ENVIRONMENT",
                spec.environment.as_deref().unwrap_or(""),
            )
            .env(
                "CASCADE_ARTIFACT_TAG",
                spec.artifact_tag.as_deref().unwrap_or(""),
            )
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| StageBodyError::new(format!("failed to spawn stage command: {e}")))?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let last_line = stdout
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string());

            Ok(StageBodyOutput {
                digest: (spec.kind == StageKind::Build).then_some(last_line).flatten(),
                detail: None,
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("stage command failed")
                .trim()
                .to_string();
            let code = output.status.code().unwrap_or(-1);

            Err(StageBodyError {
                message: format!("{message} (exit {code})"),
                signal: Self::signal_for_exit(code),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn spec(kind: StageKind) -> StageSpec {
        StageSpec {
            run_id: Uuid::new_v4(),
            kind,
            environment: Some("dev".into()),
            repository: "org/app".into(),
            commit_sha: "0123456789abcdef0123456789abcdef01234567".into(),
            artifact_tag: None,
        }
    }

    fn body_with(kind: StageKind, cmd: &str) -> CommandStageBody {
        let mut commands = HashMap::new();
        commands.insert(kind, cmd.to_string());
        CommandStageBody::new(commands)
    }

    #[tokio::test]
    async fn test_build_digest_is_last_stdout_line() {
        let body = body_with(
            StageKind::Build,
            "echo compiling; echo sha256:deadbeef",
        );
        let output = body.invoke(&spec(StageKind::Build)).await.unwrap();
        assert_eq!(output.digest.as_deref(), Some("sha256:deadbeef"));
    }

    #[tokio::test]
    async fn test_non_build_stage_reports_no_digest() {
        let body = body_with(StageKind::Test, "echo ok");
        let output = body.invoke(&spec(StageKind::Test)).await.unwrap();
        assert!(output.digest.is_none());
    }

    #[tokio::test]
    async fn test_tempfail_exit_maps_to_unavailable_signal() {
        let body = body_with(StageKind::Deploy, "echo 'registry down' >&2; exit 75");
        let err = body.invoke(&spec(StageKind::Deploy)).await.unwrap_err();
        assert_eq!(err.signal.as_deref(), Some("unavailable"));
        assert!(err.message.contains("registry down"));
    }

    #[tokio::test]
    async fn test_plain_failure_has_no_signal() {
        let body = body_with(StageKind::Deploy, "exit 1");
        let err = body.invoke(&spec(StageKind::Deploy)).await.unwrap_err();
        assert!(err.signal.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_stage_fails() {
        let body = CommandStageBody::new(HashMap::new());
        let err = body.invoke(&spec(StageKind::Build)).await.unwrap_err();
        assert!(err.message.contains("no command configured"));
    }

    #[tokio::test]
    async fn test_stage_context_passed_through_env() {
        let body = body_with(StageKind::Verify, "test \"$CASCADE_ENVIRONMENT\" = dev");
        assert!(body.invoke(&spec(StageKind::Verify)).await.is_ok());
    }
}
