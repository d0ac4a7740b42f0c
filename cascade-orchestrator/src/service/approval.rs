//! Approval Service
//!
//! Business logic for the human approval gate: querying pending
//! requests, applying decisions, and expiring stale requests.

use uuid::Uuid;

use cascade_core::domain::promotion::{ApprovalRequest, ApprovalState};
use cascade_core::dto::promotion::{ApprovalDecision, ApprovalStatus};
use cascade_core::error::EngineError;

use crate::state::AppState;

/// Service error type
#[derive(Debug)]
pub enum ApprovalError {
    NotFound(Uuid),
    Validation(String),
    Engine(EngineError),
}

impl From<EngineError> for ApprovalError {
    fn from(err: EngineError) -> Self {
        ApprovalError::Engine(err)
    }
}

pub type Result<T> = std::result::Result<T, ApprovalError>;

async fn status_of(state: &AppState, request: &ApprovalRequest) -> Result<ApprovalStatus> {
    let promotion = state.runs.fetch_promotion(request.promotion_id).await?;
    Ok(ApprovalStatus {
        request_id: request.id,
        run_id: request.run_id,
        state: request.state,
        expires_at: request.expires_at,
        promotion,
    })
}

/// Get the status of an approval request
pub async fn get_approval(state: &AppState, id: Uuid) -> Result<ApprovalStatus> {
    let request = state
        .approvals
        .fetch(id)
        .await?
        .ok_or(ApprovalError::NotFound(id))?;
    status_of(state, &request).await
}

/// List approval requests still awaiting a decision
pub async fn list_pending(state: &AppState) -> Result<Vec<ApprovalStatus>> {
    let pending = state.approvals.list_pending().await?;
    let mut statuses = Vec::with_capacity(pending.len());
    for request in &pending {
        statuses.push(status_of(state, request).await?);
    }
    Ok(statuses)
}

/// Apply a human decision to a pending approval request
///
/// The decision is recorded synchronously; the resumed promotion (which
/// deploys on approval) runs in the background.
pub async fn decide_approval(
    state: &AppState,
    id: Uuid,
    decision: ApprovalDecision,
) -> Result<ApprovalStatus> {
    let mut request = state
        .approvals
        .fetch(id)
        .await?
        .ok_or(ApprovalError::NotFound(id))?;

    if !request.is_pending() {
        return Err(ApprovalError::Validation(format!(
            "approval {} already decided",
            id
        )));
    }

    let now = chrono::Utc::now();
    if request.is_expired_at(now) {
        // Resume performs the expiry transition and fails the run.
        state.coordinator.resume(id).await?;
        return Err(ApprovalError::Validation(format!("approval {} expired", id)));
    }

    request.state = if decision.approve {
        ApprovalState::Approved
    } else {
        ApprovalState::Rejected
    };
    request.approver = Some(decision.approver);
    request.decided_at = Some(now);
    state.approvals.update(&request).await?;

    tracing::info!(
        "Approval {} {} by {}",
        id,
        if decision.approve { "approved" } else { "rejected" },
        request.approver.as_deref().unwrap_or("unknown")
    );

    let coordinator = state.coordinator.clone();
    tokio::spawn(async move {
        if let Err(err) = coordinator.resume(id).await {
            tracing::warn!("Resume of approval {} ended in error: {}", id, err);
        }
    });

    status_of(state, &request).await
}

/// Expire pending approvals whose deadline has passed
///
/// Called periodically; each expired request is resumed so the
/// suspended run is finalized.
pub async fn sweep_expired(state: &AppState) -> Result<usize> {
    let pending = state.approvals.list_pending().await?;
    let now = chrono::Utc::now();
    let mut expired = 0;

    for request in pending {
        if !request.is_expired_at(now) {
            continue;
        }
        match state.coordinator.resume(request.id).await {
            Ok(_) => {
                tracing::info!("Approval {} expired, run {} failed", request.id, request.run_id);
                expired += 1;
            }
            Err(err) => {
                tracing::warn!("Expiring approval {} failed: {}", request.id, err);
            }
        }
    }

    Ok(expired)
}
