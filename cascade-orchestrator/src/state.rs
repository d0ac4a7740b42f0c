//! Shared handler state
//!
//! The coordinator and its stores are built once at startup and cloned
//! into every handler. The stores are the same trait objects the
//! coordinator holds, so service code and the engine always observe the
//! same persistence.

use std::sync::Arc;

use cascade_engine::coordinator::Coordinator;
use cascade_engine::store::{ApprovalStore, EnvironmentStore, RunStore};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub runs: Arc<dyn RunStore>,
    pub environments: Arc<dyn EnvironmentStore>,
    pub approvals: Arc<dyn ApprovalStore>,
}
