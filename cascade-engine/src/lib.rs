//! Cascade Engine
//!
//! The pipeline orchestration and promotion engine. Executes the fixed
//! stage graph (validate -> build -> {test, scan} -> deploy -> verify)
//! per run, classifies failures, drives retries and rollback, and gates
//! environment-to-environment promotion behind eligibility and approval
//! checks.
//!
//! Architecture:
//! - `policy`: pure rule engine over workflow definitions
//! - `ledger`: artifact identity and immutability tracking
//! - `executor`: timeout-bounded invocation of opaque stage bodies
//! - `retry`: per-stage-kind failure classification and retry policy
//! - `resolver`: branch pattern -> target environment mapping
//! - `gate`: promotion eligibility and human approval suspension
//! - `scheduler`: per-environment mutual exclusion and deploy queueing
//! - `coordinator`: top-level run driver owning the run's lifecycle
//!
//! External collaborators (stage bodies, the artifact registry, token
//! exchange, persistence) sit behind traits; in-memory implementations
//! back the engine's tests.

pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod executor;
pub mod gate;
pub mod ledger;
pub mod policy;
pub mod resolver;
pub mod retry;
pub mod scheduler;
pub mod store;
