//! Service Module
//!
//! Business logic between the API handlers and the engine. Each
//! submodule owns one domain.

pub mod approval;
pub mod environment;
pub mod run;

pub use approval as approval_service;
pub use environment as environment_service;
pub use run as run_service;
