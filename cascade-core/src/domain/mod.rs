//! Core domain types
//!
//! This module contains the core domain structures used across Cascade services.
//! These types represent the fundamental business entities and are shared between
//! the orchestrator (for persistence) and the engine (for execution).

pub mod artifact;
pub mod environment;
pub mod policy;
pub mod promotion;
pub mod run;
pub mod scan;
pub mod stage;
pub mod workflow;
