//! Cascade Core
//!
//! Core types and abstractions for the Cascade promotion engine.
//!
//! This crate contains:
//! - Domain types: Core business entities (PipelineRun, Stage, Artifact, etc.)
//! - DTOs: Data transfer objects for inter-service communication
//! - Error taxonomy: Shared failure classification with stable exit codes

pub mod domain;
pub mod dto;
pub mod error;
