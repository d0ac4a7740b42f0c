//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used for communication between Cascade
//! services (orchestrator, CLI, scanners). DTOs are lightweight
//! representations of domain entities optimized for network transfer.

pub mod promotion;
pub mod run;
