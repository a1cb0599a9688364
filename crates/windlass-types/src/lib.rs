//! Shared domain types for the Windlass workflow orchestrator.
//!
//! This crate is serde-first and free of I/O: executions, step results,
//! dead-letter entries, pinned workflow definitions, configuration, and the
//! shared error enums used across crate boundaries.

pub mod config;
pub mod definition;
pub mod error;
pub mod execution;
