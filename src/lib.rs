// ABOUTME: Library root for fabrik - exposes the orchestrator, providers, and ambient modules.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod output;
pub mod provider;
pub mod spec;
pub mod types;
