// ABOUTME: Library root for dockyard - containerization and deployment orchestration.
// ABOUTME: The CLI binary is in main.rs; everything it drives is exposed here for testing.

pub mod build;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod exec;
pub mod output;
pub mod result;
pub mod types;
