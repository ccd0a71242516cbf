//! # Tools Module
//!
//! Host-side execution environment: a sandboxed project directory that runs
//! processes and file operations for the action handlers.

pub mod executor;

pub use executor::LocalSandbox;
