//! # Domain Layer
//!
//! Core definitions, types, and traits that define the business domain of the crate.
//! Independent of specific collaborators, serving as the contract for the other layers.

pub mod config;
pub mod errors;
pub mod file_tree;
pub mod traits;
pub mod types;
