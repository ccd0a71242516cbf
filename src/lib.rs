//! # Artisan
//!
//! Core of an AI coding assistant: turns a streamed, tagged model response
//! into reasoning steps and executable actions, runs those actions against a
//! project store and sandbox, and recovers from failures.
//!
//! - Domain: types, errors, configuration, collaborator traits
//! - Application: response interpreter, action handlers, engine, recovery
//! - Infrastructure: host sandbox, memory store, search client, preview bus, logging

pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod test_support;

pub use application::actions::{ActionHandler, ActionHandlers, Collaborators};
pub use application::engine::ActionExecutor;
pub use application::parsing::{ResponseParser, interpret};
pub use application::recovery::{RecoveryController, RecoveryOptions, RecoveryResult};
pub use application::turn::{ChatTurn, TurnOutcome};
pub use domain::config::AppConfig;
pub use domain::errors::ActionError;
pub use domain::types::{
    Action, ActionKind, ActionResult, ActionStatus, ExecutionMode, ReasoningStep, StructuredResult,
};
