//! # Chat Turn
//!
//! Orchestrates one model response: stream it through the interpreter and run
//! the decoded actions according to the executor's mode.
//!
//! `Spec` waits for the stream to finish and runs the chain afterwards.
//! `Fast` runs each action as soon as the interpreter reports it closed.

use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tracing::info;

use crate::application::engine::ActionExecutor;
use crate::application::parsing::ResponseParser;
use crate::application::stream::StreamDriver;
use crate::domain::config::ParserConfig;
use crate::domain::types::{Action, ActionResult, ActionStatus, ExecutionMode, StructuredResult};

/// Everything a finished turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Final interpreted response. Actions that ran carry their execution status.
    pub result: StructuredResult,
    pub action_results: Vec<ActionResult>,
    /// An action failed and the remaining ones were not run.
    pub halted: bool,
    pub stream_error: Option<String>,
}

pub struct ChatTurn<'e> {
    executor: &'e ActionExecutor,
    parser: ResponseParser,
    throttle: Duration,
}

impl<'e> ChatTurn<'e> {
    pub fn new(executor: &'e ActionExecutor, config: &ParserConfig) -> Self {
        Self {
            executor,
            parser: ResponseParser::with_envelope(&config.envelope),
            throttle: Duration::from_millis(config.throttle_ms),
        }
    }

    /// Consumes `stream`, reporting interpreter progress through `on_update`.
    pub async fn run<S, B, E, F>(self, mut stream: S, mut on_update: F) -> TurnOutcome
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Display,
        F: FnMut(&StructuredResult),
    {
        let Self {
            executor,
            mut parser,
            throttle,
        } = self;
        let mode = executor.mode();
        let mut executed: Vec<Action> = Vec::new();
        let mut action_results = Vec::new();
        let mut halted = false;
        let mut stream_error = None;

        let mut driver = StreamDriver::new(&mut parser, throttle);
        while let Some(chunk) = stream.next().await {
            stream_error = driver.accept(chunk, &mut on_update);
            if stream_error.is_some() {
                break;
            }

            if mode == ExecutionMode::Fast && !halted {
                halted =
                    run_ready(executor, driver.state(), &mut executed, &mut action_results).await;
            }
        }

        let mut result = driver.complete(&mut on_update);

        if !halted {
            halted = run_ready(executor, &result, &mut executed, &mut action_results).await;
        }

        info!(
            "Turn finished in {} mode: {} of {} action(s) run, halted: {}",
            mode,
            action_results.len(),
            result.actions.len(),
            halted
        );
        for (slot, action) in result.actions.iter_mut().zip(executed) {
            *slot = action;
        }

        TurnOutcome {
            result,
            action_results,
            halted,
            stream_error,
        }
    }
}

/// Runs the closed actions of `state` that have not run yet, in order.
/// Returns whether the chain halted.
async fn run_ready(
    executor: &ActionExecutor,
    state: &StructuredResult,
    executed: &mut Vec<Action>,
    results: &mut Vec<ActionResult>,
) -> bool {
    let ready: Vec<Action> = state
        .actions
        .iter()
        .skip(executed.len())
        .take_while(|a| a.status == ActionStatus::Completed)
        .cloned()
        .collect();

    for mut action in ready {
        let result = executor.execute_in_chain(&mut action).await;
        let failed = !result.success;
        executed.push(action);
        results.push(result);
        if failed {
            return true;
        }
    }
    false
}
