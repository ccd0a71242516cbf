//! # Execution Engine
//!
//! Runs decoded actions against their handlers, one at a time.
//! Dangerous actions wait for approval in `Spec` mode; in `Fast` mode a failed
//! action goes through the recovery protocol before the chain continues or halts.
//! Nothing escapes `execute`: handler errors and panics become failed results.

use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::application::actions::{ActionHandler, ActionHandlers, Collaborators};
use crate::application::recovery::{RecoveryController, RecoveryOptions, RecoveryResult};
use crate::domain::config::AppConfig;
use crate::domain::errors::ActionError;
use crate::domain::traits::{ActionFailure, Approval, ExecutionHooks, RecoveryHooks};
use crate::domain::types::{Action, ActionResult, ActionStatus, ExecutionMode};

pub struct ActionExecutor {
    handlers: ActionHandlers,
    recovery: RecoveryController,
    recovery_options: RecoveryOptions,
    hooks: Option<Arc<dyn ExecutionHooks>>,
    mode: ExecutionMode,
}

impl ActionExecutor {
    pub fn new(collaborators: &Collaborators, config: &AppConfig) -> Self {
        let handlers = ActionHandlers::new(collaborators, config);
        let recovery = RecoveryController::new(collaborators.search.clone(), handlers.git());
        let recovery_options = RecoveryOptions::from(&config.recovery);

        Self {
            handlers,
            recovery,
            recovery_options,
            hooks: None,
            mode: config.executor.mode,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ExecutionHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_recovery_hooks(mut self, hooks: Arc<dyn RecoveryHooks>) -> Self {
        self.recovery = self.recovery.with_hooks(hooks);
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ExecutionMode) {
        info!("Execution mode set to {}", mode);
        self.mode = mode;
    }

    /// Replaces the handler for one action family.
    pub fn register_handler(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers.register(handler);
    }

    /// Runs one action, updating its status in place.
    pub async fn execute(&self, action: &mut Action) -> ActionResult {
        let result = self.execute_unreported(action).await;
        if !result.success {
            self.report_failure(&result, None);
        }
        result
    }

    /// `execute` without the `on_action_error` report, so a caller that goes
    /// on to recover can report the failure once, with its final outcome.
    async fn execute_unreported(&self, action: &mut Action) -> ActionResult {
        action.status = ActionStatus::InProgress;
        info!("Executing {}", action.kind);
        if let Some(hooks) = &self.hooks {
            hooks.on_action_start(action);
        }

        if self.mode == ExecutionMode::Spec && action.kind.is_dangerous() {
            action.status = ActionStatus::WaitingApproval;
            if self.request_approval(action).await == Approval::Rejected {
                info!("{} rejected by user", action.kind);
                action.status = ActionStatus::Error;
                return ActionResult::failed(action, ActionError::Rejected.to_string())
                    .non_retryable();
            }
            action.status = ActionStatus::InProgress;
        }

        let mut result = self.dispatch_guarded(action).await;
        action.status = if result.success {
            ActionStatus::Completed
        } else {
            ActionStatus::Error
        };
        result.action.status = action.status;

        if result.success {
            debug!("{} completed", action.kind);
            if let Some(hooks) = &self.hooks {
                hooks.on_action_complete(&result);
            }
        } else {
            warn!(
                "{} failed: {}",
                action.kind,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        result
    }

    /// Runs `actions` in order. `Spec` halts at the first failure; `Fast`
    /// attempts recovery first and halts only if that fails too.
    pub async fn execute_chain(&self, actions: &mut [Action]) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());

        for action in actions.iter_mut() {
            let result = self.execute_in_chain(action).await;
            let halt = !result.success;
            results.push(result);
            if halt {
                break;
            }
        }
        results
    }

    /// One step of a chain: `execute` plus, in `Fast` mode, recovery.
    /// A failed result means the chain must halt.
    pub(crate) async fn execute_in_chain(&self, action: &mut Action) -> ActionResult {
        if self.mode == ExecutionMode::Spec {
            let result = self.execute(action).await;
            if !result.success {
                warn!("Halting chain after failed {}", action.kind);
            }
            return result;
        }

        let result = self.execute_unreported(action).await;
        if result.success {
            return result;
        }
        if !result.retryable {
            warn!("Halting chain: {} cannot be retried", action.kind);
            self.report_failure(&result, None);
            return result;
        }
        self.recover(action, result).await
    }

    async fn recover(&self, action: &mut Action, failed: ActionResult) -> ActionResult {
        let snapshot = action.clone();
        let last_attempt: Mutex<Option<ActionResult>> = Mutex::new(None);

        let outcome = self
            .recovery
            .attempt_recovery(
                || {
                    let attempt = snapshot.clone();
                    let last_attempt = &last_attempt;
                    async move {
                        let result = self.dispatch_guarded(&attempt).await;
                        *last_attempt.lock().unwrap_or_else(PoisonError::into_inner) =
                            Some(result.clone());
                        result
                    }
                },
                &snapshot,
                &self.recovery_options,
            )
            .await;

        let mut result = last_attempt
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or(failed);

        if outcome.recovered {
            info!("{} recovered after {} attempt(s)", action.kind, outcome.attempts);
            action.status = ActionStatus::Completed;
            result.action.status = ActionStatus::Completed;
            if let Some(hooks) = &self.hooks {
                hooks.on_action_complete(&result);
            }
            return result;
        }

        warn!(
            "Recovery exhausted for {} (rolled back: {:?})",
            action.kind, outcome.rolled_back
        );
        action.status = ActionStatus::Error;
        result.action.status = ActionStatus::Error;
        if let Some(final_error) = &outcome.final_error {
            result.error = Some(final_error.clone());
        }
        result.data = Some(json!({ "recovery": &outcome }));
        self.report_failure(&result, Some(&outcome));
        result
    }

    async fn request_approval(&self, action: &Action) -> Approval {
        let Some(hooks) = &self.hooks else {
            warn!("No approval handler registered, proceeding with {}", action.kind);
            return Approval::Unhandled;
        };

        info!("Waiting for approval: {}", action.kind);
        let approval = hooks.on_approval_required(action).await;
        if approval == Approval::Unhandled {
            warn!("Approval request for {} was not handled, proceeding", action.kind);
        }
        approval
    }

    /// Dispatches without letting handler errors or panics escape.
    async fn dispatch_guarded(&self, action: &Action) -> ActionResult {
        let outcome = AssertUnwindSafe(self.handlers.dispatch(action))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                let mut result = ActionResult::failed(action, err.to_string());
                if let Some(guidance) = err.guidance() {
                    result = result.with_output(guidance);
                }
                if !err.is_retryable() {
                    result = result.non_retryable();
                }
                result
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Handler for {} panicked: {}", action.kind, message);
                ActionResult::failed(action, format!("Handler panicked: {}", message))
            }
        }
    }

    fn report_failure(&self, result: &ActionResult, recovery: Option<&RecoveryResult>) {
        let Some(hooks) = &self.hooks else {
            return;
        };
        hooks.on_action_error(&ActionFailure {
            action: result.action.clone(),
            error: result.error.clone().unwrap_or_default(),
            retry_count: recovery.map_or(0, |r| r.attempts),
            search_results: recovery.and_then(|r| r.search_results.clone()),
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
