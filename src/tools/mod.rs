//! Tool-call dispatch: correlated, asynchronous execution of bound actions.
//!
//! The remote model asks for named external actions by id; each dispatched id
//! gets exactly one correlated response, produced by a spawned task so a
//! slow action never blocks the inbound message loop. An unanswered id would
//! stall the remote conversation indefinitely, so only calls for names the
//! engine was never told about are dropped.

use crate::error::ToolError;
use crate::live::messages::{FunctionCall, FunctionResponse, ToolDeclaration};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// An external action the model may invoke by name.
///
/// Implementations are injected at engine construction; the engine is
/// agnostic to what the action does.
#[async_trait]
pub trait ToolAction: Send + Sync {
    /// Argument keys that must be present. Calls missing one are answered
    /// with an error response instead of reaching `invoke`.
    fn required_args(&self) -> &[&str] {
        &[]
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// What to report to the model when a bound action fails.
///
/// Some deployments prefer telling the model the action succeeded so it does
/// not apologize out loud; the default reports the failure honestly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolFailurePolicy {
    #[default]
    ReportError,
    ReportSuccess,
}

struct ToolEntry {
    declaration: ToolDeclaration,
    action: Arc<dyn ToolAction>,
}

/// The set of tools offered to the model, configured once at construction.
#[derive(Default)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an action under its declared name. Re-registering a name
    /// replaces the previous binding.
    pub fn register(&mut self, declaration: ToolDeclaration, action: Arc<dyn ToolAction>) {
        self.entries.insert(
            declaration.name.clone(),
            ToolEntry {
                declaration,
                action,
            },
        );
    }

    /// Declarations to advertise in the session setup.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.entries
            .values()
            .map(|entry| entry.declaration.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn action(&self, name: &str) -> Option<Arc<dyn ToolAction>> {
        self.entries.get(name).map(|entry| Arc::clone(&entry.action))
    }
}

/// A settled invocation: the correlated response plus whether the underlying
/// action actually succeeded (the response body may say otherwise under
/// `ReportSuccess`).
#[derive(Debug)]
pub struct ToolOutcome {
    pub response: FunctionResponse,
    pub success: bool,
}

/// Runs tool calls for one session and reports settled outcomes.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    policy: ToolFailurePolicy,
    outstanding: Arc<AtomicUsize>,
    outcomes: mpsc::UnboundedSender<ToolOutcome>,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy: ToolFailurePolicy,
        outcomes: mpsc::UnboundedSender<ToolOutcome>,
    ) -> Self {
        Self {
            registry,
            policy,
            outstanding: Arc::new(AtomicUsize::new(0)),
            outcomes,
        }
    }

    /// Resolve a call to its bound action and run it as an independent task.
    ///
    /// Unknown names are dropped with a warning (the remote service must not
    /// depend on dispatch for names it was never offered). A registered name
    /// with missing required arguments is answered immediately with an error
    /// so the id never goes unanswered.
    pub fn dispatch(&self, call: FunctionCall) {
        let Some(action) = self.registry.action(&call.name) else {
            warn!(
                "tools: no action bound for {:?}, dropping call {}",
                call.name, call.id
            );
            return;
        };

        if let Some(missing) = action
            .required_args()
            .iter()
            .find(|key| call.args.get(**key).is_none())
        {
            warn!(
                "tools: call {} for {:?} is missing required argument {missing:?}",
                call.id, call.name
            );
            let _ = self.outcomes.send(ToolOutcome {
                response: FunctionResponse {
                    id: call.id,
                    name: call.name,
                    response: serde_json::json!({
                        "status": "error",
                        "detail": format!("missing required argument `{missing}`"),
                    }),
                },
                success: false,
            });
            return;
        }

        let outstanding = Arc::clone(&self.outstanding);
        let outcomes = self.outcomes.clone();
        let policy = self.policy;
        outstanding.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let FunctionCall { id, name, args } = call;
            debug!("tools: invoking {name:?} for call {id}");

            let (response, success) = match action.invoke(args).await {
                Ok(payload) => (
                    serde_json::json!({ "status": "success", "payload": payload }),
                    true,
                ),
                Err(err) => {
                    warn!("tools: action {name:?} failed for call {id}: {err}");
                    let body = match policy {
                        ToolFailurePolicy::ReportError => {
                            serde_json::json!({ "status": "error" })
                        }
                        ToolFailurePolicy::ReportSuccess => {
                            serde_json::json!({ "status": "success" })
                        }
                    };
                    (body, false)
                }
            };

            // The action has settled; drop it from the outstanding count
            // before the outcome is observed.
            outstanding.fetch_sub(1, Ordering::SeqCst);

            let _ = outcomes.send(ToolOutcome {
                response: FunctionResponse { id, name, response },
                success,
            });
        });
    }

    /// True while at least one dispatched action has not settled.
    pub fn processing(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) > 0
    }
}
