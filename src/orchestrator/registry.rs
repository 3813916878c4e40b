//! Command and callback dispatch tables, per spec §4.5. Grounded in the
//! dispatch shape of `examples/original_source/ttskit/bot/unified_bot.py`
//! (`_setup_default_commands`/`_setup_default_callbacks`), re-expressed
//! with boxed async closures the way the teacher's `telegram/bot.rs`
//! dispatches `dptree` endpoints.

use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::orchestrator::Orchestrator;
use crate::telegram::InboundMessage;

pub type CommandFn =
    Arc<dyn Fn(Arc<Orchestrator>, InboundMessage) -> BoxFuture<'static, bool> + Send + Sync>;
pub type CallbackFn = Arc<
    dyn Fn(Arc<Orchestrator>, InboundMessage, String) -> BoxFuture<'static, bool> + Send + Sync,
>;

pub const DEFAULT_COMMANDS: &[&str] = &["start", "help", "status", "engines", "voices", "languages"];
pub const DEFAULT_ADMIN_COMMANDS: &[&str] =
    &["stats", "reset_stats", "clear_cache", "restart", "shutdown"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    NotHandled,
}

pub struct CommandRegistry {
    handlers: HashMap<String, CommandFn>,
    admin_only: HashSet<String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            admin_only: HashSet::new(),
        }
    }

    pub fn register(&mut self, name: &str, admin_only: bool, handler: CommandFn) {
        let key = name.to_lowercase();
        if admin_only {
            self.admin_only.insert(key.clone());
        }
        self.handlers.insert(key, handler);
    }

    /// §4.5 dispatch: normalize, gate on admin-only, invoke, else
    /// not-handled.
    pub async fn dispatch(
        &self,
        orchestrator: Arc<Orchestrator>,
        command: &str,
        is_sudo: bool,
        message: InboundMessage,
    ) -> DispatchOutcome {
        let key = command.to_lowercase();
        if self.admin_only.contains(&key) && !is_sudo {
            return DispatchOutcome::NotHandled;
        }
        let Some(handler) = self.handlers.get(&key) else {
            return DispatchOutcome::NotHandled;
        };
        if handler(orchestrator, message).await {
            DispatchOutcome::Handled
        } else {
            DispatchOutcome::NotHandled
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CallbackRegistry {
    handlers: HashMap<String, CallbackFn>,
    admin_only: HashSet<String>,
    /// Prefix-matched handlers, checked when no exact key matches. Stored
    /// as `(prefix, handler)`; the first matching prefix wins.
    prefix_handlers: Vec<(String, CallbackFn)>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            admin_only: HashSet::new(),
            prefix_handlers: Vec::new(),
        }
    }

    pub fn register(&mut self, key: &str, admin_only: bool, handler: CallbackFn) {
        if admin_only {
            self.admin_only.insert(key.to_string());
        }
        self.handlers.insert(key.to_string(), handler);
    }

    pub fn register_prefix(&mut self, prefix: &str, admin_only: bool, handler: CallbackFn) {
        if admin_only {
            self.admin_only.insert(prefix.to_string());
        }
        self.prefix_handlers.push((prefix.to_string(), handler));
    }

    pub async fn dispatch(
        &self,
        orchestrator: Arc<Orchestrator>,
        payload: &str,
        is_sudo: bool,
        message: InboundMessage,
    ) -> DispatchOutcome {
        if let Some(handler) = self.handlers.get(payload) {
            if self.admin_only.contains(payload) && !is_sudo {
                return DispatchOutcome::NotHandled;
            }
            return if handler(orchestrator, message, payload.to_string()).await {
                DispatchOutcome::Handled
            } else {
                DispatchOutcome::NotHandled
            };
        }

        for (prefix, handler) in &self.prefix_handlers {
            if payload.starts_with(prefix.as_str()) {
                if self.admin_only.contains(prefix) && !is_sudo {
                    return DispatchOutcome::NotHandled;
                }
                return if handler(orchestrator, message, payload.to_string()).await {
                    DispatchOutcome::Handled
                } else {
                    DispatchOutcome::NotHandled
                };
            }
        }

        DispatchOutcome::NotHandled
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
