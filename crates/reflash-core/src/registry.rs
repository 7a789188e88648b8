//! Command registry: name → handler dispatch table.
//!
//! Command names are case-insensitive; keys are stored upper-case by
//! construction. The registry is populated once, before a script runs, from
//! the built-in command set plus optional dynamic declarations, and is not
//! mutated during execution.
//!
//! # Dynamic declarations
//!
//! An external declaration list registers additional commands line by line:
//!
//! ```text
//! # alias defaults to the upper-cased function name
//! system:devices
//! # explicit alias
//! unlock:unlock_device:FORCE_UNLOCK
//! ```
//!
//! Declarations resolve against a [`HandlerSource`]. Malformed lines and
//! unresolvable entries are logged and skipped; registration failures are
//! never fatal to the overall load. A script invoking a name that failed to
//! register simply hits the ordinary unknown-command path.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::tool::{ToolContext, ToolError};

/// Errors a handler can raise, distinct from ordinary `Ok(false)` failure.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The tokenized argument list does not match the handler's contract.
    #[error("expected {expected} argument(s), got {got}")]
    Arity {
        /// Human-readable description of the expected count (e.g. "2" or "0 to 1").
        expected: &'static str,
        /// Number of arguments actually supplied.
        got: usize,
    },

    /// The handler hit an unexpected fault (e.g. a malformed numeric argument).
    #[error("{0}")]
    Fault(String),

    /// Launching the external tool failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// A registered operation bound to a command name.
///
/// Handlers receive the executing context and the tokenized argument list,
/// and return `Ok(true)` on success, `Ok(false)` when the underlying
/// operation reported failure, or a [`HandlerError`] for contract violations
/// and unexpected faults.
pub type Handler = Arc<dyn Fn(&dyn ToolContext, &[String]) -> Result<bool, HandlerError> + Send + Sync>;

/// Resolves `(module, function)` pairs from dynamic declarations to handlers.
///
/// This replaces ad-hoc module loading with an explicit seam: any collection
/// of handlers can be exposed to declaration files by implementing this
/// trait. The built-in set is available as
/// [`BuiltinModules`](crate::builtins::BuiltinModules).
pub trait HandlerSource {
    /// Returns the handler for `module:function`, or `None` if unknown.
    fn resolve(&self, module: &str, function: &str) -> Option<Handler>;
}

/// Mapping from upper-cased command name to handler.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Handler>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, upper-casing the name. Existing entries are
    /// overwritten unconditionally.
    pub fn register(&mut self, name: &str, handler: Handler) {
        self.handlers.insert(name.to_uppercase(), handler);
    }

    /// Looks up a handler by name, case-insensitively.
    pub fn resolve(&self, name: &str) -> Option<Handler> {
        self.handlers.get(&name.to_uppercase()).cloned()
    }

    /// True if a command with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_uppercase())
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Loads dynamic command declarations from a line-oriented list.
    ///
    /// Each non-blank, non-comment line is `module:function` (alias defaults
    /// to the upper-cased function name) or `module:function:alias`. Any
    /// other colon count is a malformed declaration: it is logged and
    /// skipped, as is any entry the source cannot resolve. Returns the number
    /// of commands actually registered.
    pub fn load_declarations(&mut self, text: &str, source: &dyn HandlerSource) -> usize {
        let mut registered = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split(':').collect();
            let (module, function, alias) = match parts.as_slice() {
                [module, function] => (*module, *function, function.to_uppercase()),
                [module, function, alias] => (*module, *function, (*alias).to_string()),
                _ => {
                    warn!(
                        line = idx + 1,
                        declaration = line,
                        "malformed command declaration, expected module:function[:alias]"
                    );
                    continue;
                }
            };

            match source.resolve(module, function) {
                Some(handler) => {
                    debug!(module, function, alias = %alias, "registered dynamic command");
                    self.register(&alias, handler);
                    registered += 1;
                }
                None => {
                    warn!(
                        line = idx + 1,
                        module, function, "unknown module or function in command declaration"
                    );
                }
            }
        }

        registered
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}
