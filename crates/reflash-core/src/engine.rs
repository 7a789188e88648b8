//! Script execution engine.
//!
//! The engine owns the variable [`Environment`] and the [`CommandRegistry`]
//! (no process-wide state) and executes a script in a single synchronous
//! pass: parse each line, update the environment or dispatch to a handler,
//! record a per-line outcome. Failures are isolated to their line; execution
//! always continues so that partial flashing progress stays visible to the
//! operator. The overall run succeeds only if every non-skipped line did.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reflash_core::engine::ScriptEngine;
//! use reflash_core::tool::ToolRunner;
//!
//! let runner = ToolRunner::new("./flash_scripts");
//! let mut engine = ScriptEngine::new(Arc::new(runner));
//! let report = engine.execute("DEVICE = angler\nFLASH(boot, boot.img)\n");
//! for outcome in &report.outcomes {
//!     println!("[line {}] {}", outcome.line, outcome.summary);
//! }
//! std::process::exit(if report.success { 0 } else { 1 });
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::builtins;
use crate::env::Environment;
use crate::parser::{self, Instruction};
use crate::registry::{CommandRegistry, HandlerError};
use crate::tool::ToolContext;

/// Right-hand sides of `DEBUG = ...` that enable verbose diagnostics.
const DEBUG_TRUTHY: &[&str] = &["TRUE", "1", "ON", "YES"];

/// Why a line failed. Lets callers branch on kind rather than message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The line matched no instruction shape.
    Unrecognized,
    /// The invoked command name is not in the registry.
    UnknownCommand,
    /// The handler was given the wrong number of arguments.
    ArityMismatch,
    /// The handler ran and reported failure (tool exited non-zero, missing
    /// file, timeout).
    HandlerFailed,
    /// The handler raised an unexpected fault (malformed argument, tool
    /// failed to launch).
    HandlerFault,
}

#[derive(Debug, Error)]
enum LineError {
    #[error("unknown command")]
    Unrecognized,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("expected {expected} argument(s), got {got}")]
    ArityMismatch { expected: &'static str, got: usize },
    #[error("command reported failure")]
    HandlerFailed,
    #[error("{0}")]
    HandlerFault(String),
}

impl LineError {
    fn kind(&self) -> FailureKind {
        match self {
            LineError::Unrecognized => FailureKind::Unrecognized,
            LineError::UnknownCommand(_) => FailureKind::UnknownCommand,
            LineError::ArityMismatch { .. } => FailureKind::ArityMismatch,
            LineError::HandlerFailed => FailureKind::HandlerFailed,
            LineError::HandlerFault(_) => FailureKind::HandlerFault,
        }
    }
}

/// Result of one executed line. Skipped lines never appear in the trace.
#[derive(Debug, Clone, Serialize)]
pub enum LineResult {
    /// The line succeeded.
    Success,
    /// The line failed.
    Failure {
        /// Failure category.
        kind: FailureKind,
        /// Human-readable detail.
        detail: String,
    },
}

impl LineResult {
    /// True for [`LineResult::Success`].
    pub fn succeeded(&self) -> bool {
        matches!(self, LineResult::Success)
    }
}

/// One entry in the per-line outcome trace.
#[derive(Debug, Clone, Serialize)]
pub struct LineOutcome {
    /// Unique identifier for this trace entry.
    pub id: Uuid,
    /// When the line finished executing.
    pub timestamp: DateTime<Utc>,
    /// 1-indexed line number in the script.
    pub line: usize,
    /// What was attempted, e.g. `FLASH(boot, boot.img)` or `DEVICE = angler`.
    pub summary: String,
    /// What happened.
    pub result: LineResult,
}

impl LineOutcome {
    fn new(line: usize, summary: String, result: LineResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            line,
            summary,
            result,
        }
    }
}

/// Aggregate result of running one script.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptReport {
    /// True only if every executed (non-skipped) line succeeded.
    pub success: bool,
    /// Per-line outcomes in script order.
    pub outcomes: Vec<LineOutcome>,
}

impl ScriptReport {
    /// Outcomes that failed, in script order.
    pub fn failures(&self) -> impl Iterator<Item = &LineOutcome> {
        self.outcomes.iter().filter(|o| !o.result.succeeded())
    }
}

/// Executes flash scripts against a [`ToolContext`].
///
/// The engine is reusable across scripts: the registry persists (so
/// dynamically loaded commands stay registered), while the variable
/// environment is reset at the start of each execution.
pub struct ScriptEngine {
    env: Environment,
    registry: CommandRegistry,
    context: Arc<dyn ToolContext>,
    debug: bool,
}

impl ScriptEngine {
    /// Creates an engine with the built-in command set registered.
    pub fn new(context: Arc<dyn ToolContext>) -> Self {
        let mut registry = CommandRegistry::new();
        builtins::register_builtins(&mut registry);
        Self::with_registry(context, registry)
    }

    /// Creates an engine with a caller-assembled registry.
    pub fn with_registry(context: Arc<dyn ToolContext>, registry: CommandRegistry) -> Self {
        Self {
            env: Environment::new(),
            registry,
            context,
            debug: false,
        }
    }

    /// The command registry, for dynamic registration before a run.
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    /// The command registry.
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// The variable environment as of the last execution.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// True if the last executed script enabled verbose diagnostics.
    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Executes a script, one line at a time, in order.
    ///
    /// Never aborts mid-script: every failure is recorded and execution moves
    /// to the next line.
    pub fn execute(&mut self, script: &str) -> ScriptReport {
        self.env = Environment::new();
        self.debug = scan_debug_toggle(script);
        if self.debug {
            info!("verbose diagnostics enabled by DEBUG assignment");
        }

        let mut outcomes = Vec::new();
        let mut success = true;

        for (idx, raw) in script.lines().enumerate() {
            let line_no = idx + 1;
            match parser::parse_line(raw) {
                Instruction::Skip => continue,

                Instruction::Assign { name, raw_value } => {
                    // Stored verbatim; substitution happens only when the
                    // value is later consumed inside an invocation.
                    debug!(line = line_no, name = %name, value = %raw_value, "set variable");
                    let summary = format!("{name} = {raw_value}");
                    self.env.set(name, raw_value);
                    outcomes.push(LineOutcome::new(line_no, summary, LineResult::Success));
                }

                Instruction::Invoke { command, raw_args } => {
                    // Substitute on the raw text, then tokenize: boundaries
                    // are computed post-substitution, so a variable value
                    // containing a comma splits into extra arguments.
                    let args = parser::tokenize_args(&self.env.substitute(&raw_args));
                    let summary = format!("{}({})", command, args.join(", "));

                    let span = info_span!("line", number = line_no, command = %command);
                    let _guard = span.enter();

                    let result = match self.dispatch(&command, &args) {
                        Ok(()) => {
                            if self.debug {
                                info!(line = line_no, summary = %summary, "line succeeded");
                            }
                            LineResult::Success
                        }
                        Err(err) => {
                            warn!(line = line_no, summary = %summary, error = %err, "line failed");
                            success = false;
                            LineResult::Failure {
                                kind: err.kind(),
                                detail: err.to_string(),
                            }
                        }
                    };
                    outcomes.push(LineOutcome::new(line_no, summary, result));
                }

                Instruction::Unrecognized { line } => {
                    warn!(line = line_no, text = %line, "unknown command");
                    success = false;
                    outcomes.push(LineOutcome::new(
                        line_no,
                        line,
                        LineResult::Failure {
                            kind: FailureKind::Unrecognized,
                            detail: LineError::Unrecognized.to_string(),
                        },
                    ));
                }
            }
        }

        ScriptReport { success, outcomes }
    }

    fn dispatch(&self, command: &str, args: &[String]) -> Result<(), LineError> {
        let handler = self
            .registry
            .resolve(command)
            .ok_or_else(|| LineError::UnknownCommand(command.to_string()))?;

        match handler(self.context.as_ref(), args) {
            Ok(true) => Ok(()),
            Ok(false) => Err(LineError::HandlerFailed),
            Err(HandlerError::Arity { expected, got }) => {
                Err(LineError::ArityMismatch { expected, got })
            }
            Err(err) => Err(LineError::HandlerFault(err.to_string())),
        }
    }
}

/// Pre-scans the script for a `DEBUG = <truthy>` assignment.
///
/// A pure verbosity toggle: it changes what gets logged, never control flow
/// or results. The assignment itself still executes as a normal line.
fn scan_debug_toggle(script: &str) -> bool {
    script.lines().any(|line| {
        matches!(
            parser::parse_line(line),
            Instruction::Assign { name, raw_value }
                if name == "DEBUG"
                    && DEBUG_TRUTHY
                        .iter()
                        .any(|t| raw_value.eq_ignore_ascii_case(t))
        )
    })
}
