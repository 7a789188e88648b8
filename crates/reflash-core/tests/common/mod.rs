//! Shared test helpers for reflash-core integration tests.
//!
//! Provides a scriptable mock [`ToolContext`] that records every tool
//! invocation and answers with programmed outcomes, so engine tests never
//! touch real vendor tools.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reflash_core::engine::ScriptEngine;
use reflash_core::tool::{Tool, ToolContext, ToolError, ToolOutput};

/// What the mock should do for one tool invocation, consumed in order.
/// Once the list is exhausted, every further invocation succeeds.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Exit status zero.
    Succeed,
    /// Exit status non-zero (stderr carries the given message).
    Fail(&'static str),
    /// The binary could not be launched.
    SpawnError,
}

/// Recording mock for [`ToolContext`].
pub struct MockTools {
    dir: PathBuf,
    behaviors: Mutex<Vec<MockBehavior>>,
    calls: Mutex<Vec<(Tool, Vec<String>)>>,
    slept: Mutex<Vec<Duration>>,
}

impl MockTools {
    pub fn new() -> Self {
        Self::with_behaviors(Vec::new())
    }

    pub fn with_behaviors(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            dir: fixtures_dir(),
            behaviors: Mutex::new(behaviors),
            calls: Mutex::new(Vec::new()),
            slept: Mutex::new(Vec::new()),
        }
    }

    /// Every recorded invocation, in order.
    pub fn calls(&self) -> Vec<(Tool, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Every recorded sleep, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl ToolContext for MockTools {
    fn run_tool(&self, tool: Tool, args: &[String]) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push((tool, args.to_vec()));
        let behavior = {
            let mut behaviors = self.behaviors.lock().unwrap();
            if behaviors.is_empty() {
                MockBehavior::Succeed
            } else {
                behaviors.remove(0)
            }
        };
        match behavior {
            MockBehavior::Succeed => Ok(ToolOutput {
                success: true,
                stdout: "OKAY".to_string(),
                stderr: String::new(),
            }),
            MockBehavior::Fail(message) => Ok(ToolOutput {
                success: false,
                stdout: String::new(),
                stderr: message.to_string(),
            }),
            MockBehavior::SpawnError => Err(ToolError::Spawn {
                tool: tool.binary_name(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such binary"),
            }),
        }
    }

    fn script_dir(&self) -> &Path {
        &self.dir
    }

    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Path to the shared fixture directory (contains `boot.img` etc).
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Engine wired to a fresh mock; returns both so tests can inspect calls.
pub fn mock_engine(behaviors: Vec<MockBehavior>) -> (ScriptEngine, Arc<MockTools>) {
    let tools = Arc::new(MockTools::with_behaviors(behaviors));
    let engine = ScriptEngine::new(tools.clone());
    (engine, tools)
}
