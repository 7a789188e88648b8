//! Invocation of external flashing tools.
//!
//! This module defines the [`ToolContext`] trait, the capability handed to
//! command handlers for running vendor tools (`fastboot`, `adb`, SP Flash
//! Tool) as subprocesses, plus the production implementation [`ToolRunner`].
//!
//! Every invocation is synchronous and bounded by a timeout. A timed-out
//! invocation is killed and reported as an ordinary failed outcome, never as
//! a fatal error: the script engine treats it like any other failed line.
//!
//! # Example
//!
//! ```no_run
//! use reflash_core::tool::{Tool, ToolContext, ToolRunner};
//!
//! let runner = ToolRunner::new("./flash_scripts");
//! let output = runner
//!     .run_tool(Tool::Fastboot, &["devices".to_string()])
//!     .unwrap();
//! println!("success={} stdout={}", output.success, output.stdout);
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ReflashConfig;

/// The external tools a handler can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Android `fastboot`.
    Fastboot,
    /// Android `adb`.
    Adb,
    /// MediaTek SP Flash Tool.
    SpFlashTool,
}

impl Tool {
    /// Default binary name, resolved via `PATH` unless overridden in config.
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::Fastboot => "fastboot",
            Tool::Adb => "adb",
            Tool::SpFlashTool => "spflashtool",
        }
    }
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// True if the tool exited with status zero.
    pub success: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error. For a timed-out invocation this carries a
    /// synthesized "timed out" message.
    pub stderr: String,
}

/// Errors raised while trying to execute a tool.
///
/// Exit-status failures and timeouts are *not* errors; they come back as a
/// [`ToolOutput`] with `success == false`.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool binary could not be launched at all.
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        /// Binary that failed to start.
        tool: &'static str,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred while waiting on the child process.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The executing context handed to command handlers.
///
/// Handlers use it to run external tools, resolve files relative to the
/// script directory, and sleep for `WAIT`. Tests substitute a mock.
pub trait ToolContext: Send + Sync {
    /// Runs a tool with the given arguments, capturing output.
    fn run_tool(&self, tool: Tool, args: &[String]) -> Result<ToolOutput, ToolError>;

    /// Directory that relative file arguments are resolved against.
    fn script_dir(&self) -> &Path;

    /// Sleeps for the given duration (`WAIT` command).
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Production [`ToolContext`] that spawns real subprocesses.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    script_dir: PathBuf,
    timeout: Duration,
    fastboot: PathBuf,
    adb: PathBuf,
    spflashtool: PathBuf,
}

impl ToolRunner {
    /// Default per-invocation timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Creates a runner with default binary names and timeout.
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_dir: script_dir.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            fastboot: PathBuf::from(Tool::Fastboot.binary_name()),
            adb: PathBuf::from(Tool::Adb.binary_name()),
            spflashtool: PathBuf::from(Tool::SpFlashTool.binary_name()),
        }
    }

    /// Creates a runner applying binary-path and timeout overrides from config.
    pub fn from_config(script_dir: impl Into<PathBuf>, config: &ReflashConfig) -> Self {
        let mut runner = Self::new(script_dir);
        if let Some(path) = &config.fastboot {
            runner.fastboot = path.clone();
        }
        if let Some(path) = &config.adb {
            runner.adb = path.clone();
        }
        if let Some(path) = &config.spflashtool {
            runner.spflashtool = path.clone();
        }
        if let Some(secs) = config.timeout_secs {
            runner.timeout = Duration::from_secs(secs);
        }
        runner
    }

    /// Overrides the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the binary used for one tool.
    pub fn with_binary(mut self, tool: Tool, path: impl Into<PathBuf>) -> Self {
        match tool {
            Tool::Fastboot => self.fastboot = path.into(),
            Tool::Adb => self.adb = path.into(),
            Tool::SpFlashTool => self.spflashtool = path.into(),
        }
        self
    }

    fn binary(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Fastboot => &self.fastboot,
            Tool::Adb => &self.adb,
            Tool::SpFlashTool => &self.spflashtool,
        }
    }

    /// Checks that a tool can be launched at all (`<tool> --version`).
    pub fn probe(&self, tool: Tool) -> bool {
        Command::new(self.binary(tool))
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Drains a child pipe to a string on a background thread so that a chatty
/// tool cannot deadlock the timeout loop on a full pipe buffer.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

impl ToolContext for ToolRunner {
    fn run_tool(&self, tool: Tool, args: &[String]) -> Result<ToolOutput, ToolError> {
        info!(tool = tool.binary_name(), args = ?args, "running external tool");

        let mut child = Command::new(self.binary(tool))
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: tool.binary_name(),
                source,
            })?;

        let stdout_handle = drain(child.stdout.take());
        let stderr_handle = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break Some(status),
                None if Instant::now() >= deadline => {
                    warn!(
                        tool = tool.binary_name(),
                        timeout_secs = self.timeout.as_secs(),
                        "tool invocation timed out, killing"
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                None => std::thread::sleep(Duration::from_millis(25)),
            }
        };

        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();

        match status {
            Some(status) => {
                let success = status.success();
                if success {
                    debug!(stdout = stdout.trim(), "tool succeeded");
                } else {
                    warn!(stderr = stderr.trim(), "tool reported failure");
                }
                Ok(ToolOutput {
                    success,
                    stdout,
                    stderr,
                })
            }
            None => Ok(ToolOutput {
                success: false,
                stdout,
                stderr: format!(
                    "{} timed out after {}s",
                    tool.binary_name(),
                    self.timeout.as_secs()
                ),
            }),
        }
    }

    fn script_dir(&self) -> &Path {
        &self.script_dir
    }
}
