//! # reflash-core
//!
//! Core library for script-driven flashing of Android devices.
//!
//! A flash script is a small line-oriented language: variable assignments,
//! comments, and command invocations like `FLASH(boot, boot.img)` that map
//! to vendor tool subprocesses (`fastboot`, `adb`, SP Flash Tool). This
//! crate parses scripts, maintains the variable environment, resolves
//! command names through a pluggable registry, and executes the resulting
//! instruction sequence with per-line error isolation.
//!
//! ## Modules
//!
//! - [`parser`] - Typed instructions from script lines, plus the argument tokenizer
//! - [`env`] - Variable environment with `$NAME` substitution
//! - [`registry`] - Name → handler dispatch table with dynamic declarations
//! - [`builtins`] - The built-in command set (flash, lock/unlock, reboot, ...)
//! - [`engine`] - Sequential script execution with an outcome trace
//! - [`tool`] - Subprocess invocation of the vendor tools, with timeouts
//! - [`config`] - Persistent settings in `~/.reflash/config.json`
//!
//! ## External Dependencies
//!
//! Running scripts for real requires the vendor tools to be installed:
//!
//! - **fastboot** / **adb** - Android platform-tools
//! - **SP Flash Tool** - only for `FLASH_MTK` on MediaTek devices
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reflash_core::engine::ScriptEngine;
//! use reflash_core::tool::ToolRunner;
//!
//! let script = "\
//! # flash a fresh boot image
//! IMG = boot.img
//! UNLOCK()
//! FLASH(boot, $IMG)
//! REBOOT()
//! ";
//!
//! let mut engine = ScriptEngine::new(Arc::new(ToolRunner::new("./flash_scripts")));
//! let report = engine.execute(script);
//! assert_eq!(report.outcomes.len(), 4);
//! ```

pub mod builtins;
pub mod config;
pub mod engine;
pub mod env;
pub mod parser;
pub mod registry;
pub mod tool;
