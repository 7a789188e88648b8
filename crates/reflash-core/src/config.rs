//! Persistent configuration for reflash.
//!
//! Stores user settings in `~/.reflash/config.json`: overrides for the
//! vendor tool binaries (useful when platform-tools are not on `PATH`) and
//! the default tool-invocation timeout.
//!
//! # Example
//!
//! ```no_run
//! use reflash_core::config::ReflashConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = ReflashConfig::load();
//!
//! if let Some(path) = &config.fastboot {
//!     println!("fastboot override: {}", path.display());
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const CONFIG_FILENAME: &str = "config.json";

/// Returns the reflash state directory (`~/.reflash`), creating it if needed.
pub fn reflash_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".reflash");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Persistent reflash configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReflashConfig {
    /// Path to the `fastboot` binary, if not on `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastboot: Option<PathBuf>,

    /// Path to the `adb` binary, if not on `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adb: Option<PathBuf>,

    /// Path to the SP Flash Tool binary, if not on `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spflashtool: Option<PathBuf>,

    /// Default per-invocation timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ReflashConfig {
    /// Load config from `~/.reflash/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        let path = reflash_dir().join(CONFIG_FILENAME);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.reflash/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        let path = reflash_dir().join(CONFIG_FILENAME);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}
