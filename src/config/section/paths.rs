//! `[paths]` section configuration.
//!
//! The three resource roots:
//!
//! ```toml
//! [paths]
//! raw = "raw"             # source inputs (authored assets)
//! compiled = "compiled"   # normal compilation outputs
//! packaged = "packaged"   # packaging outputs (shippable builds)
//! ```
//!
//! Relative paths are resolved against the config file's directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Resource root directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw (source) resource root.
    pub raw: PathBuf,

    /// Compiled resource root for normal requests.
    pub compiled: PathBuf,

    /// Compiled resource root for packaging requests.
    pub packaged: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw: PathBuf::from("raw"),
            compiled: PathBuf::from("compiled"),
            packaged: PathBuf::from("packaged"),
        }
    }
}
