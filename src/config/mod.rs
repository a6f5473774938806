//! Server configuration management for `foundry.toml`.
//!
//! # Sections
//!
//! | Section       | Purpose                                             |
//! |---------------|-----------------------------------------------------|
//! | `[paths]`     | Raw, compiled and packaged resource roots           |
//! | `[server]`    | Listening interface and port                        |
//! | `[compiler]`  | Compiler executable and compilable resource types   |
//! | `[packaging]` | Statically required engine/game resources           |
//!
//! Configuration is read once at startup; there is no runtime
//! reconfiguration.

pub mod section;

pub use section::{CompilerConfig, ListenConfig, PackagingConfig, PathsConfig};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing foundry.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Resource root directories
    pub paths: PathsConfig,

    /// Network listener settings
    pub server: ListenConfig,

    /// External compiler settings
    pub compiler: CompilerConfig,

    /// Packaging settings
    pub packaging: PackagingConfig,
}

impl ServerConfig {
    /// Load configuration from the given file.
    ///
    /// Relative paths in the config are resolved against the config file's
    /// parent directory.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file `{}`", path.display()))?;

        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse `{}`", path.display()))?;

        config.config_path = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        config.root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.resolve_paths();

        Ok(config)
    }

    /// Resolve relative paths against the project root.
    fn resolve_paths(&mut self) {
        let root = self.root.clone();
        for path in [
            &mut self.paths.raw,
            &mut self.paths.compiled,
            &mut self.paths.packaged,
            &mut self.compiler.executable,
        ] {
            if path.is_relative() {
                *path = root.join(&path);
            }
        }
    }
}

// ============================================================================
// Test helpers
// ============================================================================

/// Parse a config from a TOML string, without path resolution.
#[cfg(test)]
pub(crate) fn test_parse_config(raw: &str) -> ServerConfig {
    toml::from_str(raw).expect("test config should parse")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("foundry.toml");
        fs::write(
            &config_path,
            "[paths]\nraw = \"assets/raw\"\n\n[compiler]\nexecutable = \"bin/rc\"\n",
        )
        .unwrap();

        let config = ServerConfig::load(&config_path).unwrap();
        let root = config.root.clone();

        assert_eq!(config.paths.raw, root.join("assets/raw"));
        assert_eq!(config.compiler.executable, root.join("bin/rc"));
        // Untouched sections fall back to defaults, still rooted
        assert_eq!(config.paths.compiled, root.join("compiled"));
    }

    #[test]
    fn test_load_keeps_absolute_paths() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("foundry.toml");
        fs::write(
            &config_path,
            "[paths]\nraw = \"/srv/assets/raw\"\n",
        )
        .unwrap();

        let config = ServerConfig::load(&config_path).unwrap();
        assert_eq!(config.paths.raw, PathBuf::from("/srv/assets/raw"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ServerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("foundry.toml");
        fs::write(&config_path, "[paths\nbroken").unwrap();

        assert!(ServerConfig::load(&config_path).is_err());
    }
}
