//! `[compiler]` section configuration.
//!
//! ```toml
//! [compiler]
//! executable = "bin/resource-compiler"
//! resource_types = ["map", "anim", "tex", "mesh", "mtrl", "skel"]
//! ```
//!
//! `resource_types` lists the type tags (path extensions) the external
//! compiler can handle; the compiler registry is built from it at startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External compiler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Path to the resource compiler executable.
    pub executable: PathBuf,

    /// Resource type tags the compiler can handle (1-4 lowercase
    /// alphanumeric characters each).
    pub resource_types: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("resource-compiler"),
            resource_types: ["map", "anim", "tex", "mesh", "mtrl", "skel"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::config::test_parse_config;

    #[test]
    fn test_compiler_config() {
        let config = test_parse_config(
            "[compiler]\nexecutable = \"rc\"\nresource_types = [\"map\", \"anim\"]",
        );

        assert_eq!(config.compiler.executable, PathBuf::from("rc"));
        assert_eq!(config.compiler.resource_types, vec!["map", "anim"]);
    }

    #[test]
    fn test_compiler_config_defaults() {
        let config = test_parse_config("");

        assert_eq!(
            config.compiler.executable,
            PathBuf::from("resource-compiler")
        );
        assert!(config.compiler.resource_types.contains(&"map".to_string()));
    }
}
