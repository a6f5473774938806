//! `[packaging]` section configuration.
//!
//! ```toml
//! [packaging]
//! required_resources = [
//!     "data://engine/defaults.mtrl",
//!     "data://game/loading.tex",
//! ]
//! ```
//!
//! `required_resources` lists the resources the engine and game always need
//! at runtime; every packaging session includes them before expanding the
//! seed maps.

use serde::{Deserialize, Serialize};

/// Packaging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagingConfig {
    /// Resources included in every packaged build, independent of the
    /// selected maps.
    pub required_resources: Vec<String>,
}
