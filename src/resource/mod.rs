//! Resource identity and compiler registry.
//!
//! # Module Structure
//!
//! - `path` - `ResourcePath`, the validated `data://` virtual path
//! - `id` - `ResourceTypeId` and `ResourceId`
//! - `compiler` - `ResourceCompiler` trait and `CompilerRegistry`

mod compiler;
mod id;
mod path;

pub use compiler::{CompilerRegistry, DescriptorCompiler, ResourceCompiler};
pub use id::{ResourceId, ResourceTypeId};
pub use path::{ResourcePath, SCHEME};
