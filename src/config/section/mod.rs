//! Configuration section definitions.

mod compiler;
mod listen;
mod packaging;
mod paths;

pub use compiler::CompilerConfig;
pub use listen::ListenConfig;
pub use packaging::PackagingConfig;
pub use paths::PathsConfig;
