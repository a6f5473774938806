//! Shared server context.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::resource::CompilerRegistry;

/// Immutable-after-init snapshot shared with every task.
///
/// The one exception is `is_exiting`: written once by the dispatcher during
/// shutdown, read freely by workers.
pub struct ServerContext {
    /// Raw (source) resource root.
    pub raw_resource_root: PathBuf,
    /// Compiled resource root for normal requests.
    pub compiled_resource_root: PathBuf,
    /// Compiled resource root for packaging requests.
    pub packaged_resource_root: PathBuf,
    /// External compiler executable.
    pub compiler_executable: PathBuf,
    /// Per-type compiler knowledge.
    pub compiler_registry: Arc<CompilerRegistry>,

    is_exiting: AtomicBool,
}

impl ServerContext {
    pub fn new(
        raw_resource_root: PathBuf,
        compiled_resource_root: PathBuf,
        packaged_resource_root: PathBuf,
        compiler_executable: PathBuf,
        compiler_registry: Arc<CompilerRegistry>,
    ) -> Self {
        Self {
            raw_resource_root,
            compiled_resource_root,
            packaged_resource_root,
            compiler_executable,
            compiler_registry,
            is_exiting: AtomicBool::new(false),
        }
    }

    /// True once shutdown has begun. Tasks poll this at their earliest
    /// decision point and short-circuit.
    pub fn is_exiting(&self) -> bool {
        self.is_exiting.load(Ordering::SeqCst)
    }

    /// Monotonic: once set, never cleared.
    pub fn begin_exit(&self) {
        self.is_exiting.store(true, Ordering::SeqCst);
    }
}
