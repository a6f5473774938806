//! Packaging: dependency expansion and session state.
//!
//! Packaging turns a seed list of maps into the transitive closure of
//! runtime install dependencies, then batch-compiles every entry into the
//! packaged output root. The four-stage controller lives in
//! [`PackagingSession`]; the dispatcher drives its transitions on each tick.

use crossbeam::channel::{self, Receiver};
use rustc_hash::FxHashSet;
use std::sync::Arc;

use super::context::ServerContext;
use super::request::CompilationRequest;
use crate::resource::ResourceId;
use crate::worker::{TaskHandle, WorkerPool};

// ============================================================================
// Stage
// ============================================================================

/// Packaging stage: `None → Preparing → Packaging → Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackagingStage {
    #[default]
    None,
    /// Dependency expansion task is running.
    Preparing,
    /// Package-origin requests are compiling.
    Packaging,
    Complete,
}

// ============================================================================
// Packaging task
// ============================================================================

/// Single-shot dependency-expansion task running on the worker pool.
pub(crate) struct PackagingTask {
    handle: TaskHandle,
    result: Receiver<Vec<ResourceId>>,
}

impl PackagingTask {
    pub fn spawn(
        pool: &WorkerPool,
        ctx: Arc<ServerContext>,
        base: Vec<ResourceId>,
        maps: Vec<ResourceId>,
    ) -> Self {
        let (tx, rx) = channel::bounded(1);
        let handle = pool.schedule(move || {
            // Partial lists from an aborted expansion are never published
            if let Some(deps) = collect_runtime_dependencies(&ctx, &base, &maps) {
                let _ = tx.send(deps);
            }
        });

        Self { handle, result: rx }
    }

    pub fn is_complete(&self) -> bool {
        self.handle.is_complete()
    }

    /// The runtime-dependency list, once published.
    pub fn take_result(&self) -> Option<Vec<ResourceId>> {
        self.result.try_recv().ok()
    }
}

/// Expand seeds into the full runtime-dependency list.
///
/// The list starts with the statically required `base` resources, then each
/// seed map is expanded depth-first through its compiler's install
/// dependencies. Set semantics over an ordered sequence: first occurrence
/// wins. Returns `None` when aborted by shutdown.
pub(crate) fn collect_runtime_dependencies(
    ctx: &ServerContext,
    base: &[ResourceId],
    maps: &[ResourceId],
) -> Option<Vec<ResourceId>> {
    let mut deps: Vec<ResourceId> = base.to_vec();
    let mut visited: FxHashSet<ResourceId> = deps.iter().cloned().collect();

    for map in maps {
        if !visit(ctx, map, &mut deps, &mut visited) {
            return None;
        }
    }
    Some(deps)
}

fn visit(
    ctx: &ServerContext,
    id: &ResourceId,
    deps: &mut Vec<ResourceId>,
    visited: &mut FxHashSet<ResourceId>,
) -> bool {
    if ctx.is_exiting() {
        return false;
    }

    // Not a compilable resource: skip it and do not expand children
    let Some(type_id) = id.type_id() else {
        return true;
    };
    let Some(compiler) = ctx.compiler_registry.compiler_for(type_id) else {
        return true;
    };

    // Visit-before-recurse keeps cyclic dependency graphs terminating
    if !visited.insert(id.clone()) {
        return true;
    }
    deps.push(id.clone());

    for dep in compiler.install_dependencies(id) {
        if !visit(ctx, &dep, deps, visited) {
            return false;
        }
    }
    true
}

// ============================================================================
// Session
// ============================================================================

/// Packaging session state owned by the dispatcher.
pub(crate) struct PackagingSession {
    pub stage: PackagingStage,
    /// Seed maps; mutable only while no session is active.
    pub maps: Vec<ResourceId>,
    /// Package-origin requests of the running session.
    pub requests: Vec<Arc<CompilationRequest>>,
    /// Dependency-expansion task, while Preparing.
    pub task: Option<PackagingTask>,
}

impl PackagingSession {
    pub fn new() -> Self {
        Self {
            stage: PackagingStage::None,
            maps: Vec::new(),
            requests: Vec::new(),
            task: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.stage,
            PackagingStage::Preparing | PackagingStage::Packaging
        )
    }

    pub fn can_start(&self) -> bool {
        matches!(
            self.stage,
            PackagingStage::None | PackagingStage::Complete
        ) && !self.maps.is_empty()
    }

    /// Add a seed map (unique insertion).
    ///
    /// Only map resources may seed packaging, and only between sessions.
    pub fn add_map(&mut self, id: ResourceId) {
        assert!(id.is_map(), "packaging seeds must be map resources");
        assert!(!self.is_active(), "seed list is frozen while packaging");

        if !self.maps.contains(&id) {
            self.maps.push(id);
        }
    }

    pub fn remove_map(&mut self, id: &ResourceId) {
        assert!(id.is_map(), "packaging seeds must be map resources");
        assert!(!self.is_active(), "seed list is frozen while packaging");

        if let Some(pos) = self.maps.iter().position(|m| m == id) {
            self.maps.swap_remove(pos);
        }
    }

    /// Progress signal for UI: 1.0 when idle or done, 0.1 while expanding,
    /// request completion ratio while compiling.
    pub fn progress(&self) -> f32 {
        match self.stage {
            PackagingStage::None | PackagingStage::Complete => 1.0,
            PackagingStage::Preparing => 0.1,
            PackagingStage::Packaging => {
                let total = self.requests.len().max(1) as f32;
                let complete = self.requests.iter().filter(|r| r.is_complete()).count() as f32;
                0.05 + 0.95 * (complete / total)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
