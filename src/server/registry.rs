//! Request registry.
//!
//! Owns the lifetime of every in-flight and completed compilation request.
//! Invariant: every request with a non-terminal status has exactly one
//! active task driving it.

use std::sync::Arc;

use super::context::ServerContext;
use super::request::{CompilationRequest, RequestOrigin};
use super::task;
use crate::resource::ResourceId;
use crate::worker::{TaskHandle, WorkerPool};

struct ActiveTask {
    handle: TaskHandle,
    request: Arc<CompilationRequest>,
}

/// Registry of all requests plus the subset still backed by a running task.
pub struct RequestRegistry {
    /// Every request ever created, insertion-ordered, until cleanup.
    requests: Vec<Arc<CompilationRequest>>,
    /// Requests currently backed by a scheduled task.
    active: Vec<ActiveTask>,
    /// Always equals `active.len()`; drives `is_busy`.
    num_scheduled: usize,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            active: Vec::new(),
            num_scheduled: 0,
        }
    }

    /// Allocate a request and schedule its compilation task.
    ///
    /// Invalid ids produce a pre-failed request; the task is scheduled
    /// anyway (it no-ops) so the reap path stays uniform.
    pub fn create(
        &mut self,
        ctx: &Arc<ServerContext>,
        pool: &WorkerPool,
        resource_id: ResourceId,
        client_id: u32,
        origin: RequestOrigin,
    ) -> Arc<CompilationRequest> {
        let request = Arc::new(CompilationRequest::new(ctx, resource_id, client_id, origin));
        self.requests.push(Arc::clone(&request));

        let handle = pool.schedule({
            let ctx = Arc::clone(ctx);
            let request = Arc::clone(&request);
            move || task::run_compilation(&ctx, &request)
        });
        self.active.push(ActiveTask {
            handle,
            request: Arc::clone(&request),
        });
        self.num_scheduled += 1;

        request
    }

    /// Release finished tasks (reverse scan, unordered erase) and return the
    /// requests that reached a terminal status.
    ///
    /// Tasks short-circuited by shutdown leave their request pending; they
    /// are still released here but produce no notification.
    pub fn reap_completed(&mut self) -> Vec<Arc<CompilationRequest>> {
        let mut completed = Vec::new();

        for i in (0..self.active.len()).rev() {
            if self.active[i].handle.is_complete() {
                let task = self.active.swap_remove(i);
                self.num_scheduled -= 1;

                if task.request.is_complete() {
                    completed.push(task.request);
                }
            }
        }

        completed
    }

    /// Evict every terminal request. Safe alongside ongoing compilations:
    /// only terminal entries are touched.
    pub fn cleanup(&mut self) {
        for i in (0..self.requests.len()).rev() {
            if self.requests[i].is_complete() {
                self.requests.remove(i);
            }
        }
    }

    pub fn requests(&self) -> &[Arc<CompilationRequest>] {
        &self.requests
    }

    pub fn num_scheduled(&self) -> usize {
        self.num_scheduled
    }

    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    /// Drop every request. Only valid once the active set has drained.
    pub fn clear(&mut self) {
        debug_assert!(self.active.is_empty());
        self.requests.clear();
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
