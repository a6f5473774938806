//! Compilation requests.
//!
//! The central entity of the server. A request is created by the dispatcher,
//! mutated exclusively by its compilation task until it reaches a terminal
//! status, then owned read-only by the registry until cleanup.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::context::ServerContext;
use crate::resource::ResourceId;

// ============================================================================
// Origin / Status
// ============================================================================

/// Where a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// A connected client asked for the resource.
    External,
    /// The source file changed on disk.
    FileWatcher,
    /// Packaging dependency expansion.
    Package,
}

/// Request status lifecycle: `Pending` → one terminal status, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Succeeded,
    SucceededUpToDate,
    SucceededWithWarnings,
    Failed,
}

impl RequestStatus {
    pub fn is_complete(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn has_succeeded(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::SucceededUpToDate | Self::SucceededWithWarnings
        )
    }
}

// ============================================================================
// CompilationRequest
// ============================================================================

#[derive(Debug)]
struct RequestState {
    status: RequestStatus,
    log: String,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

/// One compilation request.
///
/// Identity fields are immutable; progress lives behind a mutex so the
/// dispatcher can observe status while the owning task is still running.
pub struct CompilationRequest {
    resource_id: ResourceId,
    client_id: u32,
    origin: RequestOrigin,
    source_path: PathBuf,
    destination_path: PathBuf,
    compiler_args: String,
    force_recompile: bool,
    state: Mutex<RequestState>,
}

impl CompilationRequest {
    /// Build a request, routing its destination by origin.
    ///
    /// Invalid resource ids produce a pre-failed request with an explanatory
    /// log; it still flows through the normal completion path.
    pub(crate) fn new(
        ctx: &ServerContext,
        resource_id: ResourceId,
        client_id: u32,
        origin: RequestOrigin,
    ) -> Self {
        // Origin/client correspondence is a contract on every request
        if origin == RequestOrigin::External {
            assert!(client_id != 0, "external requests need a client id");
        } else {
            assert!(client_id == 0, "internal requests must not carry a client id");
        }

        let mut request = Self {
            resource_id,
            client_id,
            origin,
            source_path: PathBuf::new(),
            destination_path: PathBuf::new(),
            compiler_args: String::new(),
            force_recompile: false,
            state: Mutex::new(RequestState {
                status: RequestStatus::Pending,
                log: String::new(),
                started_at: None,
                finished_at: None,
            }),
        };

        match request.resource_id.resource_path().cloned() {
            Some(path) => {
                request.source_path = path.to_fs_path(&ctx.raw_resource_root);
                request.destination_path = if origin == RequestOrigin::Package {
                    path.to_fs_path(&ctx.packaged_resource_root)
                } else {
                    path.to_fs_path(&ctx.compiled_resource_root)
                };
                request.compiler_args = path.as_str().to_string();
                // The source just changed on disk; bypass the compiler's
                // own up-to-date check
                request.force_recompile = origin == RequestOrigin::FileWatcher;
            }
            None => {
                let state = request.state.get_mut();
                state.log = format!(
                    "Error: Invalid resource ID ( {} )",
                    request.resource_id.as_str()
                );
                state.status = RequestStatus::Failed;
            }
        }

        request
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// Originating client; 0 for internal requests.
    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn origin(&self) -> RequestOrigin {
        self.origin
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    pub fn compiler_args(&self) -> &str {
        &self.compiler_args
    }

    pub fn force_recompile(&self) -> bool {
        self.force_recompile
    }

    pub fn is_internal(&self) -> bool {
        self.origin != RequestOrigin::External
    }

    pub fn status(&self) -> RequestStatus {
        self.state.lock().status
    }

    pub fn is_complete(&self) -> bool {
        self.status().is_complete()
    }

    pub fn has_succeeded(&self) -> bool {
        self.status().has_succeeded()
    }

    /// Accumulated compiler output.
    pub fn log(&self) -> String {
        self.state.lock().log.clone()
    }

    /// Wall time the compiler ran for, once finished.
    pub fn compile_duration(&self) -> Option<Duration> {
        let state = self.state.lock();
        Some(state.finished_at?.duration_since(state.started_at?))
    }

    pub(crate) fn mark_started(&self) {
        self.state.lock().started_at = Some(Instant::now());
    }

    pub(crate) fn append_log_line(&self, line: &str) {
        let mut state = self.state.lock();
        state.log.push_str(line);
        state.log.push('\n');
    }

    /// Move to a terminal status, exactly once.
    pub(crate) fn finish(&self, status: RequestStatus) {
        assert!(status.is_complete(), "finish needs a terminal status");

        let mut state = self.state.lock();
        assert!(!state.status.is_complete(), "terminal requests are immutable");
        state.status = status;
        state.finished_at = Some(Instant::now());
    }

    /// Fail with a canned log message.
    pub(crate) fn fail(&self, message: &str) {
        self.state.lock().log = message.to_string();
        self.finish(RequestStatus::Failed);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::CompilerRegistry;
    use std::sync::Arc;

    fn test_context() -> ServerContext {
        ServerContext::new(
            PathBuf::from("/srv/raw"),
            PathBuf::from("/srv/compiled"),
            PathBuf::from("/srv/packaged"),
            PathBuf::from("/srv/bin/rc"),
            Arc::new(CompilerRegistry::new()),
        )
    }

    #[test]
    fn test_destination_routing() {
        let ctx = test_context();
        let id = ResourceId::new("data://env/sky.tex");

        let normal = CompilationRequest::new(&ctx, id.clone(), 7, RequestOrigin::External);
        assert_eq!(
            normal.destination_path(),
            Path::new("/srv/compiled/env/sky.tex")
        );
        assert_eq!(normal.source_path(), Path::new("/srv/raw/env/sky.tex"));

        let packaged = CompilationRequest::new(&ctx, id, 0, RequestOrigin::Package);
        assert_eq!(
            packaged.destination_path(),
            Path::new("/srv/packaged/env/sky.tex")
        );
    }

    #[test]
    fn test_watcher_requests_force_recompile() {
        let ctx = test_context();
        let id = ResourceId::new("data://env/sky.tex");

        let watched = CompilationRequest::new(&ctx, id.clone(), 0, RequestOrigin::FileWatcher);
        assert!(watched.force_recompile());
        assert!(watched.is_internal());

        let external = CompilationRequest::new(&ctx, id.clone(), 3, RequestOrigin::External);
        assert!(!external.force_recompile());
        assert!(!external.is_internal());

        let packaged = CompilationRequest::new(&ctx, id, 0, RequestOrigin::Package);
        assert!(!packaged.force_recompile());
    }

    #[test]
    fn test_invalid_id_pre_fails() {
        let ctx = test_context();
        let request =
            CompilationRequest::new(&ctx, ResourceId::new(""), 4, RequestOrigin::External);

        assert_eq!(request.status(), RequestStatus::Failed);
        assert!(request.is_complete());
        assert!(!request.has_succeeded());
        assert!(request.log().contains("Invalid resource ID"));
        assert!(request.compiler_args().is_empty());
    }

    #[test]
    fn test_status_lifecycle() {
        let ctx = test_context();
        let request = CompilationRequest::new(
            &ctx,
            ResourceId::new("data://a.anim"),
            0,
            RequestOrigin::FileWatcher,
        );

        assert_eq!(request.status(), RequestStatus::Pending);
        assert!(!request.is_complete());

        request.mark_started();
        request.append_log_line("compiling data://a.anim");
        request.finish(RequestStatus::Succeeded);

        assert!(request.is_complete());
        assert!(request.has_succeeded());
        assert!(request.log().contains("compiling data://a.anim"));
        assert!(request.compile_duration().is_some());
    }

    #[test]
    #[should_panic(expected = "terminal requests are immutable")]
    fn test_terminal_status_is_immutable() {
        let ctx = test_context();
        let request = CompilationRequest::new(
            &ctx,
            ResourceId::new("data://a.anim"),
            0,
            RequestOrigin::FileWatcher,
        );

        request.finish(RequestStatus::Succeeded);
        request.finish(RequestStatus::Failed);
    }

    #[test]
    #[should_panic(expected = "external requests need a client id")]
    fn test_external_requires_client() {
        let ctx = test_context();
        CompilationRequest::new(
            &ctx,
            ResourceId::new("data://a.anim"),
            0,
            RequestOrigin::External,
        );
    }

    #[test]
    #[should_panic(expected = "internal requests must not carry a client id")]
    fn test_internal_rejects_client() {
        let ctx = test_context();
        CompilationRequest::new(
            &ctx,
            ResourceId::new("data://a.anim"),
            9,
            RequestOrigin::Package,
        );
    }
}
