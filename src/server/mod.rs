//! Resource compilation server core.
//!
//! The dispatcher is single-threaded and cooperative: the owner calls
//! [`ResourceServer::update`] once per tick. Compilation and packaging work
//! runs on the worker pool; all registry, packaging and network state is
//! mutated only from the dispatcher.
//!
//! # Module Structure
//!
//! - `context` - shared read-only context + the `is_exiting` flag
//! - `request` - `CompilationRequest` and its status lifecycle
//! - `task` - drives one compiler subprocess
//! - `registry` - owns every request; create/reap/cleanup
//! - `packaging` - dependency expansion + four-stage session

mod context;
mod packaging;
mod registry;
mod request;
mod task;


pub use context::ServerContext;
pub use packaging::PackagingStage;
pub use registry::RequestRegistry;
pub use request::{CompilationRequest, RequestOrigin, RequestStatus};
pub use task::exit_code;

use anyhow::{Context as _, Result, ensure};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::net::{MessageId, NetServer, ResourceResponse};
use crate::resource::{CompilerRegistry, ResourceId, ResourcePath};
use crate::watcher::FileWatcher;
use crate::worker::WorkerPool;
use crate::{debug, log};
use packaging::{PackagingSession, PackagingTask};

/// The resource compilation server.
pub struct ResourceServer {
    context: Arc<ServerContext>,
    pool: WorkerPool,
    net: NetServer,
    watcher: Option<FileWatcher>,
    registry: RequestRegistry,
    packaging: PackagingSession,
    /// Maps found under the raw root, for packaging selection.
    available_maps: Vec<ResourceId>,
    /// Statically required engine/game resources, from config.
    required_resources: Vec<ResourceId>,
    cleanup_requested: bool,
}

impl ResourceServer {
    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Bring the server up. Any failure here (bind, registry construction,
    /// unusable roots) keeps the server down.
    pub fn initialize(config: &ServerConfig) -> Result<Self> {
        let compilers = CompilerRegistry::from_config(&config.compiler, &config.paths.raw)
            .context("failed to construct compiler registry")?;

        fs::create_dir_all(&config.paths.raw).with_context(|| {
            format!("failed to create raw root `{}`", config.paths.raw.display())
        })?;
        fs::create_dir_all(&config.paths.compiled).with_context(|| {
            format!(
                "failed to create compiled root `{}`",
                config.paths.compiled.display()
            )
        })?;

        let net = NetServer::bind(config.server.interface, config.server.port)
            .context("failed to start server connection")?;

        let watcher = match FileWatcher::start(&config.paths.raw) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                log!("watch"; "file watcher unavailable: {}", e);
                None
            }
        };

        let mut required_resources = Vec::new();
        for raw in &config.packaging.required_resources {
            let id = ResourceId::new(raw.clone());
            ensure!(
                id.is_valid(),
                "invalid resource `{raw}` in [packaging].required_resources"
            );
            required_resources.push(id);
        }

        let context = Arc::new(ServerContext::new(
            config.paths.raw.clone(),
            config.paths.compiled.clone(),
            config.paths.packaged.clone(),
            config.compiler.executable.clone(),
            Arc::new(compilers),
        ));

        let mut server = Self {
            context,
            pool: WorkerPool::new(),
            net,
            watcher,
            registry: RequestRegistry::new(),
            packaging: PackagingSession::new(),
            available_maps: Vec::new(),
            required_resources,
            cleanup_requested: false,
        };
        server.refresh_map_list();

        Ok(server)
    }

    /// One cooperative tick: pump network, advance packaging, reap and
    /// notify, honor cleanup, pump the file watcher.
    pub fn update(&mut self) {
        // Every inbound RequestResource becomes an external request
        for inbound in self.net.pump() {
            let id = ResourceId::new(inbound.path);
            self.create_request(id, inbound.client_id, RequestOrigin::External);
        }

        self.advance_packaging();

        let completed = self.registry.reap_completed();
        if !self.context.is_exiting() {
            for request in &completed {
                self.notify_completed(request);
            }
        }

        if self.cleanup_requested {
            self.registry.cleanup();
            self.cleanup_requested = false;
        }

        let modified = self
            .watcher
            .as_mut()
            .map(FileWatcher::pump)
            .unwrap_or_default();
        for path in modified {
            self.on_file_modified(&path);
        }
    }

    /// Tear the server down: in-flight compilers are waited out, not
    /// interrupted, and emit no further notifications.
    pub fn shutdown(&mut self) {
        self.context.begin_exit();

        self.pool.wait_all();
        let _ = self.registry.reap_completed();
        self.pool.shutdown();
        assert_eq!(self.registry.num_scheduled(), 0);

        if let Some(task) = self.packaging.task.take() {
            debug_assert!(task.is_complete());
        }
        self.packaging.requests.clear();

        self.watcher = None;
        self.registry.clear();
        self.net.shutdown();
    }

    /// True while packaging is active or any task is scheduled.
    pub fn is_busy(&self) -> bool {
        self.is_packaging() || self.registry.num_scheduled() != 0
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Create a request and schedule its compilation task.
    pub fn create_request(
        &mut self,
        resource_id: ResourceId,
        client_id: u32,
        origin: RequestOrigin,
    ) -> Arc<CompilationRequest> {
        debug!("serve"; "request {} ({:?})", resource_id, origin);
        self.registry
            .create(&self.context, &self.pool, resource_id, client_id, origin)
    }

    /// A source file changed under the raw root.
    ///
    /// Paths that do not translate to a valid resource id are dropped
    /// silently.
    pub fn on_file_modified(&mut self, path: &Path) {
        let Some(resource_path) =
            ResourcePath::from_fs_path(&self.context.raw_resource_root, path)
        else {
            return;
        };

        let id = ResourceId::from_path(resource_path);
        if !id.is_valid() {
            return;
        }

        debug!("watch"; "modified: {}", id);
        self.create_request(id, 0, RequestOrigin::FileWatcher);
    }

    /// Evict terminal requests on the next tick.
    pub fn request_cleanup(&mut self) {
        self.cleanup_requested = true;
    }

    /// Every request currently owned by the registry.
    pub fn requests(&self) -> &[Arc<CompilationRequest>] {
        self.registry.requests()
    }

    fn notify_completed(&mut self, request: &CompilationRequest) {
        debug_assert!(!self.context.is_exiting());
        debug_assert!(request.is_complete());

        let response = ResourceResponse {
            resource_id: request.resource_id().as_str().to_string(),
            file_path: request
                .has_succeeded()
                .then(|| request.destination_path().to_path_buf()),
        };

        if request.is_internal() {
            // Nobody asked and nothing changed
            if request.status() == RequestStatus::SucceededUpToDate {
                return;
            }
            for client_id in self.net.client_ids() {
                self.net
                    .send(client_id, MessageId::ResourceUpdated, &response);
            }
        } else {
            self.net.send(
                request.client_id(),
                MessageId::ResourceRequestComplete,
                &response,
            );
        }
    }

    // ------------------------------------------------------------------------
    // Packaging
    // ------------------------------------------------------------------------

    pub fn is_packaging(&self) -> bool {
        self.packaging.is_active()
    }

    pub fn packaging_stage(&self) -> PackagingStage {
        self.packaging.stage
    }

    pub fn packaging_progress(&self) -> f32 {
        self.packaging.progress()
    }

    pub fn can_start_packaging(&self) -> bool {
        self.packaging.can_start()
    }

    /// Add a seed map. Contract: map resources only, between sessions only.
    pub fn add_map_to_packaging(&mut self, id: ResourceId) {
        self.packaging.add_map(id);
    }

    pub fn remove_map_from_packaging(&mut self, id: &ResourceId) {
        self.packaging.remove_map(id);
    }

    /// Kick off a packaging session for the selected maps.
    pub fn start_packaging(&mut self) {
        assert!(
            self.can_start_packaging(),
            "packaging already running or no maps selected"
        );

        log!("package"; "expanding dependencies of {} map(s)", self.packaging.maps.len());
        self.packaging.task = Some(PackagingTask::spawn(
            &self.pool,
            Arc::clone(&self.context),
            self.required_resources.clone(),
            self.packaging.maps.clone(),
        ));
        self.packaging.stage = PackagingStage::Preparing;
    }

    fn advance_packaging(&mut self) {
        match self.packaging.stage {
            PackagingStage::Preparing => {
                let ready = self
                    .packaging
                    .task
                    .as_ref()
                    .is_some_and(PackagingTask::is_complete);
                if !ready {
                    return;
                }

                let task = self.packaging.task.take().expect("preparing stage owns a task");
                if let Some(deps) = task.take_result() {
                    let requests: Vec<_> = deps
                        .into_iter()
                        .map(|id| self.create_request(id, 0, RequestOrigin::Package))
                        .collect();
                    log!("package"; "compiling {} resource(s)", requests.len());
                    self.packaging.requests = requests;
                    self.packaging.stage = PackagingStage::Packaging;
                }
                // An expansion aborted by shutdown publishes nothing; the
                // session is drained by shutdown()
            }

            PackagingStage::Packaging => {
                if self.packaging.requests.iter().all(|r| r.is_complete()) {
                    self.packaging.requests.clear();
                    self.packaging.stage = PackagingStage::Complete;
                    log!("package"; "packaging complete");
                }
            }

            PackagingStage::None | PackagingStage::Complete => {}
        }
    }

    // ------------------------------------------------------------------------
    // Maps
    // ------------------------------------------------------------------------

    /// Rescan the raw root for map resources.
    pub fn refresh_map_list(&mut self) {
        let root = self.context.raw_resource_root.clone();
        let mut found = Vec::new();
        scan_maps(&root, &root, &mut found);
        found.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        self.available_maps = found;
    }

    pub fn available_maps(&self) -> &[ResourceId] {
        &self.available_maps
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Port actually bound (useful when the configured port is 0).
    pub fn local_port(&self) -> u16 {
        self.net.local_port()
    }

    pub fn connected_clients(&self) -> usize {
        self.net.connected_count()
    }
}

/// Recursive helper collecting `.map` resources under the raw root.
fn scan_maps(dir: &Path, root: &Path, out: &mut Vec<ResourceId>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_maps(&path, root, out);
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("map"))
            && let Some(resource_path) = ResourcePath::from_fs_path(root, &path)
        {
            let id = ResourceId::from_path(resource_path);
            if id.is_valid() {
                out.push(id);
            }
        }
    }
}
