//! Foundry - a resource compilation server for game assets.
//!
//! Clients (editor, runtime, packager) connect over TCP and ask for the
//! compiled form of a resource; the server drives the external resource
//! compiler per request, answers with the artifact path, and broadcasts
//! invalidations when source files change on disk.

#![allow(dead_code)]

mod cli;
mod config;
mod logger;
mod net;
mod resource;
mod server;
mod watcher;
mod worker;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cli::{Cli, Commands};
use config::ServerConfig;
use logger::StatusLine;
use resource::ResourceId;
use server::{RequestStatus, ResourceServer};

/// Dispatcher tick interval.
const TICK: Duration = Duration::from_millis(10);

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Setup the global Ctrl+C handler. Call once at program start.
fn setup_shutdown_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

fn main() -> Result<()> {
    setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let mut config = ServerConfig::load(&cli.config)?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            run_serve(&config)
        }
        Commands::Package { maps } => run_package(&config, &maps),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

/// Run the dispatcher loop until Ctrl+C.
fn run_serve(config: &ServerConfig) -> Result<()> {
    let mut server = ResourceServer::initialize(config)?;

    log!("serve"; "listening on {}:{}", config.server.interface, server.local_port());
    log!("serve"; "raw root: {}", config.paths.raw.display());
    log!("serve"; "compiler: {}", config.compiler.executable.display());

    while !is_shutdown() {
        server.update();
        std::thread::sleep(TICK);
    }

    log!("serve"; "shutting down...");
    server.shutdown();
    Ok(())
}

// =============================================================================
// Package Command
// =============================================================================

/// Run one packaging session headless, then exit.
fn run_package(config: &ServerConfig, maps: &[String]) -> Result<()> {
    let mut server = ResourceServer::initialize(config)?;

    if maps.is_empty() {
        for map in server.available_maps().to_vec() {
            server.add_map_to_packaging(map);
        }
    } else {
        for raw in maps {
            let id = ResourceId::new(raw.clone());
            anyhow::ensure!(
                id.is_valid() && id.is_map(),
                "`{raw}` is not a map resource"
            );
            server.add_map_to_packaging(id);
        }
    }

    anyhow::ensure!(
        server.can_start_packaging(),
        "no maps to package under {}",
        config.paths.raw.display()
    );

    server.start_packaging();

    let mut status = StatusLine::new();
    while server.is_busy() && !is_shutdown() {
        server.update();
        status.update(&format!(
            "packaging {:3.0}%",
            server.packaging_progress() * 100.0
        ));
        std::thread::sleep(TICK);
    }

    let total = server.requests().len();
    let failed: Vec<_> = server
        .requests()
        .iter()
        .filter(|r| r.status() == RequestStatus::Failed)
        .cloned()
        .collect();

    if is_shutdown() {
        log!("package"; "interrupted");
    } else if failed.is_empty() {
        status.success(&format!(
            "packaged {} resources into {}",
            total,
            config.paths.packaged.display()
        ));
    } else {
        status.error(&format!("{} resources failed to package", failed.len()), "");
        for request in &failed {
            log!("error"; "{}\n{}", request.resource_id(), request.log());
        }
    }

    server.shutdown();

    if !is_shutdown() && !failed.is_empty() {
        anyhow::bail!("{} resources failed to package", failed.len());
    }
    Ok(())
}
