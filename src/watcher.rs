//! File system watcher bridge.
//!
//! Watches the raw resource root for source changes. notify delivers events
//! on its own thread; they are bridged through a std channel and drained
//! non-blockingly by the dispatcher tick. Bursts from a single save are
//! coalesced within one tick, preserving first-occurrence order.

use anyhow::Result;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::debug;

/// Watches a directory tree for modified files.
pub struct FileWatcher {
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root` recursively.
    pub fn start(root: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        Ok(Self {
            rx,
            _watcher: watcher,
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drain pending events, returning the modified file paths.
    pub fn pump(&mut self) -> Vec<PathBuf> {
        let mut seen = FxHashSet::default();
        let mut modified = Vec::new();

        for result in self.rx.try_iter() {
            match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        continue;
                    }
                    for path in event.paths {
                        if path.is_file() && seen.insert(path.clone()) {
                            modified.push(path);
                        }
                    }
                }
                Err(e) => debug!("watch"; "notify error: {}", e),
            }
        }

        modified
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    #[test]
    fn test_detects_modified_file() {
        let dir = TempDir::new().unwrap();
        let mut watcher = FileWatcher::start(dir.path()).unwrap();

        let file = dir.path().join("hero.anim");
        fs::write(&file, "v1").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut found = Vec::new();
        while found.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
            found = watcher.pump();
        }

        assert!(found.contains(&file), "expected {file:?} in {found:?}");
    }

    #[test]
    fn test_pump_coalesces_within_tick() {
        let dir = TempDir::new().unwrap();
        let mut watcher = FileWatcher::start(dir.path()).unwrap();

        let file = dir.path().join("sky.tex");
        for i in 0..5 {
            fs::write(&file, format!("v{i}")).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut found = Vec::new();
        while found.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(200));
            found = watcher.pump();
        }

        // However many raw events arrived, one pump reports the path once
        assert_eq!(found.iter().filter(|p| **p == file).count(), 1);
    }
}
