//! Compilation task.
//!
//! Drives one external compiler subprocess to termination and moves its
//! request into a terminal status exactly once. Runs on a worker; the task
//! is the sole mutator of its request while alive.

use std::process::{Command, Stdio};

use super::context::ServerContext;
use super::request::{CompilationRequest, RequestOrigin, RequestStatus};

/// Exit codes of the external resource compiler.
pub mod exit_code {
    /// Fresh compile succeeded.
    pub const SUCCESS: i32 = 0;
    /// Output already current; nothing was rewritten.
    pub const SUCCESS_UP_TO_DATE: i32 = 1;
    /// Succeeded with diagnostics.
    pub const SUCCESS_WITH_WARNINGS: i32 = 2;
}

/// Invoke the compiler for `request`:
///
/// ```text
/// <compiler> -compile <resource path> [ -force | -package ]
/// ```
pub(crate) fn run_compilation(ctx: &ServerContext, request: &CompilationRequest) {
    // Pre-failed requests are scheduled too, purely to keep one reap path
    if ctx.is_exiting() || request.is_complete() {
        return;
    }

    debug_assert!(!request.compiler_args().is_empty());

    let mut command = Command::new(&ctx.compiler_executable);
    command
        .arg("-compile")
        .arg(request.compiler_args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Package wins over force
    if request.origin() == RequestOrigin::Package {
        command.arg("-package");
    } else if request.force_recompile() {
        command.arg("-force");
    }

    request.mark_started();

    let child = match command.spawn() {
        Ok(child) => child,
        Err(_) => {
            request.fail("Resource compiler failed to start!");
            return;
        }
    };

    let output = match child.wait_with_output() {
        Ok(output) => output,
        Err(_) => {
            request.fail("Resource compiler failed to complete!");
            return;
        }
    };

    // stdout and stderr are piped separately but recorded as one log
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        request.append_log_line(line);
    }
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        request.append_log_line(line);
    }

    request.finish(status_for_exit(output.status.code()));
}

/// Map the compiler's exit code to a terminal status.
///
/// `None` (signal death) counts as failure like any unrecognized code.
fn status_for_exit(code: Option<i32>) -> RequestStatus {
    match code {
        Some(exit_code::SUCCESS) => RequestStatus::Succeeded,
        Some(exit_code::SUCCESS_UP_TO_DATE) => RequestStatus::SucceededUpToDate,
        Some(exit_code::SUCCESS_WITH_WARNINGS) => RequestStatus::SucceededWithWarnings,
        _ => RequestStatus::Failed,
    }
}

// ============================================================================
// Test support
// ============================================================================

/// Stub compiler scripts for tests that need a real subprocess.
#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::fs;
    use std::path::{Path, PathBuf};

    /// Write an executable stub compiler that echoes its resource argument
    /// and exits with `exit_code`.
    pub(crate) fn write_stub_compiler(path: &Path, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = format!("#!/bin/sh\necho \"compiled $2 $3\"\nexit {exit_code}\n");
        fs::write(path, script).unwrap();

        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();

        path.to_path_buf()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, unix))]
mod tests {
    use super::test_support::write_stub_compiler;
    use super::*;
    use crate::resource::{CompilerRegistry, ResourceId};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context_with_compiler(dir: &TempDir, compiler: PathBuf) -> ServerContext {
        ServerContext::new(
            dir.path().join("raw"),
            dir.path().join("compiled"),
            dir.path().join("packaged"),
            compiler,
            Arc::new(CompilerRegistry::new()),
        )
    }

    fn request(ctx: &ServerContext, origin: RequestOrigin) -> CompilationRequest {
        CompilationRequest::new(ctx, ResourceId::new("data://a.anim"), 0, origin)
    }

    #[test]
    fn test_exit_code_mapping() {
        let dir = TempDir::new().unwrap();
        let cases = [
            (exit_code::SUCCESS, RequestStatus::Succeeded),
            (exit_code::SUCCESS_UP_TO_DATE, RequestStatus::SucceededUpToDate),
            (
                exit_code::SUCCESS_WITH_WARNINGS,
                RequestStatus::SucceededWithWarnings,
            ),
            (17, RequestStatus::Failed),
        ];

        for (code, expected) in cases {
            let compiler =
                write_stub_compiler(&dir.path().join(format!("rc-{code}")), code);
            let ctx = context_with_compiler(&dir, compiler);
            let request = request(&ctx, RequestOrigin::FileWatcher);

            run_compilation(&ctx, &request);
            assert_eq!(request.status(), expected, "exit code {code}");
        }
    }

    #[test]
    fn test_output_captured_into_log() {
        let dir = TempDir::new().unwrap();
        let compiler = write_stub_compiler(&dir.path().join("rc"), exit_code::SUCCESS);
        let ctx = context_with_compiler(&dir, compiler);
        let request = request(&ctx, RequestOrigin::FileWatcher);

        run_compilation(&ctx, &request);

        assert!(request.log().contains("compiled data://a.anim"));
        assert!(request.compile_duration().is_some());
    }

    #[test]
    fn test_force_and_package_flags() {
        let dir = TempDir::new().unwrap();
        let compiler = write_stub_compiler(&dir.path().join("rc"), exit_code::SUCCESS);
        let ctx = context_with_compiler(&dir, compiler);

        // Watcher origin passes -force
        let forced = request(&ctx, RequestOrigin::FileWatcher);
        run_compilation(&ctx, &forced);
        assert!(forced.log().contains("-force"));

        // Package origin passes -package
        let packaged = request(&ctx, RequestOrigin::Package);
        run_compilation(&ctx, &packaged);
        assert!(packaged.log().contains("-package"));
    }

    #[test]
    fn test_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let ctx = context_with_compiler(&dir, dir.path().join("no-such-compiler"));
        let request = request(&ctx, RequestOrigin::FileWatcher);

        run_compilation(&ctx, &request);

        assert_eq!(request.status(), RequestStatus::Failed);
        assert_eq!(request.log(), "Resource compiler failed to start!");
    }

    #[test]
    fn test_exiting_context_short_circuits() {
        let dir = TempDir::new().unwrap();
        let compiler = write_stub_compiler(&dir.path().join("rc"), exit_code::SUCCESS);
        let ctx = context_with_compiler(&dir, compiler);
        ctx.begin_exit();

        let request = request(&ctx, RequestOrigin::FileWatcher);
        run_compilation(&ctx, &request);

        assert_eq!(request.status(), RequestStatus::Pending);
    }

    #[test]
    fn test_pre_failed_request_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let compiler = write_stub_compiler(&dir.path().join("rc"), exit_code::SUCCESS);
        let ctx = context_with_compiler(&dir, compiler);

        let request = CompilationRequest::new(
            &ctx,
            ResourceId::new("garbage"),
            0,
            RequestOrigin::FileWatcher,
        );
        assert_eq!(request.status(), RequestStatus::Failed);

        run_compilation(&ctx, &request);

        // Still the creation-time failure, not overwritten
        assert_eq!(request.status(), RequestStatus::Failed);
        assert!(request.log().contains("Invalid resource ID"));
    }
}
