//! Compute backend abstraction for engine invocation.
//!
//! The [`ComputeBackend`] trait decouples orchestration from the actual engine
//! process (currently `deno run src/subagents.ts`). Tests use in-process
//! backends that write canned output files without spawning anything.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::command::{EngineArgs, engine_args};
use crate::error::Result;
use crate::io::process::{OutputMode, run_command};
use crate::io::runtime::RuntimeInvocation;

/// Default cap on captured stdout/stderr per stream in quiet mode.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// Parameters for a single engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    /// Engine root; used as the working directory.
    pub engine_dir: PathBuf,
    /// Query text delivered on stdin.
    pub query: String,
    /// Path where the engine must write its JSON output.
    pub output_path: PathBuf,
    /// Merged config file, when overrides were supplied.
    pub config_path: Option<PathBuf>,
    /// Directory the engine writes its run logs to.
    pub log_dir: PathBuf,
    /// Log filename prefix.
    pub prefix: Option<String>,
    /// Inherit stdout/stderr instead of capturing them.
    pub verbose: bool,
    /// Kill the engine after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// How the engine process ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineExit {
    pub exit_code: Option<i32>,
    /// Captured stderr; `None` when streams were inherited.
    pub stderr: Option<String>,
    pub timed_out: bool,
}

/// Abstraction over engine execution backends.
pub trait ComputeBackend {
    /// Run the engine for `request`. On success the engine must have written
    /// `request.output_path`; the caller checks for it after this returns.
    fn invoke(&self, request: &EngineRequest) -> Result<EngineExit>;
}

impl<B: ComputeBackend + ?Sized> ComputeBackend for &B {
    fn invoke(&self, request: &EngineRequest) -> Result<EngineExit> {
        (**self).invoke(request)
    }
}

/// Backend that spawns the engine under the Deno runtime.
#[derive(Debug, Clone)]
pub struct DenoBackend {
    runtime: RuntimeInvocation,
    output_limit_bytes: usize,
}

impl DenoBackend {
    pub fn new(runtime: RuntimeInvocation) -> Self {
        Self {
            runtime,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    /// Resolve `deno` on `PATH`; fails with `MissingDependency` if absent.
    pub fn discover() -> Result<Self> {
        Ok(Self::new(RuntimeInvocation::discover()?))
    }

    pub fn runtime(&self) -> &RuntimeInvocation {
        &self.runtime
    }

    /// Full command for `request`, without stdio configuration.
    ///
    /// Fails with `Config` when the runtime is a shell-routed shim and an
    /// argument carries characters the shell would interpret.
    pub fn command(&self, request: &EngineRequest) -> Result<Command> {
        let args = engine_args(&EngineArgs {
            log_dir: &request.log_dir,
            output_path: &request.output_path,
            prefix: request.prefix.as_deref(),
            config_path: request.config_path.as_deref(),
        });
        self.runtime.check_args(&args)?;

        let mut cmd = Command::new(self.runtime.program());
        cmd.args(self.runtime.leading_args())
            .args(args)
            .current_dir(&request.engine_dir);
        Ok(cmd)
    }
}

impl ComputeBackend for DenoBackend {
    #[instrument(skip_all, fields(engine_dir = %request.engine_dir.display(), verbose = request.verbose))]
    fn invoke(&self, request: &EngineRequest) -> Result<EngineExit> {
        info!(query_bytes = request.query.len(), "starting engine");

        let mode = if request.verbose {
            OutputMode::Inherit
        } else {
            OutputMode::Capture {
                limit_bytes: self.output_limit_bytes,
            }
        };
        let output = run_command(
            self.command(request)?,
            Some(request.query.as_bytes()),
            mode,
            request.timeout,
        )?;

        let stderr = match mode {
            OutputMode::Inherit => None,
            OutputMode::Capture { .. } => {
                debug!(stdout_bytes = output.stdout.len(), "engine stdout captured");
                let mut text = output.stderr_lossy();
                text.push_str(&output.stderr_truncated_notice("engine"));
                Some(text)
            }
        };

        if output.timed_out {
            warn!(timeout = ?request.timeout, "engine timed out");
        } else if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "engine exited with failure");
        } else {
            debug!("engine exited successfully");
        }

        Ok(EngineExit {
            exit_code: output.status.code(),
            stderr,
            timed_out: output.timed_out,
        })
    }
}
