//! Orchestration for a single engine query.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::config::ConfigOverrides;
use crate::core::output::interpret_output;
use crate::error::{Error, Result};
use crate::io::backend::{ComputeBackend, DenoBackend, EngineExit, EngineRequest};
use crate::io::config_file::write_merged_config;
use crate::io::locator::{EngineLocator, InstallLayout};
use crate::io::runtime::RuntimeInvocation;
use crate::io::scratch::Scratch;

/// Directory under the caller's working directory that receives engine logs.
pub const LOG_DIR_NAME: &str = "logs";

/// One query to run through the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RlmRequest {
    /// Question or context, delivered on stdin.
    pub query: String,
    /// Log filename prefix.
    pub prefix: Option<String>,
    /// Overrides merged over the bundled defaults. `None` leaves the engine
    /// to read its own defaults and passes no config file.
    pub config: Option<ConfigOverrides>,
    /// Stream engine stdout/stderr to the terminal instead of capturing them.
    pub verbose: bool,
    /// Kill the engine after this long. Unset by default.
    pub timeout: Option<Duration>,
}

impl RlmRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            prefix: None,
            config: None,
            verbose: true,
            timeout: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_config(mut self, config: impl Into<ConfigOverrides>) -> Self {
        self.config = Some(config.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Engine client: a locator for the engine directory plus a backend to run it.
#[derive(Debug, Clone)]
pub struct Rlm<L, B> {
    locator: L,
    backend: B,
    log_dir: PathBuf,
    scratch_root: PathBuf,
}

impl<L: EngineLocator, B: ComputeBackend> Rlm<L, B> {
    /// Logs go to `<cwd>/logs`; transient files go under the system temp dir.
    pub fn new(locator: L, backend: B) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|err| Error::io("resolve current dir", err))?;
        Ok(Self {
            locator,
            backend,
            log_dir: cwd.join(LOG_DIR_NAME),
            scratch_root: std::env::temp_dir(),
        })
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Parent directory for per-invocation scratch directories.
    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = scratch_root.into();
        self
    }

    /// Run one query and return the engine's output document.
    ///
    /// The engine directory is resolved before anything is written. All
    /// transient files are removed before this returns, whatever the outcome.
    #[instrument(skip_all, fields(prefix = request.prefix.as_deref(), has_config = request.config.is_some()))]
    pub fn run(&self, request: &RlmRequest) -> Result<Value> {
        let engine_dir = self.locator.locate()?;
        info!(engine_dir = %engine_dir.display(), "running query");

        let scratch = Scratch::create(&self.scratch_root)?;
        let outcome = self.run_in(&scratch, &engine_dir, request);
        scratch.close();
        outcome
    }

    fn run_in(&self, scratch: &Scratch, engine_dir: &Path, request: &RlmRequest) -> Result<Value> {
        let config_path = match &request.config {
            Some(overrides) => {
                let path = scratch.config_path();
                write_merged_config(engine_dir, overrides, &path)?;
                Some(path)
            }
            None => None,
        };

        let engine_request = EngineRequest {
            engine_dir: engine_dir.to_path_buf(),
            query: request.query.clone(),
            output_path: scratch.output_path(),
            config_path,
            log_dir: self.log_dir.clone(),
            prefix: request.prefix.clone(),
            verbose: request.verbose,
            timeout: request.timeout,
        };

        let exit = self.backend.invoke(&engine_request)?;
        collect_output(&engine_request, exit)
    }
}

/// Read and interpret the output file once the engine has exited.
fn collect_output(request: &EngineRequest, exit: EngineExit) -> Result<Value> {
    if exit.timed_out {
        return Err(Error::TimedOut {
            timeout: request.timeout.unwrap_or_default(),
        });
    }
    if !request.output_path.exists() {
        return Err(Error::EngineFailure {
            exit_code: exit.exit_code,
            stderr: exit.stderr,
        });
    }

    let contents = fs::read_to_string(&request.output_path).map_err(|err| {
        Error::io(
            format!("read engine output {}", request.output_path.display()),
            err,
        )
    })?;
    let document: Value = serde_json::from_str(&contents).map_err(|err| {
        Error::json(
            format!("parse engine output {}", request.output_path.display()),
            err,
        )
    })?;
    debug!(exit_code = ?exit.exit_code, "engine output parsed");
    interpret_output(document)
}

/// Run a query with the installed engine and the `deno` found on `PATH`.
///
/// The runtime is resolved first, so a missing `deno` fails before any file
/// is written.
pub fn run(request: &RlmRequest) -> Result<Value> {
    run_with(
        request,
        RuntimeInvocation::discover(),
        InstallLayout::from_current_exe,
        std::env::temp_dir(),
    )
}

fn run_with<L: EngineLocator>(
    request: &RlmRequest,
    runtime: Result<RuntimeInvocation>,
    locator: impl FnOnce() -> Result<L>,
    scratch_root: PathBuf,
) -> Result<Value> {
    let backend = DenoBackend::new(runtime?);
    Rlm::new(locator()?, backend)?
        .with_scratch_root(scratch_root)
        .run(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::locator::FixedEngineDir;
    use crate::test_support::{CannedBackend, EngineFixture, scratch_entries};
    use serde_json::json;

    fn client(fixture: &EngineFixture, backend: CannedBackend) -> Rlm<FixedEngineDir, CannedBackend> {
        Rlm::new(fixture.locator(), backend)
            .expect("client")
            .with_log_dir(fixture.root().join("logs"))
            .with_scratch_root(fixture.scratch_root())
    }

    #[test]
    fn successful_run_returns_document_and_cleans_up() {
        let fixture = EngineFixture::new(None).expect("fixture");
        let doc = json!({"results": [1, 2], "usage": {"calls": 3}});
        let rlm = client(&fixture, CannedBackend::writing(doc.clone()));

        let got = rlm
            .run(&RlmRequest::new("q").with_config(crate::core::config::RlmConfig::default()))
            .expect("run");

        assert_eq!(got, doc);
        assert_eq!(scratch_entries(&fixture), 0);
    }

    #[test]
    fn no_config_means_no_config_file() {
        let fixture = EngineFixture::new(Some("max_depth: 4\n")).expect("fixture");
        let backend = CannedBackend::writing(json!({"results": [], "usage": {}}));
        let rlm = client(&fixture, backend);

        rlm.run(&RlmRequest::new("q")).expect("run");

        let seen = rlm.backend.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].config_path, None);
        assert_eq!(rlm.backend.configs_seen(), vec![None]);
    }

    #[test]
    fn timed_out_engine_is_reported_even_with_output() {
        let fixture = EngineFixture::new(None).expect("fixture");
        let backend = CannedBackend::writing(json!({"results": []})).timing_out();
        let rlm = client(&fixture, backend);

        let err = rlm
            .run(&RlmRequest::new("q").with_timeout(Duration::from_secs(2)))
            .unwrap_err();

        assert!(matches!(err, Error::TimedOut { timeout } if timeout == Duration::from_secs(2)));
        assert_eq!(scratch_entries(&fixture), 0);
    }

    #[test]
    fn missing_runtime_fails_before_locating_or_writing() {
        use crate::io::runtime::Platform;
        use std::cell::Cell;

        let fixture = EngineFixture::new(Some("max_depth: 4\n")).expect("fixture");
        let empty_bin = fixture.root().join("empty-bin");
        fs::create_dir_all(&empty_bin).expect("empty bin");
        let located = Cell::new(false);

        let err = run_with(
            &RlmRequest::new("q").with_config(crate::core::config::RlmConfig::default()),
            RuntimeInvocation::discover_in(
                empty_bin.as_os_str(),
                Platform::current(),
                None,
                None,
            ),
            || {
                located.set(true);
                Ok(fixture.locator())
            },
            fixture.scratch_root(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::MissingDependency { ref program } if program == "deno"));
        assert!(!located.get());
        assert_eq!(scratch_entries(&fixture), 0);
    }

    #[test]
    fn request_builder_defaults_stream_output_without_timeout() {
        let request = RlmRequest::new("q");
        assert!(request.verbose);
        assert!(request.prefix.is_none());
        assert!(request.config.is_none());
        assert!(request.timeout.is_none());
    }
}
