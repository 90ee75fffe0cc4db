//! Test-only helpers: engine directory fixtures and an in-process backend.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

use crate::error::Result;
use crate::io::backend::{ComputeBackend, EngineExit, EngineRequest};
use crate::io::config_file::DEFAULT_CONFIG_FILE;
use crate::io::locator::{ENGINE_MARKER, FixedEngineDir};

/// Temporary layout with an engine directory and an empty scratch root.
pub struct EngineFixture {
    temp: TempDir,
}

impl EngineFixture {
    /// Create `engine/` (with marker and optional `rlm_config.yaml`) and `scratch/`.
    pub fn new(defaults: Option<&str>) -> std::io::Result<Self> {
        let temp = tempfile::tempdir()?;
        let fixture = Self { temp };
        fs::create_dir_all(fixture.engine_dir())?;
        fs::create_dir_all(fixture.scratch_root())?;
        fs::write(fixture.engine_dir().join(ENGINE_MARKER), "{}\n")?;
        if let Some(contents) = defaults {
            fs::write(fixture.engine_dir().join(DEFAULT_CONFIG_FILE), contents)?;
        }
        Ok(fixture)
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn engine_dir(&self) -> PathBuf {
        self.temp.path().join("engine")
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.temp.path().join("scratch")
    }

    pub fn locator(&self) -> FixedEngineDir {
        FixedEngineDir(self.engine_dir())
    }
}

/// Number of entries left under the fixture's scratch root.
pub fn scratch_entries(fixture: &EngineFixture) -> usize {
    fs::read_dir(fixture.scratch_root())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

/// What a [`CannedBackend`] writes to the output path.
#[derive(Debug, Clone)]
pub enum CannedOutput {
    Json(Value),
    Raw(String),
    Nothing,
}

/// Backend that writes a fixed output file and records every request.
///
/// The merged config file is read during `invoke`, since it is gone by the
/// time the call returns.
#[derive(Debug)]
pub struct CannedBackend {
    output: CannedOutput,
    exit: EngineExit,
    requests: RefCell<Vec<EngineRequest>>,
    configs: RefCell<Vec<Option<String>>>,
}

impl CannedBackend {
    pub fn new(output: CannedOutput) -> Self {
        Self {
            output,
            exit: EngineExit {
                exit_code: Some(0),
                stderr: Some(String::new()),
                timed_out: false,
            },
            requests: RefCell::new(Vec::new()),
            configs: RefCell::new(Vec::new()),
        }
    }

    pub fn writing(document: Value) -> Self {
        Self::new(CannedOutput::Json(document))
    }

    pub fn raw(contents: &str) -> Self {
        Self::new(CannedOutput::Raw(contents.to_string()))
    }

    /// Exit with `exit_code` and `stderr` without writing any output.
    pub fn silent(exit_code: i32, stderr: &str) -> Self {
        let mut backend = Self::new(CannedOutput::Nothing);
        backend.exit = EngineExit {
            exit_code: Some(exit_code),
            stderr: Some(stderr.to_string()),
            timed_out: false,
        };
        backend
    }

    pub fn timing_out(mut self) -> Self {
        self.exit.timed_out = true;
        self.exit.exit_code = None;
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.borrow().clone()
    }

    /// Contents of the config file passed to each call, if any.
    pub fn configs_seen(&self) -> Vec<Option<String>> {
        self.configs.borrow().clone()
    }
}

impl ComputeBackend for CannedBackend {
    fn invoke(&self, request: &EngineRequest) -> Result<EngineExit> {
        self.requests.borrow_mut().push(request.clone());
        let config = request
            .config_path
            .as_ref()
            .and_then(|path| fs::read_to_string(path).ok());
        self.configs.borrow_mut().push(config);

        let contents = match &self.output {
            CannedOutput::Json(value) => Some(value.to_string()),
            CannedOutput::Raw(text) => Some(text.clone()),
            CannedOutput::Nothing => None,
        };
        if let Some(contents) = contents {
            fs::write(&request.output_path, contents).map_err(|err| {
                crate::error::Error::io(
                    format!("write canned output {}", request.output_path.display()),
                    err,
                )
            })?;
        }
        Ok(self.exit.clone())
    }
}
