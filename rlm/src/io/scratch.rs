//! Per-invocation transient files.
//!
//! Each invocation owns one uniquely named temporary directory that holds the
//! output file the engine writes and, when overrides are given, the merged
//! config file. Removing the directory releases both, on close or on drop.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const SCRATCH_PREFIX: &str = "rlm-";
const OUTPUT_FILE: &str = "output.json";
const CONFIG_FILE: &str = "config.yaml";

/// Scoped owner of an invocation's transient files.
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// Create a fresh scratch directory under `root`.
    pub fn create(root: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)
            .map_err(|err| Error::io(format!("create scratch dir in {}", root.display()), err))?;
        debug!(dir = %dir.path().display(), "created scratch dir");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the engine must write its JSON output. Not created here.
    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_FILE)
    }

    /// Where the merged config is written when overrides are supplied.
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join(CONFIG_FILE)
    }

    /// Remove the directory and everything in it.
    ///
    /// Failures are logged rather than returned so they never mask the
    /// invocation's own outcome.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(dir = %path.display(), "removed scratch dir"),
            Err(err) => warn!(dir = %path.display(), err = %err, "failed to remove scratch dir"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn close_removes_output_and_config() {
        let root = tempfile::tempdir().expect("tempdir");
        let scratch = Scratch::create(root.path()).expect("scratch");
        fs::write(scratch.output_path(), "{}").expect("output");
        fs::write(scratch.config_path(), "a: 1\n").expect("config");
        let output = scratch.output_path();
        let config = scratch.config_path();

        scratch.close();

        assert!(!output.exists());
        assert!(!config.exists());
        assert_eq!(fs::read_dir(root.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn drop_removes_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = {
            let scratch = Scratch::create(root.path()).expect("scratch");
            fs::write(scratch.output_path(), "{}").expect("output");
            scratch.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn concurrent_scratches_do_not_collide() {
        let root = tempfile::tempdir().expect("tempdir");
        let a = Scratch::create(root.path()).expect("a");
        let b = Scratch::create(root.path()).expect("b");
        assert_ne!(a.output_path(), b.output_path());
        assert_ne!(a.config_path(), b.config_path());
    }

    #[test]
    fn output_path_is_not_precreated() {
        let root = tempfile::tempdir().expect("tempdir");
        let scratch = Scratch::create(root.path()).expect("scratch");
        assert!(!scratch.output_path().exists());
    }
}
