//! Engine directory discovery.
//!
//! The engine ships either bundled next to the installed binary (`_engine/`)
//! or, in a development checkout, at the project root above the build output.
//! Both are recognised by the `deno.json` manifest.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Manifest file that marks a directory as the engine root.
pub const ENGINE_MARKER: &str = "deno.json";

/// Name of the bundled engine directory next to the installed binary.
pub const BUNDLED_DIR: &str = "_engine";

/// Strategy for finding the engine directory.
pub trait EngineLocator {
    /// Return the directory holding the engine. Must not touch the filesystem
    /// beyond existence checks.
    fn locate(&self) -> Result<PathBuf>;
}

impl<L: EngineLocator + ?Sized> EngineLocator for &L {
    fn locate(&self) -> Result<PathBuf> {
        (**self).locate()
    }
}

/// Bundled-then-development lookup anchored at an install directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    install_dir: PathBuf,
}

impl InstallLayout {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    /// Anchor the lookup at the directory of the running executable.
    pub fn from_current_exe() -> Result<Self> {
        let exe = std::env::current_exe().map_err(|err| Error::io("resolve current exe", err))?;
        // Symlinked installs should resolve relative to the real binary.
        let exe = exe.canonicalize().unwrap_or(exe);
        let dir = exe
            .parent()
            .ok_or_else(|| Error::Config(format!("executable has no parent {}", exe.display())))?;
        Ok(Self::new(dir))
    }

    pub fn bundled_dir(&self) -> PathBuf {
        self.install_dir.join(BUNDLED_DIR)
    }
}

impl EngineLocator for InstallLayout {
    fn locate(&self) -> Result<PathBuf> {
        let bundled = self.bundled_dir();
        if has_marker(&bundled) {
            debug!(dir = %bundled.display(), "using bundled engine");
            return Ok(bundled);
        }

        if let Some(root) = self.install_dir.ancestors().find(|dir| has_marker(dir)) {
            debug!(dir = %root.display(), "using development engine");
            return Ok(root.to_path_buf());
        }

        Err(Error::NotFound {
            marker: ENGINE_MARKER,
            bundled,
            search_root: self.install_dir.clone(),
        })
    }
}

/// Explicitly configured engine directory (CLI flag or environment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedEngineDir(pub PathBuf);

impl EngineLocator for FixedEngineDir {
    fn locate(&self) -> Result<PathBuf> {
        if has_marker(&self.0) {
            return Ok(self.0.clone());
        }
        Err(Error::NotFound {
            marker: ENGINE_MARKER,
            bundled: self.0.clone(),
            search_root: self.0.clone(),
        })
    }
}

fn has_marker(dir: &Path) -> bool {
    dir.join(ENGINE_MARKER).is_file()
}
