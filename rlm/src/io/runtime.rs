//! Runtime executable lookup and invocation prefix.
//!
//! On Windows, package managers commonly expose `deno` as a `.cmd` shim.
//! `CreateProcess` cannot start those directly, so they are routed through the
//! command interpreter instead.
//!
//! Arguments after `cmd /C` are parsed by the shell, and std's batch-file
//! escaping does not apply because `cmd.exe` is the program. Rather than
//! escaping for cmd, arguments containing shell metacharacters are refused
//! for shell-routed runtimes. A user name or temp dir containing `&` or `%`
//! therefore cannot run a shim-installed runtime.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Name of the runtime executable.
pub const RUNTIME_PROGRAM: &str = "deno";

const DEFAULT_PATHEXT: &str = ".COM;.EXE;.BAT;.CMD";

/// Characters `cmd.exe` interprets outside of (or despite) double quotes.
const SHELL_METACHARS: &[char] = &['&', '|', '<', '>', '^', '%', '!', '"', '\r', '\n'];

/// Operating-system family that decides lookup and launch rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }
}

/// Program plus leading arguments used to start the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInvocation {
    prefix: Vec<OsString>,
    via_shell: bool,
}

impl RuntimeInvocation {
    /// Use an explicit prefix, started directly. Returns `None` for an empty
    /// prefix.
    pub fn new(prefix: Vec<OsString>) -> Option<Self> {
        if prefix.is_empty() {
            return None;
        }
        Some(Self {
            prefix,
            via_shell: false,
        })
    }

    /// Invocation for a runtime already resolved to `resolved`.
    pub fn from_resolved(resolved: &Path, platform: Platform, comspec: Option<OsString>) -> Self {
        Self {
            prefix: invocation_prefix(resolved, platform, comspec),
            via_shell: platform == Platform::Windows && is_shell_shim(resolved),
        }
    }

    /// Resolve `deno` on the current `PATH`.
    pub fn discover() -> Result<Self> {
        let platform = Platform::current();
        let search_path = env::var_os("PATH").unwrap_or_default();
        let pathext = env::var_os("PATHEXT");
        let comspec = env::var_os("COMSPEC");
        Self::discover_in(&search_path, platform, pathext.as_deref(), comspec)
    }

    /// Resolve `deno` on an explicit search path.
    pub fn discover_in(
        search_path: &OsStr,
        platform: Platform,
        pathext: Option<&OsStr>,
        comspec: Option<OsString>,
    ) -> Result<Self> {
        let resolved = find_executable(RUNTIME_PROGRAM, search_path, platform, pathext)
            .ok_or_else(|| Error::MissingDependency {
                program: RUNTIME_PROGRAM.to_string(),
            })?;
        debug!(path = %resolved.display(), "resolved runtime");
        Ok(Self::from_resolved(&resolved, platform, comspec))
    }

    pub fn program(&self) -> &OsStr {
        &self.prefix[0]
    }

    /// Arguments that precede the engine arguments.
    pub fn leading_args(&self) -> &[OsString] {
        &self.prefix[1..]
    }

    /// Whether arguments pass through the command shell's parser.
    pub fn routes_through_shell(&self) -> bool {
        self.via_shell
    }

    /// Refuse arguments the command shell would interpret. A no-op for
    /// runtimes started directly.
    pub fn check_args<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<()> {
        if !self.via_shell {
            return Ok(());
        }
        for arg in args {
            let text = arg.as_ref().to_string_lossy();
            if let Some(ch) = text.chars().find(|ch| SHELL_METACHARS.contains(ch)) {
                return Err(Error::Config(format!(
                    "argument `{}` contains {ch:?}, which the command shell running \
                     the {RUNTIME_PROGRAM} shim would interpret",
                    text.escape_debug()
                )));
            }
        }
        Ok(())
    }
}

/// Find `name` in the directories of `search_path`.
///
/// On Windows each `PATHEXT` extension is tried in order after the bare name.
pub fn find_executable(
    name: &str,
    search_path: &OsStr,
    platform: Platform,
    pathext: Option<&OsStr>,
) -> Option<PathBuf> {
    let extensions: Vec<String> = match platform {
        Platform::Unix => Vec::new(),
        Platform::Windows => pathext
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_PATHEXT.to_string())
            .split(';')
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .map(str::to_string)
            .collect(),
    };

    for dir in env::split_paths(search_path) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        if platform == Platform::Unix || Path::new(name).extension().is_some() {
            let candidate = dir.join(name);
            if is_executable(&candidate, platform) {
                return Some(candidate);
            }
        }
        for ext in &extensions {
            let candidate = dir.join(format!("{name}{}", ext.to_ascii_lowercase()));
            if is_executable(&candidate, platform) {
                return Some(candidate);
            }
            let candidate = dir.join(format!("{name}{ext}"));
            if is_executable(&candidate, platform) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Build the launch prefix for a resolved runtime path.
pub fn invocation_prefix(
    resolved: &Path,
    platform: Platform,
    comspec: Option<OsString>,
) -> Vec<OsString> {
    if platform == Platform::Windows && is_shell_shim(resolved) {
        let shell = comspec.unwrap_or_else(|| OsString::from("cmd.exe"));
        debug!(shim = %resolved.display(), "routing runtime shim through command shell");
        return vec![shell, OsString::from("/C"), resolved.as_os_str().to_owned()];
    }
    vec![resolved.as_os_str().to_owned()]
}

fn is_shell_shim(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("cmd") || ext.eq_ignore_ascii_case("bat"))
}

fn is_executable(path: &Path, platform: Platform) -> bool {
    let Ok(meta) = path.metadata() else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    match platform {
        Platform::Windows => true,
        Platform::Unix => has_exec_bit(&meta),
    }
}

#[cfg(unix)]
fn has_exec_bit(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_exec_bit(_meta: &std::fs::Metadata) -> bool {
    true
}
