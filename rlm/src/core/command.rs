//! Engine command-line construction.

use std::ffi::OsString;
use std::path::Path;

/// Script the runtime executes, relative to the engine directory.
pub const ENTRY_POINT: &str = "src/subagents.ts";

/// Permissions granted to the engine process.
pub const CAPABILITY_FLAGS: [&str; 5] = [
    "--allow-read",
    "--allow-env",
    "--allow-net",
    "--allow-sys=hostname,osRelease",
    "--allow-write",
];

/// Per-invocation inputs that vary between runs.
#[derive(Debug, Clone, Copy)]
pub struct EngineArgs<'a> {
    pub log_dir: &'a Path,
    pub output_path: &'a Path,
    pub prefix: Option<&'a str>,
    pub config_path: Option<&'a Path>,
}

/// Arguments following the runtime prefix:
/// `run <capabilities> <entry> --log-dir D --output O [--prefix P] [--config C]`.
pub fn engine_args(args: &EngineArgs<'_>) -> Vec<OsString> {
    let mut out: Vec<OsString> = Vec::with_capacity(16);
    out.push("run".into());
    out.extend(CAPABILITY_FLAGS.iter().map(OsString::from));
    out.push(ENTRY_POINT.into());
    out.push("--log-dir".into());
    out.push(args.log_dir.into());
    out.push("--output".into());
    out.push(args.output_path.into());
    if let Some(prefix) = args.prefix.filter(|p| !p.is_empty()) {
        out.push("--prefix".into());
        out.push(prefix.into());
    }
    if let Some(config_path) = args.config_path {
        out.push("--config".into());
        out.push(config_path.into());
    }
    out
}
