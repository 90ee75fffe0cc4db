//! Filesystem and process side of engine invocation.

pub mod backend;
pub mod config_file;
pub mod locator;
pub mod process;
pub mod runtime;
pub mod scratch;
