//! Launcher for the recursive language-model engine.
//!
//! The engine is an external Deno program. This crate finds it, merges caller
//! overrides over its bundled `rlm_config.yaml`, runs it with the query on
//! stdin, and returns the JSON document it writes. The split mirrors the
//! usual one:
//!
//! - **[`core`]**: Pure logic (config merge, command line, output interpretation).
//! - **[`io`]**: Side effects (engine lookup, `PATH` resolution, config files,
//!   process execution, transient files). Behind traits where tests need fakes.
//!
//! [`invoke`] ties both together into a single blocking call.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod invoke;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::config::{ConfigOverrides, RlmConfig};
pub use crate::error::{Error, Result};
pub use crate::invoke::{Rlm, RlmRequest, run};
