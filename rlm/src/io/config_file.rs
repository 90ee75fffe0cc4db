//! Bundled default config (`rlm_config.yaml`) and merged config files.

use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::{debug, instrument};

use crate::core::config::{ConfigOverrides, RlmConfig, merge_config};
use crate::error::{Error, Result};
use crate::io::locator::EngineLocator;

/// Default config file shipped in the engine directory.
pub const DEFAULT_CONFIG_FILE: &str = "rlm_config.yaml";

/// Load a YAML mapping. A missing file or empty document is an empty mapping.
pub fn load_config_mapping(path: &Path) -> Result<Mapping> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using empty mapping");
        return Ok(Mapping::new());
    }
    let contents = fs::read_to_string(path)
        .map_err(|err| Error::io(format!("read {}", path.display()), err))?;
    if contents.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml::from_str(&contents)
        .map_err(|err| Error::yaml(format!("parse {}", path.display()), err))?;
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(Error::Config(format!(
            "{} must contain a mapping of config keys",
            path.display()
        ))),
    }
}

/// Merge `overrides` over the engine's bundled defaults and write the result to `dest`.
///
/// A missing default file is an empty base; hard-coded defaults are not
/// substituted here.
#[instrument(skip_all, fields(dest = %dest.display()))]
pub fn write_merged_config(
    engine_dir: &Path,
    overrides: &ConfigOverrides,
    dest: &Path,
) -> Result<()> {
    let overrides = overrides.to_mapping()?;
    let defaults = load_config_mapping(&engine_dir.join(DEFAULT_CONFIG_FILE))?;
    let merged = merge_config(&defaults, &overrides);
    debug!(
        default_keys = defaults.len(),
        override_keys = overrides.len(),
        merged_keys = merged.len(),
        "merged config"
    );

    let buf = serde_yaml::to_string(&merged).map_err(|err| Error::yaml("serialize config", err))?;
    fs::write(dest, buf).map_err(|err| Error::io(format!("write {}", dest.display()), err))
}

/// Effective defaults for inspection.
///
/// Best-effort: any failure (engine not found, unreadable or malformed file,
/// wrongly typed keys) falls back to [`RlmConfig::default`]. The invocation
/// path does not use this.
pub fn load_default_config<L: EngineLocator>(locator: &L) -> RlmConfig {
    match try_load_default_config(locator) {
        Ok(cfg) => cfg,
        Err(err) => {
            debug!(err = %err, "falling back to built-in config defaults");
            RlmConfig::default()
        }
    }
}

fn try_load_default_config<L: EngineLocator>(locator: &L) -> Result<RlmConfig> {
    let engine_dir = locator.locate()?;
    let mapping = load_config_mapping(&engine_dir.join(DEFAULT_CONFIG_FILE))?;
    RlmConfig::from_mapping(&mapping)
}
