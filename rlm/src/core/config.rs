//! Engine configuration record and the key-by-key override merge.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Tunables understood by the engine (`rlm_config.yaml`).
///
/// Missing fields fall back to the hard-coded defaults below, and unknown keys
/// are ignored when a mapping is turned into a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RlmConfig {
    /// Model used by the top-level agent.
    pub primary_agent: String,
    /// Model used for delegated sub-calls.
    pub sub_agent: String,
    /// Bound on recursive delegation depth.
    pub max_depth: u32,
    pub max_calls_per_subagent: u32,
    /// Characters kept when truncating intermediate text.
    pub truncate_len: u32,
    /// Spending ceiling for a single query, in dollars.
    pub max_money_spent: f64,
    /// Concurrency fan-out bound for child agents.
    pub max_parallel_children: u32,
    pub parallel_batch_window_ms: u64,
}

impl Default for RlmConfig {
    fn default() -> Self {
        Self {
            primary_agent: "z-ai/glm-5".to_string(),
            sub_agent: "minimax/minimax-m2.5".to_string(),
            max_depth: 3,
            max_calls_per_subagent: 20,
            truncate_len: 2000,
            max_money_spent: 1.0,
            max_parallel_children: 5,
            parallel_batch_window_ms: 100,
        }
    }
}

impl RlmConfig {
    pub fn validate(&self) -> Result<()> {
        if self.primary_agent.trim().is_empty() {
            return Err(Error::Config("primary_agent must be non-empty".to_string()));
        }
        if self.sub_agent.trim().is_empty() {
            return Err(Error::Config("sub_agent must be non-empty".to_string()));
        }
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be > 0".to_string()));
        }
        if self.max_calls_per_subagent == 0 {
            return Err(Error::Config(
                "max_calls_per_subagent must be > 0".to_string(),
            ));
        }
        if self.truncate_len == 0 {
            return Err(Error::Config("truncate_len must be > 0".to_string()));
        }
        if !(self.max_money_spent.is_finite() && self.max_money_spent > 0.0) {
            return Err(Error::Config("max_money_spent must be > 0".to_string()));
        }
        if self.max_parallel_children == 0 {
            return Err(Error::Config("max_parallel_children must be > 0".to_string()));
        }
        Ok(())
    }

    /// Build a record from a raw mapping, ignoring keys outside the schema.
    pub fn from_mapping(mapping: &Mapping) -> Result<Self> {
        serde_yaml::from_value(Value::Mapping(mapping.clone()))
            .map_err(|err| Error::yaml("decode config record", err))
    }

    /// Every field of the record, in declaration order.
    pub fn to_mapping(&self) -> Result<Mapping> {
        match serde_yaml::to_value(self).map_err(|err| Error::yaml("encode config record", err))? {
            Value::Mapping(mapping) => Ok(mapping),
            other => Err(Error::Config(format!(
                "config record encoded as {other:?}, expected a mapping"
            ))),
        }
    }
}

/// Caller-supplied configuration layered over the bundled defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOverrides {
    /// A full record; every field overrides the bundled default.
    Record(RlmConfig),
    /// Raw keys, passed through verbatim (unknown keys included).
    Raw(Mapping),
}

impl ConfigOverrides {
    /// Flatten into the mapping that gets merged over the defaults.
    ///
    /// Records are validated first; raw mappings are not interpreted.
    pub fn to_mapping(&self) -> Result<Mapping> {
        match self {
            Self::Record(cfg) => {
                cfg.validate()?;
                cfg.to_mapping()
            }
            Self::Raw(mapping) => Ok(mapping.clone()),
        }
    }
}

impl From<RlmConfig> for ConfigOverrides {
    fn from(cfg: RlmConfig) -> Self {
        Self::Record(cfg)
    }
}

impl From<Mapping> for ConfigOverrides {
    fn from(mapping: Mapping) -> Self {
        Self::Raw(mapping)
    }
}

/// Shallow merge: override values win, default-only keys keep their position,
/// override-only keys are appended in override order.
pub fn merge_config(defaults: &Mapping, overrides: &Mapping) -> Mapping {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
