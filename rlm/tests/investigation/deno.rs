//! Investigation tests for the real `deno run src/subagents.ts` engine.
//!
//! # Prerequisites
//!
//! - Deno installed (`curl -fsSL https://deno.land/install.sh | sh`)
//! - An engine checkout containing `deno.json`, pointed to by `RLM_ENGINE_DIR`
//! - Model API credentials configured for the engine
//!
//! # Running
//!
//! ```bash
//! RLM_ENGINE_DIR=../fast-rlm cargo test --test investigation -- --ignored
//! ```

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use rlm::io::backend::DenoBackend;
use rlm::io::locator::FixedEngineDir;
use rlm::{Rlm, RlmConfig, RlmRequest};

/// Generous bound for a small query (LLM latency dominates).
const ENGINE_TIMEOUT: Duration = Duration::from_secs(300);

fn engine_dir() -> PathBuf {
    PathBuf::from(std::env::var_os("RLM_ENGINE_DIR").expect("set RLM_ENGINE_DIR"))
}

/// Verifies that the Deno runtime resolves and runs.
#[test]
#[ignore]
fn deno_available() {
    let backend = DenoBackend::discover().expect("deno on PATH");
    let output = Command::new(backend.runtime().program())
        .args(backend.runtime().leading_args())
        .arg("--version")
        .output()
        .expect("run deno --version");

    assert!(
        output.status.success(),
        "deno --version failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    println!("{}", String::from_utf8_lossy(&output.stdout).trim());
}

/// Runs a trivial query end to end and checks the documented output shape.
#[test]
#[ignore]
fn small_query_returns_results_and_usage() {
    let backend = DenoBackend::discover().expect("deno on PATH");
    let temp = tempfile::tempdir().expect("tempdir");
    let rlm = Rlm::new(FixedEngineDir(engine_dir()), backend)
        .expect("client")
        .with_log_dir(temp.path().join("logs"));
    let config = RlmConfig {
        max_depth: 1,
        max_money_spent: 0.05,
        ..RlmConfig::default()
    };

    let result = rlm
        .run(
            &RlmRequest::new("What is 2 + 2? Answer with a single number.")
                .with_prefix("investigation")
                .with_config(config)
                .with_verbose(false)
                .with_timeout(ENGINE_TIMEOUT),
        )
        .expect("run");

    assert!(result.get("results").is_some(), "missing results: {result}");
    assert!(result.get("usage").is_some(), "missing usage: {result}");
}
