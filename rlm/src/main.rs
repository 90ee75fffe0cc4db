//! Command-line launcher for the recursive language-model engine.
//!
//! `rlm run` feeds a query to the engine and prints the JSON result on
//! stdout. `rlm defaults` and `rlm locate` inspect the installation.

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rlm::exit_codes;
use rlm::io::backend::DenoBackend;
use rlm::io::config_file::{load_config_mapping, load_default_config};
use rlm::io::locator::{EngineLocator, FixedEngineDir, InstallLayout};
use rlm::{ConfigOverrides, Rlm, RlmRequest};
use serde_yaml::{Mapping, Value};

#[derive(Parser)]
#[command(
    name = "rlm",
    version,
    about = "Run queries through the recursive language-model engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a query and print the engine's JSON result.
    Run(RunArgs),
    /// Print the effective default config as YAML.
    Defaults(EngineDirArgs),
    /// Print the engine directory.
    Locate(EngineDirArgs),
}

#[derive(Args)]
struct EngineDirArgs {
    /// Use this engine directory instead of searching next to the binary.
    #[arg(long, env = "RLM_ENGINE_DIR")]
    engine_dir: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    /// Query text, passed through as-is (empty is allowed). Read from stdin
    /// when omitted.
    query: Option<String>,

    /// Log filename prefix.
    #[arg(long)]
    prefix: Option<String>,

    /// YAML file with config overrides.
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Override a single config key, e.g. `--set max_depth=5`. Repeatable;
    /// applied after `--config-file`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Capture engine output instead of streaming it to the terminal.
    #[arg(short, long)]
    quiet: bool,

    /// Kill the engine after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(flatten)]
    engine: EngineDirArgs,
}

fn main() {
    rlm::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        let code = err
            .downcast_ref::<rlm::Error>()
            .map_or(exit_codes::FAILURE, exit_codes::for_error);
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Defaults(args) => cmd_defaults(&args),
        Command::Locate(args) => cmd_locate(&args),
    }
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let query = match args.query {
        Some(query) => query,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read query from stdin")?;
            buf
        }
    };
    let mut request = RlmRequest::new(query).with_verbose(!args.quiet);
    request.prefix = args.prefix;
    request.config = build_overrides(args.config_file.as_deref(), &args.set)?;
    request.timeout = args.timeout_secs.map(Duration::from_secs);

    // Resolve the runtime before anything touches the filesystem.
    let backend = DenoBackend::discover()?;
    let locator = engine_locator(&args.engine)?;
    let result = Rlm::new(&*locator, backend)?.run(&request)?;

    let payload = serde_json::to_string_pretty(&result).context("serialize result")?;
    println!("{payload}");
    Ok(())
}

fn cmd_defaults(args: &EngineDirArgs) -> Result<()> {
    let locator = engine_locator(args)?;
    let cfg = load_default_config(&&*locator);
    let payload = serde_yaml::to_string(&cfg).context("serialize defaults")?;
    print!("{payload}");
    Ok(())
}

fn cmd_locate(args: &EngineDirArgs) -> Result<()> {
    let dir = engine_locator(args)?.locate()?;
    println!("{}", dir.display());
    Ok(())
}

fn engine_locator(args: &EngineDirArgs) -> Result<Box<dyn EngineLocator>> {
    Ok(match &args.engine_dir {
        Some(dir) => Box::new(FixedEngineDir(dir.clone())),
        None => Box::new(InstallLayout::from_current_exe()?),
    })
}

/// Layer `--set` pairs over an optional overrides file. `None` when neither is given.
fn build_overrides(
    config_file: Option<&std::path::Path>,
    pairs: &[String],
) -> Result<Option<ConfigOverrides>> {
    if config_file.is_none() && pairs.is_empty() {
        return Ok(None);
    }

    let mut mapping = match config_file {
        Some(path) => {
            if !fs::metadata(path).is_ok_and(|meta| meta.is_file()) {
                bail!("config file not found: {}", path.display());
            }
            load_config_mapping(path)?
        }
        None => Mapping::new(),
    };
    for pair in pairs {
        let (key, value) = parse_set(pair)?;
        mapping.insert(Value::String(key), value);
    }
    Ok(Some(ConfigOverrides::Raw(mapping)))
}

/// Parse `key=value`; the value is read as a YAML scalar (`5` is a number).
fn parse_set(pair: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = pair.split_once('=') else {
        bail!("expected KEY=VALUE, got `{pair}`");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("empty key in `{pair}`");
    }
    let value = match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::Null) if !raw.trim().is_empty() => Value::Null,
        Ok(Value::Null) => Value::String(String::new()),
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "rlm",
            "run",
            "hello",
            "--prefix",
            "p",
            "--set",
            "max_depth=5",
            "--set",
            "sub_agent=x",
            "--quiet",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.query.as_deref(), Some("hello"));
        assert_eq!(args.prefix.as_deref(), Some("p"));
        assert_eq!(args.set, vec!["max_depth=5", "sub_agent=x"]);
        assert!(args.quiet);
    }

    #[test]
    fn parse_set_reads_yaml_scalars() {
        assert_eq!(parse_set("max_depth=5").expect("int").1, Value::from(5));
        assert_eq!(
            parse_set("max_money_spent=2.5").expect("float").1,
            Value::from(2.5)
        );
        assert_eq!(
            parse_set("primary_agent=z-ai/glm-5").expect("str").1,
            Value::from("z-ai/glm-5")
        );
        assert_eq!(parse_set("note=").expect("empty").1, Value::from(""));
        assert_eq!(parse_set("list=[1, 2]").expect("seq").1, Value::from("[1, 2]"));
    }

    #[test]
    fn parse_set_rejects_missing_key() {
        assert!(parse_set("=5").is_err());
        assert!(parse_set("max_depth").is_err());
    }

    #[test]
    fn no_overrides_yields_none() {
        assert!(build_overrides(None, &[]).expect("build").is_none());
    }

    #[test]
    fn set_pairs_override_file_values() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("overrides.yaml");
        fs::write(&path, "max_depth: 2\ntruncate_len: 10\n").expect("write");

        let overrides = build_overrides(Some(&path), &["max_depth=8".to_string()])
            .expect("build")
            .expect("some");
        let ConfigOverrides::Raw(mapping) = overrides else {
            panic!("expected raw overrides");
        };
        assert_eq!(mapping.get("max_depth"), Some(&Value::from(8)));
        assert_eq!(mapping.get("truncate_len"), Some(&Value::from(10)));
    }

    #[test]
    fn missing_overrides_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = build_overrides(Some(&temp.path().join("nope.yaml")), &[]).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
