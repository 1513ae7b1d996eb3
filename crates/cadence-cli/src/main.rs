//! `cadence` command-line interface

use anyhow::{bail, Context, Result};
use cadence_ir::{validate_artifact, ArtifactIr};
use cadence_patch::{apply_patches, IrTarget, PatchList};
use cadence_revision::{
    check_outline, compute_ir_hash, parse_regen_tokens, FsContextStore, GenerationProvider, MockGenerator,
    MockRepairer, ProviderError, ProviderKind, ProvenanceLog, RevisionConfig, RevisionOrchestrator, RevisionRequest,
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let path = |name: &'static str, help: &'static str| {
        Arg::new(name)
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help(help)
    };
    let store = Arg::new("store")
        .long("store")
        .default_value(".cadence")
        .value_parser(value_parser!(PathBuf))
        .help("Directory holding per-scope context files");
    let scope = Arg::new("scope")
        .long("scope")
        .required(true)
        .help("Project scope the revision log belongs to");

    Command::new("cadence")
        .version(cadence_revision::VERSION)
        .about("Structured artifact IR with fail-closed patching and revision provenance")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML revision config"),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate an artifact IR file against the schema")
                .arg(path("ir", "Artifact IR JSON file")),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply a patch list to an artifact IR and print the result")
                .arg(path("ir", "Artifact IR JSON file"))
                .arg(path("patches", "Patch list JSON file ({\"patches\": [...]})")),
        )
        .subcommand(
            Command::new("outline")
                .about("Compare the heading skeletons of two artifact IR files")
                .arg(path("before", "Original artifact IR"))
                .arg(path("after", "Revised artifact IR")),
        )
        .subcommand(
            Command::new("hash")
                .about("Print the canonical SHA-256 of an artifact IR")
                .arg(path("ir", "Artifact IR JSON file")),
        )
        .subcommand(
            Command::new("tokens")
                .about("Show the revision mode an instruction selects")
                .arg(Arg::new("instruction").required(true).help("Instruction text")),
        )
        .subcommand(
            Command::new("revise")
                .about("Revise an artifact IR and record the revision")
                .arg(
                    Arg::new("ir")
                        .long("ir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Artifact IR JSON file"),
                )
                .arg(
                    Arg::new("instruction")
                        .long("instruction")
                        .required(true)
                        .help("Instruction, optionally with [[...]] mode tokens"),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .required(true)
                        .value_parser(value_parser!(IrTarget))
                        .help("Target as block:<id> or section:<id>"),
                )
                .arg(scope.clone())
                .arg(store.clone())
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the revised IR here instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("log")
                .about("Print the revision log of a scope")
                .arg(scope)
                .arg(store),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));

    match run(&matches).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(matches: &ArgMatches) -> Result<ExitCode> {
    match matches.subcommand() {
        Some(("validate", args)) => {
            let value = read_json(path_arg(args, "ir")?)?;
            let report = validate_artifact(&value);
            if report.valid {
                println!("valid");
                return Ok(ExitCode::SUCCESS);
            }
            for error in &report.errors {
                println!("{error}");
            }
            Ok(ExitCode::FAILURE)
        }
        Some(("apply", args)) => {
            let ir = read_ir(path_arg(args, "ir")?)?;
            let patches_path = path_arg(args, "patches")?;
            let raw = read_text(patches_path)?;
            let list = PatchList::parse(&raw).with_context(|| format!("invalid patches in {}", patches_path.display()))?;
            let revised = apply_patches(&ir, &list.patches)?;
            print_json(&revised)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("outline", args)) => {
            let before = read_ir(path_arg(args, "before")?)?;
            let after = read_ir(path_arg(args, "after")?)?;
            let report = check_outline(&before, &after, &[]);
            if report.valid {
                println!("outline unchanged");
                return Ok(ExitCode::SUCCESS);
            }
            for violation in &report.violations {
                println!("{violation}");
            }
            Ok(ExitCode::FAILURE)
        }
        Some(("hash", args)) => {
            let ir = read_ir(path_arg(args, "ir")?)?;
            println!("{}", compute_ir_hash(&ir)?);
            Ok(ExitCode::SUCCESS)
        }
        Some(("tokens", args)) => {
            let instruction = args
                .get_one::<String>("instruction")
                .context("missing instruction")?;
            print_json(&parse_regen_tokens(instruction))?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("revise", args)) => revise(matches, args).await,
        Some(("log", args)) => {
            let config = load_config(matches)?;
            let log = provenance_log(args, &config)?;
            let scope = args.get_one::<String>("scope").context("missing --scope")?;
            let records = log.read(scope).await?;
            print_json(&records)?;
            Ok(ExitCode::SUCCESS)
        }
        _ => bail!("unknown subcommand"),
    }
}

async fn revise(matches: &ArgMatches, args: &ArgMatches) -> Result<ExitCode> {
    let config = load_config(matches)?;
    let ir = read_ir(path_arg(args, "ir")?)?;
    let instruction = args
        .get_one::<String>("instruction")
        .context("missing --instruction")?;
    let target = args.get_one::<IrTarget>("target").context("missing --target")?;
    let scope = args.get_one::<String>("scope").context("missing --scope")?;

    let log = provenance_log(args, &config)?;
    let orchestrator = RevisionOrchestrator::with_config(generator(config.provider)?, Arc::new(MockRepairer), config);
    let request = RevisionRequest::from_instruction(ir, instruction, target.clone());
    info!(mode = %request.mode, %target, scope = %scope, "revising");

    let result = orchestrator
        .revise_recorded(&log, scope, &request)
        .await
        .context("revision failed")?;

    let rendered = result.ir.to_json_string()?;
    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), patches = result.patches.len(), "revised IR written");
        }
        None => println!("{rendered}"),
    }
    Ok(ExitCode::SUCCESS)
}

/// Generation capability for the configured provider
///
/// Only the offline mock is built into this binary.
fn generator(kind: ProviderKind) -> Result<Arc<dyn GenerationProvider>> {
    match kind {
        ProviderKind::Mock => Ok(Arc::new(MockGenerator)),
        other => Err(ProviderError::unavailable(other.as_str(), "no network client is built into this binary").into()),
    }
}

fn load_config(matches: &ArgMatches) -> Result<RevisionConfig> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => RevisionConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RevisionConfig::default(),
    };
    let config = config.with_env();
    debug!(provider = %config.provider, model = ?config.model, "config loaded");
    Ok(config)
}

fn provenance_log(args: &ArgMatches, config: &RevisionConfig) -> Result<ProvenanceLog> {
    let root = path_arg(args, "store")?;
    Ok(ProvenanceLog::with_capacity(
        Arc::new(FsContextStore::new(root)),
        config.log_capacity,
    ))
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    args.get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .with_context(|| format!("missing argument <{name}>"))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_json(path: &Path) -> Result<Value> {
    serde_json::from_str(&read_text(path)?).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Load a schema-valid artifact IR
fn read_ir(path: &Path) -> Result<ArtifactIr> {
    let value = read_json(path)?;
    if let Err(errors) = validate_artifact(&value).into_result() {
        bail!("{} is not a valid artifact IR: {}", path.display(), errors.join("; "));
    }
    Ok(ArtifactIr::from_value(value)?)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
