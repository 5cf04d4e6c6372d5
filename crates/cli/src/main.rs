use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use intake_engine::config::{default_config_path, load_config_from_path};
use intake_engine::{DEFAULT_SECTIONS, DatasetCache, FilterOptions, FilterSelection, SurveyPipeline, build_report};
use intake_types::Dataset;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(default_config_path);
    debug!(path = %config_path.display(), "loading configuration");
    let config = load_config_from_path(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    let pipeline = SurveyPipeline::from_config(&config, Arc::new(DatasetCache::new())).context("failed to build the pipeline")?;

    match matches.subcommand() {
        Some(("fetch", sub)) => run_fetch(&pipeline, sub).await,
        Some(("lists", _)) => run_lists(&pipeline).await,
        Some(("options", _)) => run_options(&pipeline).await,
        Some(("summary", sub)) => run_summary(&pipeline, sub).await,
        _ => anyhow::bail!("expected a subcommand; see --help"),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let timeout = Arg::new("timeout-seconds")
        .long("timeout-seconds")
        .value_parser(value_parser!(u64).range(1..))
        .action(ArgAction::Set)
        .help("Give up waiting for the dataset after N seconds");

    Command::new("intake")
        .about("Survey intake dataset client")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Set)
                .help("Path to config.json (defaults to $INTAKE_CONFIG_PATH or the user config dir)"),
        )
        .subcommand(
            Command::new("fetch")
                .about("Print the dataset as a JSON array of rows")
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .action(ArgAction::SetTrue)
                        .help("Pretty-print the JSON output"),
                )
                .arg(timeout.clone()),
        )
        .subcommand(Command::new("lists").about("List the display names of every list in the configured site"))
        .subcommand(Command::new("options").about("Print the available course, shift and term filter values"))
        .subcommand(
            Command::new("summary")
                .about("Print response counts per report section")
                .arg(Arg::new("course").long("course").action(ArgAction::Set).help("Only this course"))
                .arg(Arg::new("shift").long("shift").action(ArgAction::Set).help("Only this shift"))
                .arg(
                    Arg::new("term")
                        .long("term")
                        .action(ArgAction::Set)
                        .help("Only this academic term, e.g. 2024-1"),
                )
                .arg(timeout),
        )
}

async fn load(pipeline: &SurveyPipeline, matches: &ArgMatches) -> Result<Dataset> {
    let dataset = match matches.get_one::<u64>("timeout-seconds") {
        Some(seconds) => pipeline.load_within(Duration::from_secs(*seconds)).await,
        None => pipeline.load().await,
    };
    dataset.with_context(|| format!("failed to load {}", pipeline.source()))
}

async fn run_fetch(pipeline: &SurveyPipeline, matches: &ArgMatches) -> Result<()> {
    let dataset = load(pipeline, matches).await?;
    let output = if matches.get_flag("pretty") {
        serde_json::to_string_pretty(&dataset)?
    } else {
        serde_json::to_string(&dataset)?
    };
    println!("{output}");
    Ok(())
}

async fn run_lists(pipeline: &SurveyPipeline) -> Result<()> {
    let names = pipeline
        .available_lists()
        .await
        .context("failed to enumerate lists")?;
    for name in names {
        println!("{name}");
    }
    Ok(())
}

async fn run_options(pipeline: &SurveyPipeline) -> Result<()> {
    let dataset = pipeline.load().await.context("failed to load the dataset")?;
    let options = FilterOptions::from_dataset(&dataset);
    println!("{}", serde_json::to_string_pretty(&options)?);
    Ok(())
}

async fn run_summary(pipeline: &SurveyPipeline, matches: &ArgMatches) -> Result<()> {
    let dataset = load(pipeline, matches).await?;
    let selection = FilterSelection::new(
        matches.get_one::<String>("course").map(String::as_str),
        matches.get_one::<String>("shift").map(String::as_str),
        matches.get_one::<String>("term").map(String::as_str),
    );
    let filtered = selection.apply(&dataset);
    let report = build_report(&filtered, DEFAULT_SECTIONS);

    print!("{}", report.render());
    Ok(())
}
