use std::{collections::BTreeMap, num::NonZeroUsize, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use plex_cli::{
    commands::stats as stats_cmd,
    config::{PlexConfig, RunOverrides, load_or_default, resolve_arguments, resolve_run},
};
use plex_core::Invocation;

#[derive(Debug, Parser)]
#[command(name = "plex", about = "Fan work out over items and collect the outcomes", version)]
struct Cli {
    /// Path to the configuration file (defaults to ./plex.toml when present)
    #[arg(short, long, env = "PLEX_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Count bytes, lines and words of every file under the given paths
    Stats(StatsArgs),
}

#[derive(Debug, Args)]
struct StatsArgs {
    /// Files or directories to scan (directories are read one level deep)
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Only include files with this extension
    #[arg(long, value_name = "EXT")]
    ext: Option<String>,

    /// Process files one at a time, in listing order
    #[arg(long)]
    sequential: bool,

    /// Report failed files instead of stopping at the first failure
    #[arg(long)]
    return_exceptions: bool,

    /// Maximum number of files processed at once
    #[arg(long, value_name = "N")]
    max_concurrency: Option<NonZeroUsize>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Stats(args) => handle_stats(&config, args).await?,
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_stats(config: &PlexConfig, args: StatsArgs) -> eyre::Result<()> {
    let mut arguments = BTreeMap::new();
    if !args.paths.is_empty() {
        let paths: Vec<String> = args
            .paths
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        arguments.insert("paths".to_string(), json!(paths));
    }
    if let Some(ext) = args.ext {
        arguments.insert("ext".to_string(), Value::String(ext));
    }
    if args.sequential {
        arguments.insert("sequential".to_string(), Value::Bool(true));
    }

    let overrides = RunOverrides {
        name: Some(stats_cmd::RUN_NAME.to_string()),
        return_exceptions: args.return_exceptions.then_some(true),
        max_concurrency: args.max_concurrency,
        arguments,
    };

    let run = stats_cmd::stats_run(resolve_run(config, &overrides))?;
    let invocation = resolve_arguments(config, &overrides)
        .into_iter()
        .fold(Invocation::new(), |invocation, (name, value)| {
            invocation.arg(name, value)
        });

    let result = run.invoke(invocation).await?;
    for line in stats_cmd::render(&result) {
        println!("{line}");
    }
    Ok(())
}
