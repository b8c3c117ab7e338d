//! astroserve command line.
//!
//! Runs the gateway operations against the configured artifact directory and
//! prints JSON on stdout. Logs go to stderr.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use astroserve::{Dispatcher, GatewayConfig, PredictRequest};

#[derive(Parser, Debug)]
#[command(name = "astroserve", version, about = "Exoplanet classifier gateway")]
struct Args {
    /// TOML config file; defaults are used when absent
    #[arg(long, short, env = "ASTROSERVE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a batch with one or more models
    Predict {
        /// Comma-separated model ids; overrides the request's own list
        #[arg(long, value_delimiter = ',')]
        models: Option<Vec<String>>,

        /// Request body (`{"data": [[...]], "models": [...]}`) or a bare batch; `-` reads stdin
        input: PathBuf,
    },
    /// Artifact metadata for one model, or all when omitted
    Describe { id: Option<String> },
    /// Artifact presence for every model
    Health,
    /// Feature names in column order
    Features,
    /// Service banner
    Info,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astroserve=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GatewayConfig::from_env(),
    };
    let dispatcher = config.build_dispatcher()?;

    if config.threads > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .context("building thread pool")?;
        pool.install(|| run(&dispatcher, args.command))
    } else {
        run(&dispatcher, args.command)
    }
}

fn run(dispatcher: &Dispatcher, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Predict { models, input } => {
            let mut request = read_request(&input)?;
            if models.is_some() {
                request.models = models;
            }
            let response = dispatcher.handle(&request)?;
            print_json(&response)
        }
        Command::Describe { id: Some(id) } => print_json(&dispatcher.describe(&id)?),
        Command::Describe { id: None } => print_json(&dispatcher.describe_all()),
        Command::Health => print_json(&dispatcher.health()),
        Command::Features => print_json(&dispatcher.features()),
        Command::Info => print_json(&dispatcher.info()),
    }
}

fn read_request(input: &Path) -> anyhow::Result<PredictRequest> {
    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("reading request {}", input.display()))?
    };

    let body: Value = serde_json::from_str(&raw).context("request is not valid JSON")?;
    if body.is_array() {
        return Ok(PredictRequest {
            data: body,
            models: None,
        });
    }
    serde_json::from_value(body).context("request must be a batch or {\"data\": ..., \"models\": ...}")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
