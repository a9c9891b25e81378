use anyhow::Context;
use clap::{Parser, Subcommand};
use mango::{
    normalize_filter_query, rank_texts, sort, Engine, MangoConfig, SearchBounds, Value,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Query, reshape, sort and rank JSON records
#[derive(Parser, Debug)]
#[command(name = "mango")]
#[command(about = "Query, reshape, sort and rank JSON records", long_about = None)]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a pattern against the contents of a JSON file
    Query {
        /// JSON input file
        input: PathBuf,
        /// Pattern, as JSON
        pattern: String,
        /// Evaluate each element of an array input and keep the matches
        #[arg(long)]
        each: bool,
    },
    /// Sort a JSON array of records
    Sort {
        /// JSON input file holding an array of records
        input: PathBuf,
        /// One criterion or an array of criteria, as JSON
        criteria: String,
    },
    /// Rewrite a selector into the safe filter dialect
    Normalize {
        /// Selector, as JSON
        selector: String,
    },
    /// Rank a JSON array of strings against a query
    Rank {
        /// JSON input file holding an array of strings
        input: PathBuf,
        /// Query text
        query: String,
        /// Drop hits scoring below this value
        #[arg(long, default_value_t = 0.0)]
        lower: f32,
        /// Drop hits scoring above this value
        #[arg(long, default_value_t = 1.0)]
        upper: f32,
    },
}

fn parse_level(level: &str) -> Level {
    match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Value::from_json_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn parse_arg(text: &str, what: &str) -> anyhow::Result<Value> {
    Value::from_json_str(text).with_context(|| format!("Invalid JSON {}", what))
}

fn print(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MangoConfig::load(path)?,
        None => MangoConfig::default(),
    };

    let level = args
        .log_level
        .as_deref()
        .or(config.log_level.as_deref())
        .unwrap_or("info");
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    debug!("Starting mango v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        debug!("Configuration: {:?}", path);
    }

    match args.command {
        Command::Query {
            input,
            pattern,
            each,
        } => {
            let data = read_json(&input)?;
            let pattern = parse_arg(&pattern, "pattern")?;
            let engine = Engine::new();
            let result = if each {
                engine.evaluate_each(&data, &pattern)
            } else {
                engine.evaluate(&data, &pattern)
            };
            match result {
                Some(value) => print(&value.to_json())?,
                None => info!("No match"),
            }
        }
        Command::Sort { input, criteria } => {
            let records = match read_json(&input)? {
                Value::Array(items) => items,
                other => anyhow::bail!("Expected an array of records, got {}", other.type_name()),
            };
            let criteria = match parse_arg(&criteria, "sort criteria")? {
                Value::Array(items) => items,
                single => vec![single],
            };
            let sorted = sort(&records, &criteria)?;
            print(&Value::Array(sorted).to_json())?;
        }
        Command::Normalize { selector } => {
            let selector = parse_arg(&selector, "selector")?;
            print(&normalize_filter_query(&selector).to_json())?;
        }
        Command::Rank {
            input,
            query,
            lower,
            upper,
        } => {
            let texts: Vec<String> = serde_json::from_str(
                &std::fs::read_to_string(&input)
                    .with_context(|| format!("Failed to read {}", input.display()))?,
            )
            .with_context(|| format!("Expected an array of strings in {}", input.display()))?;

            let encoder = config.encoder()?;
            let bounds = SearchBounds { lower, upper };
            let hits = rank_texts(&encoder, &config.scorer(), &query, &texts)?;
            let ranked: Vec<serde_json::Value> = hits
                .into_iter()
                .filter(|hit| bounds.contains(hit.similarity))
                .map(|hit| {
                    serde_json::json!({
                        "index": hit.index,
                        "similarity": hit.similarity,
                        "text": texts[hit.index],
                    })
                })
                .collect();
            info!("Ranked {} of {} documents", ranked.len(), texts.len());
            print(&serde_json::Value::Array(ranked))?;
        }
    }

    Ok(())
}
