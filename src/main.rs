use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use restpace::config::{Config, DEFAULT_CONFIG_FILE};
use restpace::utils::logging::init_tracing;
use restpace::{HttpJsonClient, LearnedRateLimits, Query, QueryValue, RestpaceError};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(version, about = "Rate-limited JSON requests against a vendor REST API")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// GET a path and print the JSON response.
    Get {
        path: String,
        /// Query parameter as key=value; repeat a key to send a list.
        #[arg(short, long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
    },
    /// POST to a path and print the JSON response.
    Post {
        path: String,
        #[arg(short, long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
        /// JSON request body.
        #[arg(short, long)]
        body: Option<String>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn build_query(pairs: Vec<(String, String)>) -> Query {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in pairs {
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => grouped.push((key, vec![value])),
        }
    }

    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                QueryValue::from(values.remove(0))
            } else {
                QueryValue::from(values)
            };
            (key, value)
        })
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration from {}: {err}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&cfg.basic.loglevel);

    info!(
        config = %cli.config.display(),
        base_url = %cfg.client.base_url,
        proxy = %cfg.client.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.basic.loglevel,
        requests_per_minute = ?cfg.client.requests_per_minute,
        "Configuration loaded"
    );

    match run(cfg, cli.command).await {
        Ok(value) => {
            match serde_json::to_string_pretty(&value) {
                Ok(pretty) => println!("{pretty}"),
                Err(err) => {
                    error!(error = %err, "Failed to render response");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            match err.as_api() {
                Some(api) => error!(status = %api.status, url = %api.url, "{}", api.user_message()),
                None => error!(error = %err, "Request failed"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config, command: Command) -> Result<Value, RestpaceError> {
    let mut client = HttpJsonClient::new(&cfg.client)?;

    if let Some(probe) = &cfg.probe {
        let limits = LearnedRateLimits::new(probe.ttl());
        let key = client.base_url().to_string();
        if let Err(err) = limits.apply(&mut client, &key, &probe.probe).await {
            warn!(error = %err, "Could not learn rate limit; continuing without it");
        }
    }

    match command {
        Command::Get { path, query } => {
            let query = build_query(query);
            client.get_json(&path, Some(&query)).await
        }
        Command::Post { path, query, body } => {
            let query = build_query(query);
            let body: Option<Value> = body.as_deref().map(serde_json::from_str).transpose()?;
            client.post_json(&path, Some(&query), body.as_ref()).await
        }
    }
}
