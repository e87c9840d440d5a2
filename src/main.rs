//! modellab - chat completion proxy with cost estimation
//!
//! Relays chat requests to an LLM aggregation API and reports the
//! estimated cost of every call.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modellab::config::{Config, KeySource};
use modellab::models;

#[derive(Parser)]
#[command(name = "modellab")]
#[command(about = "Chat completion proxy with model aliases and cost estimation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Show the effective pricing table
    Pricing {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

/// Initialize tracing, honoring RUST_LOG over the configured level.
fn init_tracing(level: &str) {
    let default_filter = format!("modellab={},tower_http=info", level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Peek at the configured log level before tracing is set up.
fn configured_log_level(path: &str) -> String {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| toml::from_str::<modellab::config::RawConfig>(&content).ok())
        .map(|raw| raw.logging.level)
        .unwrap_or_else(|| "info".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Serve { config, .. }
        | Commands::Check { config }
        | Commands::Pricing { config } => config.clone(),
    };
    init_tracing(&configured_log_level(&config_path));

    match cli.command {
        Commands::Serve { config, listen } => {
            tracing::info!(config = %config, "Loading configuration");
            let (mut cfg, key_source) = Config::load(&config)?;
            log_key_source(&key_source);

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                cfg.server.listen = addr;
            }

            let pricing = cfg.pricing_table()?;
            modellab::proxy::run_server(cfg, pricing).await
        }

        Commands::Check { config } => {
            tracing::info!(config = %config, "Checking configuration");
            let (cfg, key_source) = Config::load(&config)?;
            let pricing = cfg.pricing_table()?;

            println!("Configuration OK");
            println!("  listen:        {}", cfg.server.listen);
            println!("  upstream:      {}", cfg.upstream.url);
            println!("  default model: {}", cfg.upstream.default_model);
            println!(
                "  resolves to:   {}",
                models::resolve(&cfg.upstream.default_model)
            );
            println!("  api key:       {}", key_source);
            println!("  priced models: {}", pricing.entries().len());
            Ok(())
        }

        Commands::Pricing { config } => {
            let (cfg, _) = Config::load(&config)?;
            let pricing = cfg.pricing_table()?;

            println!("{:<40} {:>12} {:>12}", "MODEL", "INPUT/1K", "OUTPUT/1K");
            for (model, entry) in pricing.entries() {
                let marker = if model == pricing.default_model() {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "{:<40} {:>12.6} {:>12.6}{}",
                    model, entry.input, entry.output, marker
                );
            }
            Ok(())
        }
    }
}

fn log_key_source(source: &KeySource) {
    match source {
        KeySource::None => tracing::warn!("No upstream API key found"),
        other => tracing::info!(source = %other, "Upstream API key loaded"),
    }
}
