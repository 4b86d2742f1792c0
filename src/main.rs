//! aigate - REST and GraphQL gateway for generative-AI providers
//!
//! Serves the gateway as a long-lived process (`serve`) or runs a single
//! per-invocation edge request (`invoke`).

use std::path::Path;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aigate::adapter::{run_server, EdgeBindings, EdgeHandler};
use aigate::config::{Config, KeySource, RawConfig};
use aigate::provider::DEFAULT_CHAT_MODEL;
use aigate::usage;

#[derive(Parser)]
#[command(name = "aigate")]
#[command(about = "REST and GraphQL gateway for generative-AI providers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
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

    /// Handle one request the way the edge host does, using environment bindings
    Invoke {
        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request path, including any query string
        #[arg(short, long, default_value = "/")]
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
    },

    /// Estimate tokens and cost for a piece of text
    Estimate {
        /// Model whose pricing to use
        #[arg(short, long, default_value = DEFAULT_CHAT_MODEL)]
        model: String,

        /// Text to estimate
        text: String,
    },
}

/// Load config from `path`, or defaults plus environment when the file is absent.
fn load_config(path: &str) -> anyhow::Result<(Config, KeySource)> {
    if Path::new(path).exists() {
        tracing::info!(config = %path, "Loading configuration");
        Ok(Config::from_file_with_env(path)?)
    } else {
        tracing::warn!(config = %path, "Config file not found, using defaults");
        Ok(Config::from_raw(RawConfig::default())?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Level from RUST_LOG, falling back to the config file's [logging] level for serve
    let default_level = match &cli.command {
        Commands::Serve { config, .. } => Config::from_file(config)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string()),
        _ => "info".to_string(),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("aigate={},tower_http={}", default_level, default_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve { config, listen } => {
            let (mut config, key_source) = load_config(&config)?;
            tracing::info!(key_source = %key_source, "Resolved provider credential");

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config } => {
            let (config, key_source) = Config::from_file_with_env(&config)?;
            println!("Configuration OK");
            println!("  listen:         {}", config.server.listen);
            println!("  provider:       {}", config.provider.base_url);
            println!(
                "  credential:     {} ({})",
                config.provider.credential_env, key_source
            );
            match config.provider.timeout_secs {
                Some(secs) => println!("  timeout:        {}s", secs),
                None => println!("  timeout:        none"),
            }
            println!("  allowed origin: {}", config.cors.allowed_origin);
            Ok(())
        }

        Commands::Invoke { method, path, body } => {
            let mut builder = http::Request::builder().method(method.as_str()).uri(&path);
            if body.is_some() {
                builder = builder.header(http::header::CONTENT_TYPE, "application/json");
            }
            let request = builder.body(Bytes::from(body.unwrap_or_default()))?;

            let response = EdgeHandler::new()
                .fetch(request, &EdgeBindings::from_env())
                .await;

            eprintln!("HTTP {}", response.status());
            for (name, value) in response.headers() {
                eprintln!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
            eprintln!();

            let mut stdout = tokio::io::stdout();
            let mut chunks = response.into_body().into_data_stream();
            while let Some(chunk) = chunks.next().await {
                stdout.write_all(&chunk?).await?;
                stdout.flush().await?;
            }
            stdout.write_all(b"\n").await?;
            Ok(())
        }

        Commands::Estimate { model, text } => {
            let tokens = usage::estimate_tokens(&text);
            println!("{}", usage::format_estimate(tokens, &model));
            Ok(())
        }
    }
}
