//! callkit CLI - Main entry point

mod cli;

use anyhow::Context;
use callkit_call::CallContext;
use callkit_client::{ApiClient, HttpMethod};
use callkit_foundation::{CoreConfig, NormalizedResult, SecureStorage};
use clap::{Parser, Subcommand};
use cli::{RequestFlags, StorageAction, WatchPlan};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// callkit - issue API calls with caching, encryption and normalized results
#[derive(Parser, Debug)]
#[command(name = "callkit")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to global + project callkit.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL (overrides config and environment)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log level filter (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// GET a resource
    Get {
        url: String,
        #[command(flatten)]
        flags: RequestFlags,
    },
    /// DELETE a resource
    Delete {
        url: String,
        #[command(flatten)]
        flags: RequestFlags,
    },
    /// POST a JSON body
    Post {
        url: String,
        /// JSON body
        #[arg(long)]
        data: Option<String>,
        #[command(flatten)]
        flags: RequestFlags,
    },
    /// PUT a JSON body
    Put {
        url: String,
        #[arg(long)]
        data: Option<String>,
        #[command(flatten)]
        flags: RequestFlags,
    },
    /// PATCH a JSON body
    Patch {
        url: String,
        #[arg(long)]
        data: Option<String>,
        #[command(flatten)]
        flags: RequestFlags,
    },
    /// Poll a resource through the call coordinator
    Watch {
        url: String,
        /// Cache timeout in seconds (0 disables caching)
        #[arg(long, default_value = "0")]
        cache: u64,
        /// Refresh interval in seconds
        #[arg(long, default_value = "5")]
        interval: u64,
        /// Stop after N results (0 runs until interrupted)
        #[arg(long, default_value = "3")]
        times: usize,
        #[command(flatten)]
        flags: RequestFlags,
    },
    /// Upload multipart form data
    Upload {
        url: String,
        /// Text field (key=value), repeatable
        #[arg(long = "field")]
        fields: Vec<String>,
        /// File field (name=path), repeatable
        #[arg(long = "file")]
        files: Vec<String>,
        #[command(flatten)]
        flags: RequestFlags,
    },
    /// Encrypted persistent storage
    Storage {
        /// Storage key (defaults to the configured storageKey)
        #[arg(long)]
        key: Option<String>,
        #[command(subcommand)]
        action: StorageAction,
    },
}

fn load_config(args: &Args) -> anyhow::Result<CoreConfig> {
    let mut config = match &args.config {
        Some(path) => CoreConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CoreConfig::load()?,
    };
    if let Some(base_url) = &args.base_url {
        config.base_url = Some(base_url.clone());
    }
    Ok(config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_for<T>(result: &NormalizedResult<T>) -> ExitCode {
    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn request(
    config: &CoreConfig,
    method: HttpMethod,
    url: &str,
    body: Option<serde_json::Value>,
    flags: &RequestFlags,
) -> anyhow::Result<ExitCode> {
    let client = ApiClient::from_core(config)?;
    let result = cli::run_request(&client, method, url, body, flags).await?;
    print_json(&result)?;
    Ok(exit_for(&result))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging (stdout 은 JSON 출력 전용)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = load_config(&args)?;

    match args.command {
        Command::Get { url, flags } => request(&config, HttpMethod::Get, &url, None, &flags).await,
        Command::Delete { url, flags } => {
            request(&config, HttpMethod::Delete, &url, None, &flags).await
        }
        Command::Post { url, data, flags } => {
            let body = cli::parse_data(data.as_deref())?;
            request(&config, HttpMethod::Post, &url, Some(body), &flags).await
        }
        Command::Put { url, data, flags } => {
            let body = cli::parse_data(data.as_deref())?;
            request(&config, HttpMethod::Put, &url, Some(body), &flags).await
        }
        Command::Patch { url, data, flags } => {
            let body = cli::parse_data(data.as_deref())?;
            request(&config, HttpMethod::Patch, &url, Some(body), &flags).await
        }
        Command::Watch {
            url,
            cache,
            interval,
            times,
            flags,
        } => {
            let client = ApiClient::from_core(&config)?;
            let ctx = CallContext::from_core(&config)?;
            let plan = WatchPlan {
                url,
                cache_secs: cache,
                interval_secs: interval,
                times,
            };
            let mut failed = false;
            cli::run_watch(&client, &ctx, &plan, &flags, |result| {
                failed |= !result.success;
                if let Err(e) = print_json(result) {
                    tracing::warn!(error = %e, "Failed to print result");
                }
            })
            .await?;
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Upload {
            url,
            fields,
            files,
            flags,
        } => {
            let client = ApiClient::from_core(&config)?;
            let form = cli::build_form(&fields, &files).await?;
            let result = cli::run_upload(&client, &url, form, &flags, |progress| {
                eprint!("\rUploading... {:>3}%", progress);
                let _ = std::io::stderr().flush();
            })
            .await?;
            eprintln!();
            print_json(&*result)?;
            Ok(exit_for(&result))
        }
        Command::Storage { key, action } => {
            let storage = SecureStorage::open_default(config.passphrase.as_deref())?;
            let key = key
                .or_else(|| config.storage_key.clone())
                .unwrap_or_else(|| "session".to_string());
            match cli::run_storage(&storage, &key, &action)? {
                Some(value) => print_json(&value)?,
                None if matches!(action, StorageAction::Get) => {
                    eprintln!("No value stored under '{}'", key);
                    return Ok(ExitCode::FAILURE);
                }
                None => {}
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
