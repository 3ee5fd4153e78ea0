//! Command-line entry point for the withme governance kernel.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures_util::stream::StreamExt;
use log::{debug, info, warn};
use serde_json::json;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;
use withme_rs::config::LayeredConfigOptions;
use withme_rs::core::Kernel;
use withme_rs::core::crisis::{all_resources, resources_for_region};
use withme_rs::protocol::EventPayload;
use withme_rs::store::SessionOwner;
use withme_rs::{init_logging, load_config, parse_request, resolve_api_key};

#[derive(Parser)]
#[command(name = "withme", version)]
struct Cli {
    /// Optional withme.json5 applied as the highest-precedence layer
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Store directory override
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one JSON request envelope read from a file, or `-` for stdin
    Request { input: String },
    /// Chat interactively, streaming replies to stdout
    Chat {
        #[arg(long)]
        session: Uuid,
    },
    /// Open or create the session owned by an anonymous id
    Session {
        #[arg(long)]
        anonymous_id: String,
    },
    /// Print crisis resources for a region, or every region
    Resources {
        #[arg(long)]
        region: Option<String>,
    },
    /// Ask the model to propose a companion name
    SuggestName,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();
    info!(
        "starting withme (config_set={}, store_set={})",
        cli.config.is_some(),
        cli.store.is_some()
    );

    if let Command::Resources { region } = &cli.command {
        let resources = match region {
            Some(region) => json!(resources_for_region(region)),
            None => json!(all_resources()),
        };
        print_json(&resources)?;
        return Ok(ExitCode::SUCCESS);
    }

    let kernel = build_kernel(&cli)?;
    match cli.command {
        Command::Request { input } => run_request(&kernel, &input).await,
        Command::Chat { session } => {
            run_chat(&kernel, session).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Session { anonymous_id } => {
            let session = kernel
                .open_session(SessionOwner::Anonymous(anonymous_id))
                .await
                .context("failed to open session")?;
            print_json(&session)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::SuggestName => {
            let suggestion = kernel.suggest_name().await;
            print_json(&json!({ "name": suggestion.name, "meaning": suggestion.meaning }))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Resources { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn build_kernel(cli: &Cli) -> anyhow::Result<Kernel> {
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut config = load_config(
        LayeredConfigOptions::new(&cwd),
        cli.config.as_deref(),
        cli.store.as_deref(),
    )
    .context("failed to load config")?;
    if !resolve_api_key(&mut config, |name| std::env::var(name).ok()) {
        warn!(
            "no provider api key found (env={}); model calls will likely fail",
            config.provider.api_key_env
        );
    }
    debug!(
        "building kernel (model={}, stream={})",
        config.provider.model, config.chat.stream
    );
    Kernel::from_config(config).context("failed to build kernel")
}

async fn run_request(kernel: &Kernel, input: &str) -> anyhow::Result<ExitCode> {
    let contents = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {input}"))?
    };
    let request = parse_request(&contents).context("invalid request envelope")?;
    match kernel.handle(request).await {
        Ok(response) => {
            print_json(&response)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_json(&json!({ "error": err.user_message() }))?;
            Ok(if err.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn run_chat(kernel: &Kernel, session_id: Uuid) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }

        let mut stream = kernel
            .chat_stream(session_id, text)
            .await
            .context("failed to start chat turn")?;
        while let Some(event) = stream.events.next().await {
            match event.payload {
                EventPayload::ReplyDelta { delta, .. } => {
                    write!(stdout, "{delta}")?;
                    stdout.flush()?;
                }
                EventPayload::Error { message, .. } => {
                    writeln!(stdout, "{message}")?;
                }
                EventPayload::TurnCompleted { .. } => break,
                _ => {}
            }
        }
        writeln!(stdout)?;
        match stream.finish().await {
            Ok(response) => {
                if let Some(resources) = response.crisis_resources {
                    writeln!(
                        stdout,
                        "If you need someone right now ({}): emergency {}",
                        resources.country, resources.emergency_number
                    )?;
                    for hotline in resources.hotlines {
                        writeln!(stdout, "  {} {}", hotline.name, hotline.phone)?;
                    }
                }
            }
            Err(err) if err.is_client_error() => bail!("{}", err.user_message()),
            Err(err) => debug!("chat turn failed: {}", err),
        }
    }
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{text}");
    Ok(())
}
