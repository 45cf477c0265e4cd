use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ai_service::ServiceManager;
use anyhow::{Context, Result};
use chat_panel::{ChatPanel, HistoryStore};
use clap::Parser;
use config::{ConfigStore, Settings};
use core_types::{BackendKind, ChatMessage, ChatRole};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{Command, HELP};

/// Terminal front-end for the CAD chat assistant.
#[derive(Debug, Parser)]
#[command(name = "cad-chat", version)]
struct Cli {
    /// Directory for settings, chat history and logs.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Select and persist the backend before starting (cloud or local).
    #[arg(long)]
    backend: Option<BackendKind>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    if let Err(err) = fs::create_dir_all(&data_dir) {
        eprintln!("failed to prepare data dir: {err}");
    }
    let _log_guard = init_local_logger(&data_dir.join("logs"));

    match run(cli, &data_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "chat session aborted");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, data_dir: &Path) -> Result<()> {
    let mut settings = Settings::load(ConfigStore::from_dir(data_dir.join("config")))
        .context("failed to load settings")?;
    if let Some(kind) = cli.backend {
        settings
            .set_active_backend(kind)
            .context("failed to store backend selection")?;
    }

    let service =
        ServiceManager::new(settings.into_shared()).context("failed to start the AI service")?;
    let mut panel = ChatPanel::open(service, HistoryStore::from_data_dir(data_dir));
    info!(backend = ?panel.service().active_kind(), "chat panel open");

    println!("AI Design Assistant ({})", backend_label(&panel));
    for message in panel.conversation().messages() {
        print_message(message);
    }
    println!("type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            break;
        };
        let command = match commands::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(err) = execute(&mut panel, command).await {
            eprintln!("error: {err:#}");
        }
    }

    panel.close().context("failed to save chat history")?;
    Ok(())
}

async fn execute(panel: &mut ChatPanel, command: Command) -> Result<()> {
    match command {
        Command::Send(text) => {
            let response = panel
                .send_message(&text)
                .await
                .context("failed to get AI response")?;
            if let Some(response) = response {
                print_message(&ChatMessage::assistant(response.text));
            }
        }
        Command::Get(key) => {
            let settings = panel.settings().read();
            let value = settings.get_dotted(&key)?;
            println!("{key} = {}", serde_json::to_string_pretty(value)?);
        }
        Command::Set { key, value } => {
            panel.settings().write().set_dotted(&key, value)?;
            if key.starts_with("ai_backend") {
                println!("settings saved; use /backend to reconnect");
            }
        }
        Command::Backend(kind) => {
            panel.select_backend(kind)?;
            println!("switched to {}", backend_label(panel));
        }
        Command::Reset => {
            panel.reset_settings()?;
            println!("settings reset ({})", backend_label(panel));
        }
        Command::Export(path) => {
            let format = panel.export(&path)?;
            println!("exported {:?} to {}", format, path.display());
        }
        Command::History => {
            for message in panel.conversation().messages() {
                print_message(message);
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

fn print_message(message: &ChatMessage) {
    let label = match message.role {
        ChatRole::User => "you",
        ChatRole::Assistant => "assistant",
        ChatRole::System => "system",
    };
    println!("[{}] {label}: {}", message.timestamp.format("%H:%M"), message.content);
}

fn backend_label(panel: &ChatPanel) -> &'static str {
    panel
        .service()
        .active_kind()
        .map(BackendKind::display_name)
        .unwrap_or("no backend")
}

fn default_data_dir() -> PathBuf {
    let mut dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("cad_chat");
    dir
}

fn init_local_logger(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    if let Err(err) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create log dir `{}`: {err}", log_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, "cad-chat.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cad_chat=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_writer(writer)
        .init();

    guard
}
