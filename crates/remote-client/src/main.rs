//! remote-cli: drive a desktop server from the terminal.
//!
//! # Usage
//!
//! ```text
//! remote-cli tcp --host <HOST> [--port <PORT>] [--config <FILE>]
//! ```
//!
//! After connecting, one command per line is read from stdin:
//!
//! | Command                  | Effect                               |
//! |--------------------------|--------------------------------------|
//! | `move <dx> <dy>`         | relative mouse move                  |
//! | `click <button>`         | left, right, middle, back, forward   |
//! | `type <text…>`           | types the rest of the line           |
//! | `press <key> [mods…]`    | e.g. `press c ctrl`                  |
//! | `scroll <n>`             | vertical wheel                       |
//! | `hscroll <n>`            | horizontal wheel                     |
//! | `quit`                   | disconnect and exit                  |
//!
//! Connection state changes are printed as they happen.  The BLE receiver
//! needs a platform adapter and is only available through the library.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use remote_client::application::{RemoteInput, TcpRemote};
use remote_client::infrastructure::config::{load_config, load_config_from, ClientConfig};
use remote_client::infrastructure::history::RecentDevices;
use remote_client::infrastructure::logging::{init_tracing, TracingLogSink};
use remote_client::infrastructure::network::{ConnectionManager, Endpoint, EndpointConnector};
use remote_core::MouseButton;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Remote input client.
#[derive(Debug, Parser)]
#[command(name = "remote-cli", about = "Send mouse and keyboard input to a remote desktop server", version)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "REMOTE_INPUT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect to a desktop server over TCP.
    Tcp {
        /// Hostname or IP address of the server.
        #[arg(long, env = "REMOTE_INPUT_HOST")]
        host: String,

        /// Server port; defaults to `network.default_port` from the config.
        #[arg(long)]
        port: Option<u16>,
    },
}

// ── Stdin commands ────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Line {
    Move(i32, i32),
    Click(MouseButton),
    Type(String),
    Press { key: String, modifiers: Vec<String> },
    Scroll(i32),
    HScroll(i32),
    Quit,
    Empty,
}

fn parse_line(line: &str) -> Result<Line, String> {
    let trimmed = line.trim();
    let (verb, rest) = trimmed
        .split_once(char::is_whitespace)
        .map(|(v, r)| (v, r.trim()))
        .unwrap_or((trimmed, ""));
    let number = |s: &str| s.parse::<i32>().map_err(|e| format!("bad number {s:?}: {e}"));
    let args: Vec<&str> = rest.split_whitespace().collect();

    match verb.to_ascii_lowercase().as_str() {
        "" => Ok(Line::Empty),
        "quit" | "exit" => Ok(Line::Quit),
        "move" => match args.as_slice() {
            [dx, dy] => Ok(Line::Move(number(dx)?, number(dy)?)),
            _ => Err("usage: move <dx> <dy>".into()),
        },
        "click" => {
            let button = args.first().copied().unwrap_or("left");
            Ok(Line::Click(button.parse()?))
        }
        "type" if !rest.is_empty() => Ok(Line::Type(rest.to_string())),
        "type" => Err("usage: type <text>".into()),
        "press" => match args.split_first() {
            Some((key, mods)) => Ok(Line::Press {
                key: key.to_string(),
                modifiers: mods.iter().map(|m| m.to_string()).collect(),
            }),
            None => Err("usage: press <key> [modifiers…]".into()),
        },
        "scroll" => match args.as_slice() {
            [n] => Ok(Line::Scroll(number(n)?)),
            _ => Err("usage: scroll <n>".into()),
        },
        "hscroll" => match args.as_slice() {
            [n] => Ok(Line::HScroll(number(n)?)),
            _ => Err("usage: hscroll <n>".into()),
        },
        other => Err(format!("unknown command {other:?}")),
    }
}

async fn execute(remote: &dyn RemoteInput, line: Line) -> anyhow::Result<()> {
    match line {
        Line::Move(dx, dy) => remote.move_by(dx, dy).await?,
        Line::Click(button) => remote.click(button).await?,
        Line::Type(text) => remote.type_text(&text).await?,
        Line::Press { key, modifiers } => remote.press(&key, &modifiers).await?,
        Line::Scroll(n) => remote.scroll(n).await?,
        Line::HScroll(n) => remote.hscroll(n).await?,
        Line::Quit | Line::Empty => {}
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Configuration and logging ─────────────────────────────────────────────
    let loaded = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let fallback_level = loaded
        .as_ref()
        .map(|c| c.client.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&fallback_level);
    let config = match loaded {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => return Err(e).context("loading config"),
        Err(e) => {
            warn!("using default config: {e}");
            ClientConfig::default()
        }
    };

    let Command::Tcp { host, port } = cli.command;
    let endpoint = Endpoint::tcp(host, port.unwrap_or(config.network.default_port));

    // ── Connection ────────────────────────────────────────────────────────────
    let manager = Arc::new(ConnectionManager::new(
        config.connection_config(),
        Arc::new(EndpointConnector::tcp()),
        Arc::new(RecentDevices::new(10)),
        Arc::new(TracingLogSink),
    ));

    let mut states = manager.watch_state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            println!("[state] {state}");
        }
    });

    if let Some(mut inbound) = manager.subscribe() {
        tokio::spawn(async move {
            while let Some(packet) = inbound.recv().await {
                println!("[server] {packet:?}");
            }
        });
    }

    manager
        .connect(endpoint.clone())
        .await
        .with_context(|| format!("connecting to {endpoint}"))?;
    info!("connected; reading commands from stdin");

    // ── Command loop ──────────────────────────────────────────────────────────
    let remote = TcpRemote::new(Arc::clone(&manager));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        match parse_line(&line) {
            Ok(Line::Quit) => break,
            Ok(command) => {
                if let Err(e) = execute(&remote, command).await {
                    eprintln!("error: {e}");
                }
            }
            Err(message) => eprintln!("{message}"),
        }
    }

    manager.disconnect().await;
    info!("remote-cli stopped");
    Ok(())
}
