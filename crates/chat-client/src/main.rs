//! Terminal chat client
//!
//! Run with:
//! ```bash
//! cargo run -p chat-client
//! ```
//!
//! Every stdin line is sent as a PUBLIC message. `/msg <user> <text>` sends a
//! PRIVATE message and `/quit [reason]` leaves. Inbound messages go to stdout,
//! logs to stderr. Configuration is loaded from environment variables.

use anyhow::Context;
use chat_client::{ChatClient, ConnectionEvent};
use chat_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use chat_core::Message;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// Upper bound on waiting for the first connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Chat client failed");
        std::process::exit(1);
    }
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    info!(url = %config.server_url, env = ?config.env, "Starting chat client");

    let close_timeout = config.close_timeout;
    let reconnecting = config.auto_reconnect.enabled;
    let client = ChatClient::new(config).context("invalid client configuration")?;

    client.subscribe(|message: &Message| {
        if !message.is_ping() {
            println!("{message}");
        }
    });

    let mut events = client.events();
    client.connect();
    tokio::time::timeout(CONNECT_TIMEOUT, client.wait_until_connected())
        .await
        .context("timed out connecting")?
        .context("could not connect")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    // EOF
                    if let Err(e) = client.quit(None) {
                        warn!(error = %e, "QUIT not sent");
                    }
                    break;
                };
                match Command::parse(&line) {
                    Some(Command::Quit(reason)) => {
                        if let Err(e) = client.quit(reason.as_deref()) {
                            warn!(error = %e, "QUIT not sent");
                        }
                        break;
                    }
                    Some(command) => {
                        if let Err(e) = client.send(command.into_message()) {
                            warn!(error = %e, "Message not sent");
                        }
                    }
                    None => {}
                }
            }
            event = events.recv() => match event {
                Ok(ConnectionEvent::Closed { code, reason }) => {
                    warn!(code = ?code, reason = %reason, "Connection closed");
                    if !reconnecting {
                        return Ok(());
                    }
                }
                Ok(ConnectionEvent::Opened) => info!("Connected"),
                Ok(ConnectionEvent::ReconnectScheduled { attempt, delay }) => {
                    info!(attempt, delay_ms = delay.as_millis(), "Reconnecting");
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed connection events"),
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                client.disconnect("interrupted");
                break;
            }
        }
    }

    // Give the close handshake a chance to finish
    let grace = close_timeout + Duration::from_secs(1);
    if tokio::time::timeout(grace, client.wait_until_disconnected())
        .await
        .is_err()
    {
        warn!("Close handshake did not complete");
    }

    Ok(())
}

/// One line of terminal input
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Public(String),
    Private { to: String, text: String },
    Quit(Option<String>),
}

impl Command {
    /// Parse a line; blank lines and malformed commands yield `None`
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(rest) = strip_command(line, "/quit") {
            let reason = rest.trim();
            return Some(Self::Quit((!reason.is_empty()).then(|| reason.to_string())));
        }

        if let Some(rest) = strip_command(line, "/msg") {
            let (to, text) = rest.trim_start().split_once(char::is_whitespace)?;
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            return Some(Self::Private {
                to: to.to_string(),
                text: text.to_string(),
            });
        }

        Some(Self::Public(line.to_string()))
    }

    fn into_message(self) -> Message {
        match self {
            Self::Public(text) => Message::public(text),
            Self::Private { to, text } => Message::private(text, to),
            Self::Quit(reason) => Message::quit(reason),
        }
    }
}

/// Strip `name` when it is the whole first word of `line`
fn strip_command<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
}
