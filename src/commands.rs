//! Operator console commands
//!
//! Lines typed on the relay's stdin that start with the command prefix, e.g.
//! `[link somestreamer <#123456789012345678>`.

use crate::error::{RelayError, Result};
use crate::logging::log_error;
use crate::storage::ChannelMap;
use crate::twitch::TwitchChat;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const HELP: &str = "commands: link <twitch channel> <discord channel id>, channels, help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Link {
        source: String,
        destination: String,
    },
    Channels,
    Help,
}

impl Command {
    /// Parse a line, `None` when it does not start with `prefix`
    pub fn parse(line: &str, prefix: &str) -> Option<Result<Self>> {
        let body = line.trim().strip_prefix(prefix)?;
        let mut args = body.split_whitespace();

        let command = match args.next() {
            Some("link") => match (args.next(), args.next()) {
                (Some(source), Some(destination)) => parse_destination(destination)
                    .map(|destination| Self::Link {
                        source: source.to_string(),
                        destination,
                    }),
                _ => Err(RelayError::Config(
                    "usage: link <twitch channel> <discord channel id>".to_string(),
                )),
            },
            Some("channels") => Ok(Self::Channels),
            Some("help") | None => Ok(Self::Help),
            Some(other) => Err(RelayError::Config(format!("unknown command: {}", other))),
        };
        Some(command)
    }
}

/// Accept a raw id or a `<#id>` channel mention
fn parse_destination(raw: &str) -> Result<String> {
    let id = raw.trim_start_matches("<#").trim_end_matches('>');
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(RelayError::Config(format!(
            "not a Discord channel id: {}",
            raw
        )));
    }
    Ok(id.to_string())
}

pub struct CommandHandler {
    channel_map: Arc<ChannelMap>,
    chat: Arc<TwitchChat>,
    prefix: String,
}

impl CommandHandler {
    pub fn new(channel_map: Arc<ChannelMap>, chat: Arc<TwitchChat>, prefix: impl Into<String>) -> Self {
        Self {
            channel_map,
            chat,
            prefix: prefix.into(),
        }
    }

    /// Reply to one console line, `None` for lines that are not commands
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let command = Command::parse(line, &self.prefix)?;
        tracing::info!(command = %line.trim(), "Handling console command");

        let reply = match command {
            Ok(command) => self.execute(command).await,
            Err(e) => Err(e),
        };
        Some(match reply {
            Ok(reply) => reply,
            Err(e) => {
                log_error("console_command", &e);
                format!("error: {}", e)
            }
        })
    }

    async fn execute(&self, command: Command) -> Result<String> {
        match command {
            Command::Link {
                source,
                destination,
            } => {
                self.channel_map.link(&source, &destination).await?;
                let joined = self.chat.join(&source).await;
                tracing::info!(
                    source = %source,
                    destination = %destination,
                    joined = joined,
                    "Linked channel from console"
                );
                Ok(format!("linked {} to {}", source, destination))
            }
            Command::Channels => {
                let mut lines = Vec::new();
                for channel in self.channel_map.channels().await {
                    let destination = self
                        .channel_map
                        .get_destination_channel(&channel)
                        .await
                        .unwrap_or_default();
                    lines.push(format!("{} -> {}", channel, destination));
                }
                if lines.is_empty() {
                    Ok("no linked channels".to_string())
                } else {
                    Ok(lines.join("\n"))
                }
            }
            Command::Help => Ok(HELP.to_string()),
        }
    }

    /// Read commands until the input closes
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(reply) = self.handle_line(&line).await {
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        tracing::debug!("Console input closed");
        Ok(())
    }
}
