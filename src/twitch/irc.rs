//! Twitch chat over IRC with IRCv3 tags

use crate::config::TwitchConfig;
use crate::error::{RelayError, Result};
use crate::logging::log_error;
use crate::relay::{ChatEvent, MessageContext, RelayDispatcher, normalize_channel};
use crate::transcode::BadgeRef;
use crate::twitch::ExponentialBackoff;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinSet;
use tokio_rustls::TlsConnector;

/// One parsed IRC line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse `[@tags ][:prefix ]COMMAND [params] [:trailing]`
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let mut tags = HashMap::new();
        if let Some(tagged) = rest.strip_prefix('@') {
            let (raw_tags, remainder) = tagged.split_once(' ')?;
            for tag in raw_tags.split(';').filter(|t| !t.is_empty()) {
                let (key, value) = tag.split_once('=').unwrap_or((tag, ""));
                tags.insert(key.to_string(), unescape_tag_value(value));
            }
            rest = remainder.trim_start();
        }

        let mut prefix = None;
        if let Some(prefixed) = rest.strip_prefix(':') {
            let (p, remainder) = prefixed.split_once(' ')?;
            prefix = Some(p.to_string());
            rest = remainder.trim_start();
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, remainder)) => (command, remainder),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        while !rest.is_empty() {
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, remainder)) => {
                    params.push(param.to_string());
                    rest = remainder.trim_start();
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            tags,
            prefix,
            command: command.to_string(),
            params,
        })
    }

    /// Non-empty tag value
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Nick part of `nick!user@host`
    pub fn nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.split_once('!').map_or(p, |(nick, _)| nick))
    }

    /// Convert a PRIVMSG into a chat event
    pub fn into_chat_event(self) -> Option<ChatEvent> {
        if self.command != "PRIVMSG" || self.params.len() < 2 {
            return None;
        }

        let username = self
            .nick()
            .map(str::to_string)
            .or_else(|| self.tag("login").map(str::to_string))?;

        let context = MessageContext {
            username,
            color: self.tag("color").map(str::to_string),
            badges: self.tag("badges").map(parse_badges).unwrap_or_default(),
            // Present but empty means "no emotes", unlike a missing tag
            emotes: self.tags.get("emotes").cloned(),
        };

        let mut params = self.params.into_iter();
        let channel = params.next()?;
        let text = params.next()?;

        Some(ChatEvent {
            channel,
            context,
            text,
        })
    }
}

/// IRCv3 tag value escapes
fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Parse `broadcaster/1,subscriber/12`, keeping order
pub fn parse_badges(tag: &str) -> Vec<BadgeRef> {
    tag.split(',')
        .filter_map(|badge| badge.split_once('/'))
        .filter(|(set, version)| !set.is_empty() && !version.is_empty())
        .map(|(set, version)| BadgeRef::new(set, version))
        .collect()
}

enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Time allowed for in-flight relays to finish after a disconnect
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Twitch chat transport feeding the relay dispatcher
pub struct TwitchChat {
    config: TwitchConfig,
    channels: RwLock<BTreeSet<String>>,
    joins: mpsc::UnboundedSender<String>,
    pending_joins: Mutex<mpsc::UnboundedReceiver<String>>,
    shutdown: watch::Sender<bool>,
}

impl TwitchChat {
    pub fn new(config: TwitchConfig, channels: Vec<String>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (joins, pending_joins) = mpsc::unbounded_channel();
        Self {
            config,
            channels: RwLock::new(channels.iter().map(|c| normalize_channel(c)).collect()),
            joins,
            pending_joins: Mutex::new(pending_joins),
            shutdown,
        }
    }

    /// Stop `connect` after the current line
    pub fn disconnect(&self) {
        self.shutdown.send_replace(true);
    }

    /// Add a channel, joining it on the live connection if there is one
    ///
    /// Returns false when the channel was already joined.
    pub async fn join(&self, channel: &str) -> bool {
        let channel = normalize_channel(channel);
        if !self.channels.write().await.insert(channel.clone()) {
            return false;
        }
        tracing::info!(channel = %channel, "Adding Twitch channel");
        let _ = self.joins.send(channel);
        true
    }

    pub async fn channels(&self) -> Vec<String> {
        self.channels.read().await.iter().cloned().collect()
    }

    /// Stay connected, reconnecting with backoff, until `disconnect` is called
    ///
    /// Each chat message is handled on its own task. Tasks still running at
    /// disconnect get a short grace period before they are aborted.
    pub async fn connect(&self, dispatcher: Arc<RelayDispatcher>) -> Result<()> {
        let mut shutdown = self.shutdown.subscribe();
        let mut joins = self.pending_joins.lock().await;
        let mut tasks = JoinSet::new();
        let mut backoff = ExponentialBackoff::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let ended = self
                .session(&dispatcher, &mut shutdown, &mut joins, &mut tasks, &mut backoff)
                .await;
            match ended {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Disconnected) => {
                    tracing::warn!("Twitch chat connection closed");
                }
                Err(e) => log_error("twitch_chat_session", &e),
            }

            let delay = backoff.next_delay();
            tracing::info!(
                delay_secs = delay.as_secs(),
                attempt = backoff.attempt_count(),
                "Reconnecting to Twitch chat"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        drain(&mut tasks).await;
        tracing::info!("Twitch chat disconnected");
        Ok(())
    }

    async fn session(
        &self,
        dispatcher: &Arc<RelayDispatcher>,
        shutdown: &mut watch::Receiver<bool>,
        joins: &mut mpsc::UnboundedReceiver<String>,
        tasks: &mut JoinSet<()>,
        backoff: &mut ExponentialBackoff,
    ) -> Result<SessionEnd> {
        tracing::info!(
            addr = %self.config.irc_addr,
            tls = self.config.irc_tls,
            "Connecting to Twitch chat"
        );
        let tcp = TcpStream::connect(&self.config.irc_addr).await?;

        if self.config.irc_tls {
            let connector = tls_connector()?;
            let stream = connector.connect(server_name(&self.config.irc_addr)?, tcp).await?;
            self.run(stream, dispatcher, shutdown, joins, tasks, backoff)
                .await
        } else {
            if self.config.oauth_token.is_some() {
                tracing::warn!("Sending Twitch OAuth token over plaintext IRC");
            }
            self.run(tcp, dispatcher, shutdown, joins, tasks, backoff)
                .await
        }
    }

    async fn run<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        stream: S,
        dispatcher: &Arc<RelayDispatcher>,
        shutdown: &mut watch::Receiver<bool>,
        joins: &mut mpsc::UnboundedReceiver<String>,
        tasks: &mut JoinSet<()>,
        backoff: &mut ExponentialBackoff,
    ) -> Result<SessionEnd> {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut lines = BufReader::new(reader).lines();

        // Login joins every known channel, so queued joins are already covered
        while joins.try_recv().is_ok() {}
        self.login(&mut writer).await?;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = send_line(&mut writer, "QUIT").await;
                    return Ok(SessionEnd::Shutdown);
                }
                Some(channel) = joins.recv() => {
                    send_line(&mut writer, &format!("JOIN #{}", channel)).await?;
                    tracing::info!(channel = %channel, "Joined channel");
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        return Ok(SessionEnd::Disconnected);
                    };
                    let Some(message) = IrcMessage::parse(&line) else {
                        tracing::trace!(line = %line, "Unparseable IRC line");
                        continue;
                    };

                    let command = message.command.clone();
                    match command.as_str() {
                        "PING" => {
                            let token = message.params.first().map(String::as_str).unwrap_or("tmi.twitch.tv");
                            send_line(&mut writer, &format!("PONG :{}", token)).await?;
                        }
                        "001" => {
                            backoff.reset();
                            tracing::info!("Connected to Twitch chat");
                        }
                        "RECONNECT" => {
                            tracing::info!("Twitch requested reconnect");
                            return Ok(SessionEnd::Disconnected);
                        }
                        "NOTICE" => {
                            let text = message.params.last().cloned().unwrap_or_default();
                            if text.contains("Login authentication failed") {
                                return Err(RelayError::Irc(text));
                            }
                            tracing::warn!(notice = %text, "Twitch notice");
                        }
                        "PRIVMSG" => {
                            if let Some(event) = message.into_chat_event() {
                                let dispatcher = dispatcher.clone();
                                tasks.spawn(async move {
                                    dispatcher.on_message(event).await;
                                });
                            }
                        }
                        other => tracing::trace!(command = %other, "Ignoring IRC command"),
                    }
                }
            }
        }
    }

    async fn login<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        send_line(writer, "CAP REQ :twitch.tv/tags twitch.tv/commands").await?;

        match (&self.config.bot_username, &self.config.oauth_token) {
            (Some(username), Some(token)) => {
                let token = if token.starts_with("oauth:") {
                    token.clone()
                } else {
                    format!("oauth:{}", token)
                };
                send_line(writer, &format!("PASS {}", token)).await?;
                send_line(writer, &format!("NICK {}", username)).await?;
            }
            _ => {
                let anonymous = format!("justinfan{}", uuid::Uuid::new_v4().as_u128() % 100_000);
                tracing::info!(nick = %anonymous, "Joining Twitch chat anonymously");
                send_line(writer, &format!("NICK {}", anonymous)).await?;
            }
        }

        for channel in self.channels().await {
            send_line(writer, &format!("JOIN #{}", channel)).await?;
            tracing::debug!(channel = %channel, "Joined channel");
        }
        Ok(())
    }
}

/// Wait for in-flight relays, aborting whatever outlives the grace period
async fn drain(tasks: &mut JoinSet<()>) {
    if tasks.is_empty() {
        return;
    }
    tracing::info!(in_flight = tasks.len(), "Waiting for in-flight relays");
    let finished = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if finished.is_err() {
        tracing::warn!(aborted = tasks.len(), "Relays still running at shutdown, aborting");
        tasks.abort_all();
    }
}

/// TLS client config trusting the webpki root set
fn tls_connector() -> Result<TlsConnector> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| RelayError::Irc(format!("TLS setup failed: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Host part of `host:port`, as a TLS server name
fn server_name(addr: &str) -> Result<ServerName<'static>> {
    let host = addr.rsplit_once(':').map_or(addr, |(host, _)| host);
    ServerName::try_from(host.to_string())
        .map_err(|e| RelayError::Irc(format!("invalid IRC host {}: {}", host, e)))
}

async fn send_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(())
}
