//! src/platforms/irc/client.rs

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, split};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use tokio_native_tls::native_tls;
use tokio_native_tls::TlsConnector;
use tracing::{debug, error, info};

/// Minimal representation of a parsed IRC line.
#[derive(Debug, Clone, PartialEq)]
pub struct IrcMessage {
    pub tags: Option<String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

impl IrcMessage {
    pub fn parse(line: &str) -> Self {
        let mut rest = line.trim();
        let mut tags = None;
        let mut prefix = None;
        let mut command = String::new();
        let mut params = Vec::new();
        let mut trailing = None;

        // 1) IRCv3 tags
        if rest.starts_with('@') {
            if let Some(space_pos) = rest.find(' ') {
                tags = Some(rest[..space_pos].to_string());
                rest = &rest[space_pos + 1..];
            } else {
                return Self {
                    tags: Some(rest.to_string()),
                    prefix: None,
                    command,
                    params,
                    trailing,
                };
            }
        }

        // 2) prefix
        if rest.starts_with(':') {
            if let Some(space_pos) = rest.find(' ') {
                prefix = Some(rest[..space_pos].trim_start_matches(':').to_string());
                rest = &rest[space_pos + 1..];
            } else {
                return Self {
                    tags,
                    prefix: Some(rest.trim_start_matches(':').to_string()),
                    command,
                    params,
                    trailing,
                };
            }
        }

        // 3) command
        let mut parts = rest.splitn(2, ' ');
        if let Some(cmd) = parts.next() {
            command = cmd.to_string();
        }
        rest = parts.next().unwrap_or("");

        // 4) params and trailing; a line may start straight with ":trailing"
        if let Some(stripped) = rest.strip_prefix(':') {
            trailing = Some(stripped.to_string());
        } else if let Some(idx) = rest.find(" :") {
            trailing = Some(rest[idx + 2..].to_string());
            let before = rest[..idx].trim();
            if !before.is_empty() {
                params.extend(before.split_whitespace().map(|s| s.to_string()));
            }
        } else {
            params.extend(rest.split_whitespace().map(|s| s.to_string()));
        }

        Self { tags, prefix, command, params, trailing }
    }

    /// Nick part of a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split('!').next().unwrap_or(prefix))
    }
}

/// Higher-level event from the IRC read loop.
#[derive(Debug, Clone, PartialEq)]
pub struct IrcIncomingEvent {
    pub command: String,
    pub channel: Option<String>,
    pub nick: Option<String>,
    pub text: Option<String>,
    pub raw_line: String,
}

impl IrcIncomingEvent {
    fn from_message(msg: &IrcMessage, raw_line: &str) -> Self {
        let command = msg.command.to_uppercase();
        let mut evt = IrcIncomingEvent {
            command: command.clone(),
            channel: None,
            nick: msg.nick().map(str::to_string),
            text: None,
            raw_line: raw_line.to_string(),
        };
        match command.as_str() {
            "PRIVMSG" | "NOTICE" => {
                evt.channel = msg.params.first().cloned();
                evt.text = msg.trailing.clone();
            }
            "JOIN" | "PART" => {
                // Some servers send the channel as trailing.
                evt.channel = msg.params.first().cloned().or_else(|| msg.trailing.clone());
            }
            _ => {
                evt.text = msg.trailing.clone();
            }
        }
        evt
    }
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct IrcConnectConfig {
    /// `host:port`
    pub server: String,
    pub use_tls: bool,
    /// Accept self-signed or otherwise invalid certificates.
    pub accept_invalid_certs: bool,
    pub nickname: String,
    pub realname: String,
}

/// Low-level IRC client over TCP, optionally wrapped in TLS.
pub struct IrcClient {
    raw_outgoing: mpsc::UnboundedSender<String>,

    /// Taken by the runtime that consumes events.
    pub incoming: Option<mpsc::UnboundedReceiver<IrcIncomingEvent>>,

    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl IrcClient {
    /// Connects, registers with NICK/USER and spawns the read/write tasks.
    pub async fn connect(config: &IrcConnectConfig) -> io::Result<Self> {
        let tcp = TcpStream::connect(config.server.as_str())
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("TCP connect error: {e}")))?;

        let client = if config.use_tls {
            let native_connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(config.accept_invalid_certs)
                .build()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("TLSConnector::new() => {e}")))?;
            let connector = TlsConnector::from(native_connector);
            let domain = host_of(&config.server);
            let tls_stream = connector.connect(domain, tcp).await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("TLS connect() => {e}")))?;
            Self::from_stream(tls_stream)
        } else {
            Self::from_stream(tcp)
        };

        client.send_raw_line(&format!("NICK {}", config.nickname));
        client.send_raw_line(&format!("USER {} 0 * :{}", config.nickname, config.realname));
        Ok(client)
    }

    /// Spawns the reader and writer over any bidirectional stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = split(stream);

        let (tx_outgoing, rx_outgoing) = mpsc::unbounded_channel::<String>();
        let (tx_incoming, rx_incoming) = mpsc::unbounded_channel::<IrcIncomingEvent>();

        let write_task = tokio::spawn(Self::writer_loop(write_half, rx_outgoing));
        let read_task = tokio::spawn(Self::reader_loop(
            read_half,
            tx_incoming,
            tx_outgoing.clone(),
        ));

        Self {
            raw_outgoing: tx_outgoing,
            incoming: Some(rx_incoming),
            read_task,
            write_task,
        }
    }

    async fn reader_loop<R>(
        read_half: R,
        tx_incoming: mpsc::UnboundedSender<IrcIncomingEvent>,
        tx_outgoing: mpsc::UnboundedSender<String>,
    )
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(read_half);
        let mut line_buffer = String::new();

        loop {
            line_buffer.clear();
            match reader.read_line(&mut line_buffer).await {
                Ok(0) => {
                    info!("(IrcClient) read_loop => EOF");
                    break;
                }
                Ok(_) => {
                    let line = line_buffer.trim_end().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    debug!("<< {}", line);

                    let parsed = IrcMessage::parse(&line);
                    if parsed.command.eq_ignore_ascii_case("PING") {
                        let token = parsed.trailing.or_else(|| parsed.params.first().cloned()).unwrap_or_default();
                        tx_outgoing.send(format!("PONG :{}", token)).ok();
                        debug!("Auto PONG -> {}", token);
                        continue;
                    }

                    if tx_incoming.send(IrcIncomingEvent::from_message(&parsed, &line)).is_err() {
                        debug!("(IrcClient) nobody listening for incoming events");
                    }
                }
                Err(e) => {
                    error!("(IrcClient) read error => {:?}", e);
                    break;
                }
            }
        }

        info!("(IrcClient) reader_loop ended.");
    }

    async fn writer_loop<W>(
        write_half: W,
        mut rx_outgoing: mpsc::UnboundedReceiver<String>,
    )
    where
        W: AsyncWrite + Unpin,
    {
        let mut writer = BufWriter::new(write_half);

        while let Some(line) = rx_outgoing.recv().await {
            debug!(">> {}", line);
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                error!("writer error => {:?}", e);
                break;
            }
            if let Err(e) = writer.write_all(b"\r\n").await {
                error!("writer error => {:?}", e);
                break;
            }
            if let Err(e) = writer.flush().await {
                error!("writer flush error => {:?}", e);
                break;
            }
        }

        info!("(IrcClient) writer_loop ended.");
    }

    pub fn send_raw_line(&self, line: &str) {
        let _ = self.raw_outgoing.send(line.to_string());
    }

    /// Clone of the outgoing line queue, usable after the client moved elsewhere.
    pub fn outgoing(&self) -> mpsc::UnboundedSender<String> {
        self.raw_outgoing.clone()
    }

    pub fn join_channel(&self, channel: &str) {
        self.send_raw_line(&format!("JOIN {}", channel));
    }

    pub fn part_channel(&self, channel: &str) {
        self.send_raw_line(&format!("PART {}", channel));
    }

    pub fn send_privmsg(&self, channel: &str, message: &str) {
        self.send_raw_line(&format!("PRIVMSG {} :{}", channel, message));
    }

    pub fn shutdown(self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

fn host_of(server: &str) -> &str {
    match server.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => server,
    }
}
