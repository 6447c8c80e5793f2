//! WebSocket connection to the sampler plugin
//!
//! Exactly one logical connection exists. This task only moves text frames
//! between the socket and the synchronizer actor; on any close or error it
//! waits the reconnect delay and starts over. It stops when the actor goes
//! away.

use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use crate::config::ConnectionConfig;
use crate::sync::LinkEvent;

/// Connection status as seen by consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    /// Waiting to retry; `attempt` counts failures since the last session
    Reconnecting { attempt: u32 },
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => f.write_str("connected"),
            ConnectionStatus::Disconnected => f.write_str("disconnected"),
            ConnectionStatus::Reconnecting { attempt } => write!(f, "reconnecting (#{})", attempt),
        }
    }
}

/// Which URL scheme to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// `ws://`
    #[default]
    Plain,
    /// `wss://`
    Secure,
    /// Alternate `ws://` and `wss://` between attempts, starting with `ws://`
    Auto,
}

impl TransportMode {
    /// URL scheme for the given 0-based connection attempt
    pub fn scheme(self, attempt: u32) -> &'static str {
        match self {
            TransportMode::Plain => "ws",
            TransportMode::Secure => "wss",
            TransportMode::Auto if attempt % 2 == 0 => "ws",
            TransportMode::Auto => "wss",
        }
    }
}

/// Where the plugin listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub transport: TransportMode,
    pub path: String,
}

impl Endpoint {
    pub fn url(&self, attempt: u32) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!(
            "{}://{}:{}{}",
            self.transport.scheme(attempt),
            self.host,
            self.port,
            path
        )
    }
}

impl From<&ConnectionConfig> for Endpoint {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            transport: config.transport,
            path: config.path.clone(),
        }
    }
}

/// Connect, pump frames, and reconnect after `reconnect_delay` forever.
///
/// Returns once the actor side of `link_tx` is dropped.
pub async fn run(
    endpoint: Endpoint,
    reconnect_delay: Duration,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
) {
    // Failures since the last good session, and failures overall (scheme choice)
    let mut attempt: u32 = 0;
    let mut failures: u32 = 0;

    loop {
        let url = endpoint.url(failures);
        info!("🔌 Connecting to sampler plugin at {}", url);

        let result = tokio::select! {
            _ = link_tx.closed() => break,
            result = session(&url, &link_tx) => result,
        };

        match result {
            Ok(true) => {
                info!("Connection to {} closed", url);
                attempt = 0;
            },
            Ok(false) => {},
            Err(e) => {
                warn!("⚠️ Connection to {} failed: {:#}", url, e);
                failures = failures.wrapping_add(1);
            },
        }

        if link_tx.send(LinkEvent::Closed).is_err() {
            break;
        }

        attempt = attempt.wrapping_add(1);
        debug!("⏳ Reconnect #{} in {}ms", attempt, reconnect_delay.as_millis());
        if link_tx.send(LinkEvent::Reconnecting { attempt }).is_err() {
            break;
        }

        tokio::select! {
            _ = link_tx.closed() => break,
            _ = sleep(reconnect_delay) => {},
        }
    }

    debug!("Connection task stopped");
}

/// One socket session. `Ok(true)` after a session that was opened and then
/// closed, `Ok(false)` when the actor went away.
async fn session(url: &str, link_tx: &mpsc::UnboundedSender<LinkEvent>) -> Result<bool> {
    let (socket, _response) = connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    info!("✅ Connected to sampler plugin");

    let (mut sink, mut stream) = socket.split();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<String>();
    link_tx
        .send(LinkEvent::Opened(outbox_tx))
        .map_err(|_| anyhow!("synchronizer stopped"))?;

    loop {
        tokio::select! {
            outbound = outbox_rx.recv() => match outbound {
                Some(text) => {
                    sink.send(Message::text(text))
                        .await
                        .context("Failed to send frame")?;
                },
                // The actor dropped the session outbox: it is shutting down
                None => return Ok(false),
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if link_tx.send(LinkEvent::Frame(text)).is_err() {
                        return Ok(false);
                    }
                },
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        if link_tx.send(LinkEvent::Frame(text)).is_err() {
                            return Ok(false);
                        }
                    },
                    Err(_) => debug!(len = bytes.len(), "Ignoring non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Close frame received");
                    return Ok(true);
                },
                // Pings are answered by tungstenite on the next write
                Some(Ok(other)) => trace!(?other, "Ignoring control frame"),
                Some(Err(e)) => return Err(e).context("WebSocket read failed"),
                None => return Ok(true),
            },
        }
    }
}
