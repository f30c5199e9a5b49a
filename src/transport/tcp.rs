//! TCP transport.
//!
//! Uses newline-delimited JSON, one message per line. The dialling side
//! first writes a [`Preamble`] naming the peer id it wants; the listener drops
//! connections addressed to any other id, so the host is only reachable
//! under its room-derived id.

use super::{
    ChannelLink, EndpointEvent, LinkEvent, PeerEndpoint, PeerLink, Transport, TransportError,
    TransportErrorKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long an accepted socket may take to name its target peer.
const PREAMBLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest line accepted from a peer, newline included.
const MAX_LINE_BYTES: u64 = 64 * 1024;

/// First line written by the dialling side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preamble {
    pub target: String,
    pub origin: String,
}

/// TCP transport. Listening endpoints bind `listen_addr`; every endpoint
/// dials `host_addr`.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    listen_addr: Option<SocketAddr>,
    host_addr: SocketAddr,
}

impl TcpTransport {
    /// Transport for the host role: endpoints listen on `listen_addr`.
    pub fn listener(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr: Some(listen_addr),
            host_addr: listen_addr,
        }
    }

    /// Transport for the controller role: endpoints only dial `host_addr`.
    pub fn dialer(host_addr: SocketAddr) -> Self {
        Self {
            listen_addr: None,
            host_addr,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&self, local_id: &str) -> Result<Box<dyn PeerEndpoint>, TransportError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut endpoint = TcpEndpoint {
            local_id: local_id.to_string(),
            listen_addr: self.listen_addr,
            host_addr: self.host_addr,
            events_tx,
            events_rx,
            accept_task: None,
            closed: false,
        };
        endpoint.bind().await?;
        Ok(Box::new(endpoint))
    }
}

struct TcpEndpoint {
    local_id: String,
    listen_addr: Option<SocketAddr>,
    host_addr: SocketAddr,
    events_tx: mpsc::UnboundedSender<EndpointEvent>,
    events_rx: mpsc::UnboundedReceiver<EndpointEvent>,
    accept_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl TcpEndpoint {
    async fn bind(&mut self) -> Result<(), TransportError> {
        let Some(addr) = self.listen_addr else {
            return Ok(());
        };
        let listener = TcpListener::bind(addr).await?;
        info!(peer_id = %self.local_id, %addr, "Listening for controllers");
        self.accept_task = Some(tokio::spawn(accept_loop(
            listener,
            self.local_id.clone(),
            self.events_tx.clone(),
        )));
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.accept_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

#[async_trait]
impl PeerEndpoint for TcpEndpoint {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    async fn next_event(&mut self) -> Option<EndpointEvent> {
        if self.closed {
            return None;
        }
        self.events_rx.recv().await
    }

    async fn connect(&mut self, remote_id: &str) -> Result<Box<dyn PeerLink>, TransportError> {
        if self.closed {
            return Err(TransportError::closed("endpoint already closed"));
        }
        let stream = TcpStream::connect(self.host_addr).await?;
        let (reader, mut writer) = stream.into_split();

        let preamble = Preamble {
            target: remote_id.to_string(),
            origin: self.local_id.clone(),
        };
        let line = serde_json::to_string(&preamble)
            .map_err(|e| TransportError::new(TransportErrorKind::Socket, e.to_string()))?;
        writer.write_all(format!("{}\n", line).as_bytes()).await?;

        debug!(remote_id, addr = %self.host_addr, "Dialled host");
        Ok(Box::new(spawn_stream_link(
            BufReader::new(reader),
            writer,
            remote_id.to_string(),
        )))
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::closed("endpoint already closed"));
        }
        if self.listen_addr.is_some() && !self.is_listening() {
            self.bind().await?;
        }
        Ok(())
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Some(task) = self.accept_task.take() {
                task.abort();
            }
            self.events_rx.close();
        }
    }
}

impl Drop for TcpEndpoint {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    local_id: String,
    events_tx: mpsc::UnboundedSender<EndpointEvent>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(%addr, "Accepted connection");
                tokio::spawn(handle_incoming(stream, local_id.clone(), events_tx.clone()));
            }
            Err(e) => {
                let _ = events_tx.send(EndpointEvent::Error(TransportError::from(e)));
                break;
            }
        }
    }
}

async fn handle_incoming(
    stream: TcpStream,
    local_id: String,
    events_tx: mpsc::UnboundedSender<EndpointEvent>,
) {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    let preamble_line = read_bounded_line(&mut reader, &mut line);
    match tokio::time::timeout(PREAMBLE_TIMEOUT, preamble_line).await {
        Ok(Ok(n)) if n > 0 => {}
        Ok(Ok(_)) => return,
        Ok(Err(e)) => {
            warn!("Failed to read preamble: {}", e);
            return;
        }
        Err(_) => {
            warn!("Timed out waiting for preamble");
            return;
        }
    }

    let preamble: Preamble = match serde_json::from_str(line.trim()) {
        Ok(p) => p,
        Err(e) => {
            warn!("Invalid preamble: {}", e);
            return;
        }
    };
    if preamble.target != local_id {
        info!(
            target_id = %preamble.target,
            local_id = %local_id,
            "Dropping connection addressed to another peer"
        );
        return;
    }

    let link = spawn_stream_link(reader, writer, preamble.origin);
    let _ = events_tx.send(EndpointEvent::Incoming(Box::new(link)));
}

/// Reads one line into `line`. Returns 0 at end of stream and fails on
/// lines longer than `MAX_LINE_BYTES`.
async fn read_bounded_line<R>(reader: &mut R, line: &mut String) -> Result<usize, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let n = reader.take(MAX_LINE_BYTES).read_line(line).await?;
    if n as u64 == MAX_LINE_BYTES && !line.ends_with('\n') {
        return Err(TransportError::new(
            TransportErrorKind::Socket,
            format!("line exceeds {} bytes", MAX_LINE_BYTES),
        ));
    }
    Ok(n)
}

/// Wraps a split TCP stream in a [`ChannelLink`] driven by a reader and a
/// writer task.
fn spawn_stream_link(
    mut reader: BufReader<OwnedReadHalf>,
    mut writer: OwnedWriteHalf,
    remote_id: String,
) -> ChannelLink {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<LinkEvent>();
    let _ = inbound_tx.send(LinkEvent::Open);

    tokio::spawn(async move {
        let mut line = String::new();
        loop {
            line.clear();
            match read_bounded_line(&mut reader, &mut line).await {
                Ok(0) => {
                    let _ = inbound_tx.send(LinkEvent::Close);
                    break;
                }
                Ok(_) => {
                    let message = line.trim();
                    if !message.is_empty()
                        && inbound_tx
                            .send(LinkEvent::Data(message.to_string()))
                            .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    let _ = inbound_tx.send(LinkEvent::Error(e));
                    let _ = inbound_tx.send(LinkEvent::Close);
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            match event {
                LinkEvent::Data(message) => {
                    if writer
                        .write_all(format!("{}\n", message).as_bytes())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                LinkEvent::Close => {
                    let _ = writer.shutdown().await;
                    break;
                }
                LinkEvent::Open | LinkEvent::Error(_) => {}
            }
        }
    });

    ChannelLink::new(remote_id, outbound_tx, inbound_rx)
}

#[cfg(test)]
#[path = "tests/tcp_tests.rs"]
mod tests;
