//! Server endpoint and the shared connection wrapper.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use quinn::{Connection, Endpoint, RecvStream, SendStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::cert::ServerIdentity;
use crate::error::{Result, TransportError};
use crate::settings::TransportSettings;
use crate::{ConnectionEvent, ALPN};

/// Depth of the per-connection event queue.
const EVENT_QUEUE_DEPTH: usize = 512;

/// Read chunk size for the control stream.
const CONTROL_READ_BUF: usize = 4096;

/// Listening QUIC endpoint for the streaming server.
pub struct ServerTransport {
    endpoint: Endpoint,
}

impl ServerTransport {
    /// Bind the endpoint on all interfaces at `port`.
    pub fn bind(identity: ServerIdentity, port: u16, settings: TransportSettings) -> Result<Self> {
        let mut crypto = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![identity.cert], identity.key)
            .map_err(|e| TransportError::certificate(format!("rustls rejected identity: {e}")))?;
        crypto.alpn_protocols = vec![ALPN.to_vec()];

        let crypto = quinn::crypto::rustls::QuicServerConfig::try_from(crypto)
            .map_err(|e| TransportError::setup(format!("crypto config: {e}")))?;
        let mut config = quinn::ServerConfig::with_crypto(Arc::new(crypto));
        config.transport_config(Arc::new(settings.build()?));

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let endpoint = Endpoint::server(config, addr)?;
        Ok(Self { endpoint })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.endpoint.local_addr()?)
    }

    /// Wait for the next client. Returns `None` once the endpoint closes.
    ///
    /// The returned connection is ready for use: the client's control
    /// stream has been accepted and the event loops are running.
    pub async fn accept(&self) -> Option<Result<TransportConnection>> {
        let incoming = self.endpoint.accept().await?;
        let result = async {
            let connection = incoming
                .await
                .map_err(|e| TransportError::connect(e.to_string()))?;
            debug!(remote = %connection.remote_address(), "connection established");
            let (send, recv) = connection
                .accept_bi()
                .await
                .map_err(|e| TransportError::closed(format!("no control stream: {e}")))?;
            Ok(TransportConnection::start(connection, send, recv))
        }
        .await;
        Some(result)
    }

    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"server shutdown");
    }
}

/// One established connection: media datagrams plus the control stream,
/// surfaced as a channel of [`ConnectionEvent`]s.
///
/// quinn hands results to whoever awaits them; this wrapper pins the
/// receive side in two owned tasks so the rest of the system consumes a
/// plain queue and never touches the QUIC handle for reads.
pub struct TransportConnection {
    connection: Connection,
    control_send: Arc<Mutex<SendStream>>,
    events: mpsc::Receiver<ConnectionEvent>,
}

impl TransportConnection {
    pub(crate) fn start(connection: Connection, send: SendStream, recv: RecvStream) -> Self {
        let (event_tx, events) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let datagram_conn = connection.clone();
        let datagram_tx = event_tx.clone();
        tokio::spawn(async move {
            loop {
                match datagram_conn.read_datagram().await {
                    Ok(datagram) => {
                        // Shed load instead of stalling the QUIC driver
                        // when the consumer falls behind.
                        if datagram_tx
                            .try_send(ConnectionEvent::Datagram(datagram))
                            .is_err()
                        {
                            warn!("datagram queue full, dropping");
                        }
                    }
                    Err(e) => {
                        let _ = datagram_tx
                            .send(ConnectionEvent::Closed {
                                reason: e.to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }
        });

        let control_tx = event_tx;
        let mut recv = recv;
        tokio::spawn(async move {
            let mut buf = vec![0u8; CONTROL_READ_BUF];
            loop {
                match recv.read(&mut buf).await {
                    Ok(Some(n)) => {
                        if control_tx
                            .send(ConnectionEvent::Control(Bytes::copy_from_slice(&buf[..n])))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = control_tx
                            .send(ConnectionEvent::Closed {
                                reason: "control stream finished".into(),
                            })
                            .await;
                        break;
                    }
                    Err(e) => {
                        let _ = control_tx
                            .send(ConnectionEvent::Closed {
                                reason: e.to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }
        });

        Self {
            connection,
            control_send: Arc::new(Mutex::new(send)),
            events,
        }
    }

    /// Send one media datagram, best effort.
    pub fn send_datagram(&self, data: Bytes) -> Result<()> {
        self.connection
            .send_datagram(data)
            .map_err(|e| TransportError::Datagram {
                reason: e.to_string(),
            })
    }

    /// Write bytes to the control stream.
    pub async fn send_control(&self, data: &[u8]) -> Result<()> {
        let mut stream = self.control_send.lock().await;
        stream
            .write_all(data)
            .await
            .map_err(|e| TransportError::Stream {
                reason: e.to_string(),
            })
    }

    /// Next event, `None` after `Closed` has been consumed and the queues
    /// drained.
    pub async fn recv_event(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }

    /// Largest datagram the path currently supports.
    pub fn max_datagram_size(&self) -> Option<usize> {
        self.connection.max_datagram_size()
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    pub fn close(&self, reason: &str) {
        self.connection.close(0u32.into(), reason.as_bytes());
    }

    /// Clone of the underlying handle for senders that outlive the event
    /// consumer (e.g. the stream pipeline).
    pub fn sender(&self) -> ConnectionSender {
        ConnectionSender {
            connection: self.connection.clone(),
            control_send: Arc::clone(&self.control_send),
        }
    }
}

/// Cheap send-only handle onto a connection.
#[derive(Clone)]
pub struct ConnectionSender {
    connection: Connection,
    control_send: Arc<Mutex<SendStream>>,
}

impl ConnectionSender {
    pub fn send_datagram(&self, data: Bytes) -> Result<()> {
        self.connection
            .send_datagram(data)
            .map_err(|e| TransportError::Datagram {
                reason: e.to_string(),
            })
    }

    pub async fn send_control(&self, data: &[u8]) -> Result<()> {
        let mut stream = self.control_send.lock().await;
        stream
            .write_all(data)
            .await
            .map_err(|e| TransportError::Stream {
                reason: e.to_string(),
            })
    }

    pub fn max_datagram_size(&self) -> Option<usize> {
        self.connection.max_datagram_size()
    }
}
