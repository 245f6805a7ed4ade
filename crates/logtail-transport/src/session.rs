// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! TLS session state machine and the connect supervisor.
//!
//! The supervisor owns the connect → authenticate → stream cycle: it
//! re-resolves the collector address on every attempt, tries each resolved
//! endpoint until one completes the TCP+TLS handshake, authenticates, and
//! then parks on a fault-wait while the session is Active. Any write
//! failure on the shared handle (or an authentication rejection) flips the
//! session to Faulted, which is the only thing that moves the loop past
//! Active. Reconnection is unconditional with a fixed delay and no backoff.
//!
//! The trust-anchor certificate must exist before the first attempt; its
//! absence ends the connect loop before it ever dials out.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::{InvalidDnsNameError, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use logtail_core::{ForwardError, Forwarder, Identity, LogEntry};

use crate::framing::{self, FrameError, FrameReader};
use crate::protocol::{AuthReply, AuthRequest, LogMessage};

/// Where one connect/auth/stream cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Resolving,
    Connecting,
    Authenticating,
    Active,
    Faulted,
}

/// Static transport settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub remote_address: String,
    pub remote_port: u16,
    /// Trust-anchor PEM; the only root the TLS client accepts.
    pub ca_cert_path: PathBuf,
    pub identity: Identity,
    pub reconnect_delay: Duration,
    /// Receive limit for a single reply frame.
    pub max_frame_len: usize,
}

/// Errors that end the connect loop for good. Everything else is retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("trust anchor '{0}' does not exist")]
    MissingTrustAnchor(PathBuf),

    #[error("failed to read trust anchor '{path}': {source}")]
    TrustAnchorRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("trust anchor '{path}' is not a usable certificate: {source}")]
    InvalidTrustAnchor {
        path: PathBuf,
        source: tokio_rustls::rustls::Error,
    },

    #[error("trust anchor '{0}' contains no certificates")]
    EmptyTrustAnchor(PathBuf),
}

/// Why a single authentication exchange failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to encode the auth request: {0}")]
    Encode(serde_json::Error),

    #[error("i/o failure during authentication: {0}")]
    Io(io::Error),

    #[error(transparent)]
    Frame(FrameError),

    #[error("malformed auth reply: {0}")]
    Malformed(serde_json::Error),

    #[error("collector rejected the identity")]
    Denied,
}

/// Why a single connect attempt failed. Logged, never propagated.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("'{0}' is not a valid server name: {1}")]
    ServerName(String, InvalidDnsNameError),

    #[error("failed to resolve {0}: {1}")]
    Resolve(String, io::Error),

    #[error("no endpoint of {0} accepted the connection")]
    Exhausted(String),

    #[error("authentication failed: {0}")]
    Auth(AuthError),
}

trait Conn: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Conn for T {}

type BoxConn = Box<dyn Conn>;

/// State shared between the supervisor and every handle clone.
struct Shared {
    identity: Identity,
    state: watch::Sender<SessionState>,
    conn: Mutex<Option<BoxConn>>,
}

impl Shared {
    fn set_state(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(target: "logtail::session", from = ?prev, to = ?next, "session state change");
        }
    }
}

/// Cloneable forwarding handle onto the live session.
///
/// `forward` may run concurrently with a supervisor state transition; the
/// connection slot is the single guarded hand-off point between them.
#[derive(Clone)]
pub struct TransportHandle {
    shared: Arc<Shared>,
}

impl TransportHandle {
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Watch every session state transition (coalesced under load).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }
}

#[async_trait]
impl Forwarder for TransportHandle {
    /// Sends one log frame, fire-and-forget. A write failure faults the
    /// session and wakes the supervisor; the entry is lost.
    async fn forward(&self, entry: &LogEntry) -> Result<(), ForwardError> {
        let mut slot = self.shared.conn.lock().await;
        let Some(conn) = slot.as_mut() else {
            return Err(ForwardError::NotConnected);
        };

        let message = LogMessage::new(self.shared.identity.name(), entry);
        let payload = serde_json::to_vec(&message)?;

        match framing::write_frame(conn, &payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                slot.take();
                self.shared.set_state(SessionState::Faulted);
                warn!(target: "logtail::session", error = %e, "send failed, faulting session");
                Err(ForwardError::Write(e))
            }
        }
    }
}

/// Owns the connect loop. There is exactly one supervisor per configured
/// collector, so at most one session is ever Active.
pub struct Supervisor {
    config: TransportConfig,
    shared: Arc<Shared>,
    states: watch::Receiver<SessionState>,
}

impl Supervisor {
    #[must_use]
    pub fn new(config: TransportConfig) -> (Self, TransportHandle) {
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let shared = Arc::new(Shared {
            identity: config.identity.clone(),
            state: state_tx,
            conn: Mutex::new(None),
        });
        let handle = TransportHandle {
            shared: Arc::clone(&shared),
        };
        (
            Supervisor {
                config,
                shared,
                states: state_rx,
            },
            handle,
        )
    }

    /// Runs the connect loop forever. Returns only when the trust anchor is
    /// unusable, in which case no connection is ever attempted again.
    pub async fn run(self) -> Result<(), TransportError> {
        let connector = build_tls_connector(&self.config.ca_cert_path)?;
        info!(
            target: "logtail::session",
            remote = %self.config.remote_address,
            port = self.config.remote_port,
            "transport supervisor started"
        );
        self.run_with(connector).await
    }

    async fn run_with(mut self, connector: TlsConnector) -> Result<(), TransportError> {
        loop {
            self.shared.set_state(SessionState::Resolving);
            match self.attempt(&connector).await {
                Ok(()) => {
                    debug!(target: "logtail::session", "session ended");
                }
                Err(e) => {
                    warn!(target: "logtail::session", error = %e, "connection attempt failed");
                    self.shared.set_state(SessionState::Faulted);
                }
            }

            self.shared.set_state(SessionState::Disconnected);
            debug!(
                target: "logtail::session",
                delay_secs = self.config.reconnect_delay.as_secs(),
                "waiting before next connect attempt"
            );
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    /// One full connect/auth/stream cycle.
    async fn attempt(&mut self, connector: &TlsConnector) -> Result<(), AttemptError> {
        let authority = format!(
            "{}:{}",
            self.config.remote_address, self.config.remote_port
        );

        let server_name = ServerName::try_from(self.config.remote_address.clone())
            .map_err(|e| AttemptError::ServerName(self.config.remote_address.clone(), e))?;

        let endpoints: Vec<SocketAddr> =
            lookup_host((self.config.remote_address.as_str(), self.config.remote_port))
                .await
                .map_err(|e| AttemptError::Resolve(authority.clone(), e))?
                .collect();

        self.shared.set_state(SessionState::Connecting);

        let mut stream = None;
        for endpoint in endpoints {
            match connect_endpoint(connector, server_name.clone(), endpoint).await {
                Ok(s) => {
                    info!(target: "logtail::session", %endpoint, "connected");
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    debug!(
                        target: "logtail::session",
                        %endpoint,
                        error = %e,
                        "endpoint refused the handshake"
                    );
                }
            }
        }
        let Some(stream) = stream else {
            return Err(AttemptError::Exhausted(authority));
        };

        self.establish(Box::new(stream)).await
    }

    /// Authenticates over an established stream, publishes the connection,
    /// and blocks until a fault fires.
    async fn establish(&mut self, mut conn: BoxConn) -> Result<(), AttemptError> {
        self.shared.set_state(SessionState::Authenticating);

        authenticate(&mut conn, &self.config.identity, self.config.max_frame_len)
            .await
            .map_err(AttemptError::Auth)?;

        info!(
            target: "logtail::session",
            identity = self.config.identity.name(),
            "authenticated"
        );

        *self.shared.conn.lock().await = Some(conn);
        self.shared.set_state(SessionState::Active);

        // Only a fault moves the loop past Active.
        let _ = self
            .states
            .wait_for(|s| matches!(s, SessionState::Faulted))
            .await;

        self.shared.conn.lock().await.take();
        Ok(())
    }
}

/// Sends the auth frame and validates the single reply frame.
async fn authenticate<S>(
    stream: &mut S,
    identity: &Identity,
    max_frame_len: usize,
) -> Result<(), AuthError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + ?Sized,
{
    let payload = serde_json::to_vec(&AuthRequest::new(identity)).map_err(AuthError::Encode)?;
    framing::write_frame(stream, &payload)
        .await
        .map_err(AuthError::Io)?;

    let mut reader = FrameReader::new(&mut *stream, max_frame_len);
    let frame = reader.read_frame().await.map_err(AuthError::Frame)?;

    let reply: AuthReply = serde_json::from_slice(&frame).map_err(AuthError::Malformed)?;
    if reply.is_authenticated() {
        Ok(())
    } else {
        Err(AuthError::Denied)
    }
}

async fn connect_endpoint(
    connector: &TlsConnector,
    server_name: ServerName<'static>,
    endpoint: SocketAddr,
) -> io::Result<TlsStream<TcpStream>> {
    let tcp = TcpStream::connect(endpoint).await?;
    connector.connect(server_name, tcp).await
}

/// Builds the TLS client config with the trust-anchor PEM as the only root.
fn build_tls_connector(ca_cert_path: &Path) -> Result<TlsConnector, TransportError> {
    if !ca_cert_path.exists() {
        return Err(TransportError::MissingTrustAnchor(ca_cert_path.to_path_buf()));
    }

    let pem = std::fs::read(ca_cert_path).map_err(|source| TransportError::TrustAnchorRead {
        path: ca_cert_path.to_path_buf(),
        source,
    })?;

    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        let cert = cert.map_err(|source| TransportError::TrustAnchorRead {
            path: ca_cert_path.to_path_buf(),
            source,
        })?;
        roots
            .add(cert)
            .map_err(|source| TransportError::InvalidTrustAnchor {
                path: ca_cert_path.to_path_buf(),
                source,
            })?;
    }
    if roots.is_empty() {
        return Err(TransportError::EmptyTrustAnchor(ca_cert_path.to_path_buf()));
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}
