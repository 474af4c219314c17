//! HTTP responder for the readings page.
//!
//! Every request, whatever its method or path, gets the same `200 OK` page
//! built from a fresh [`ReadingSnapshot`](crate::sensors::ReadingSnapshot).
//! The accept loop hands each connection to its own task and goes straight
//! back to accepting, so a stalled client only ever holds up itself.
//!
//! There is no cap on live handlers and no read or write timeout: a client
//! that never sends, or never drains the response, keeps its task and
//! socket until it goes away. That is acceptable for a handful of LAN
//! clients and is the intended operating envelope.

pub mod config;
pub mod page;

// Re-export commonly used items
pub use config::WebConfig;
pub use page::{render, RESPONSE_HEADER};

use crate::error::{MonitorError, Result};
use crate::sensors::SensorPipeline;
use std::fmt;
use std::future::{self, Future};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Per-connection settings copied into every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Maximum request bytes read before responding
    pub request_buffer_size: usize,
    /// Page reload interval in milliseconds
    pub refresh_ms: u64,
}

impl From<&WebConfig> for ConnectionOptions {
    fn from(config: &WebConfig) -> Self {
        Self {
            request_buffer_size: config.request_buffer_size,
            refresh_ms: config.refresh_ms,
        }
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::from(&WebConfig::default())
    }
}

/// Progress of a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    RequestReceived,
    ResponseSent,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "accepted",
            Self::RequestReceived => "request received",
            Self::ResponseSent => "response sent",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Serve one connection and release it.
///
/// The handler owns `conn`; it is dropped exactly once before this returns,
/// whether the exchange succeeded or failed part way. Failures are logged
/// here and returned for the caller's benefit only.
pub async fn handle_connection<C>(
    mut conn: C,
    pipeline: &SensorPipeline,
    options: ConnectionOptions,
) -> Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut state = ConnectionState::Accepted;
    let result = exchange(&mut conn, pipeline, options, &mut state).await;

    drop(conn);

    match &result {
        Ok(()) => trace!("Connection {}", ConnectionState::Closed),
        Err(e) => warn!("Connection dropped after '{}': {}", state, e),
    }
    result
}

async fn exchange<C>(
    conn: &mut C,
    pipeline: &SensorPipeline,
    options: ConnectionOptions,
    state: &mut ConnectionState,
) -> Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    // Request content is ignored; there is only one page.
    let mut request = vec![0u8; options.request_buffer_size];
    let received = conn.read(&mut request).await?;
    *state = ConnectionState::RequestReceived;
    trace!("Received {} request bytes", received);

    let snapshot = pipeline.capture()?;
    let body = page::render(&snapshot, options.refresh_ms);

    conn.write_all(RESPONSE_HEADER.as_bytes()).await?;
    conn.write_all(body.as_bytes()).await?;
    conn.flush().await?;
    *state = ConnectionState::ResponseSent;

    conn.shutdown().await?;
    Ok(())
}

/// Accept loop bound to one listening socket.
pub struct ConnectionServer {
    listener: TcpListener,
    pipeline: Arc<SensorPipeline>,
    options: ConnectionOptions,
}

impl ConnectionServer {
    /// Bind the listening socket described by `config`.
    ///
    /// Taking a [`SensorPipeline`] means calibration has already finished.
    pub async fn bind(config: &WebConfig, pipeline: Arc<SensorPipeline>) -> Result<Self> {
        let addr = config
            .bind_address()
            .parse::<SocketAddr>()
            .map_err(|e| MonitorError::config_error(format!("Invalid bind address: {}", e)))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| MonitorError::web_server_error(format!("Failed to create socket: {}", e)))?;

        socket.set_reuseaddr(true)?;
        socket.bind(addr).map_err(|e| {
            MonitorError::web_server_error(format!("Failed to bind to address: {}", e))
        })?;
        let listener = socket
            .listen(config.backlog)
            .map_err(|e| MonitorError::web_server_error(format!("Failed to listen: {}", e)))?;

        Ok(Self {
            listener,
            pipeline,
            options: ConnectionOptions::from(config),
        })
    }

    /// Address the server is actually listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    ///
    /// Only returns if `accept` itself fails.
    pub async fn run(self) -> Result<()> {
        self.run_until(future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Handlers already spawned keep running to completion.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => accepted.map_err(|e| {
                    error!("Accept failed: {}", e);
                    MonitorError::web_server_error(format!("Accept failed: {}", e))
                })?,
                _ = &mut shutdown => {
                    info!("Shutting down reading server");
                    return Ok(());
                }
            };

            debug!("Got a connection from {}", peer);
            let pipeline = Arc::clone(&self.pipeline);
            let options = self.options;

            tokio::spawn(
                async move {
                    let _ = handle_connection(stream, &pipeline, options).await;
                }
                .instrument(info_span!("connection", %peer)),
            );
        }
    }
}

/// Bind and serve the readings page with the provided configuration.
pub async fn start_web_server(config: WebConfig, pipeline: Arc<SensorPipeline>) -> Result<()> {
    let server = ConnectionServer::bind(&config, pipeline).await?;
    let addr = server.local_addr()?;

    info!("Starting reading server on http://{}", addr);
    info!("Page reloads every {} ms", config.refresh_ms);

    server.run().await
}
