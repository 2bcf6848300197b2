//! Byte-stream transports that carry frames.
//!
//! The connection manager never touches sockets directly.  It asks a
//! [`Connector`] for a [`FramedLink`] (a reader half and a writer half that
//! speak whole frames) and drives the link until it fails.
//!
//! # TCP vs RFCOMM (for beginners)
//!
//! Both transports are plain byte streams once open: a `TcpStream` on one
//! side, a Bluetooth RFCOMM socket on the other.  Only *opening* differs, so
//! each transport is a [`Connector`], and both hand their stream to the same
//! generic [`StreamFrameReader`]/[`StreamFrameWriter`] pair.  RFCOMM sockets
//! come from the platform Bluetooth stack through [`RfcommSocketFactory`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use remote_core::protocol::frame::{self, TransportError};
use remote_core::{DeviceDescriptor, TransportKind};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Rfcomm { address: String },
}

impl Endpoint {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn rfcomm(address: impl Into<String>) -> Self {
        Endpoint::Rfcomm {
            address: address.into(),
        }
    }

    pub fn transport(&self) -> TransportKind {
        match self {
            Endpoint::Tcp { .. } => TransportKind::Tcp,
            Endpoint::Rfcomm { .. } => TransportKind::Rfcomm,
        }
    }

    /// `host:port` for TCP, the Bluetooth address for RFCOMM.
    pub fn address(&self) -> String {
        match self {
            Endpoint::Tcp { host, port } => format!("{host}:{port}"),
            Endpoint::Rfcomm { address } => address.clone(),
        }
    }

    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(self.transport(), self.address())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.transport(), self.address())
    }
}

// ── Frame halves ──────────────────────────────────────────────────────────────

/// Reading half of a link.
#[async_trait]
pub trait FrameReader: Send {
    /// Waits for the next complete frame payload.
    async fn read_frame(&mut self) -> Result<Vec<u8>, TransportError>;
}

/// Writing half of a link.
#[async_trait]
pub trait FrameWriter: Send {
    /// Writes one frame carrying `payload`.
    async fn write_frame(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Shuts the stream down.  Further writes fail.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// An open link: a reader half and a writer half.
pub struct FramedLink {
    pub reader: Box<dyn FrameReader>,
    pub writer: Box<dyn FrameWriter>,
}

impl FramedLink {
    /// Splits any duplex stream into framed halves.
    pub fn from_stream<S>(stream: S, max_frame_len: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: Box::new(StreamFrameReader::new(read_half, max_frame_len)),
            writer: Box::new(StreamFrameWriter::new(write_half)),
        }
    }
}

impl fmt::Debug for FramedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedLink").finish_non_exhaustive()
    }
}

/// [`FrameReader`] over any `AsyncRead`.
pub struct StreamFrameReader<R> {
    inner: R,
    max_frame_len: usize,
}

impl<R> StreamFrameReader<R> {
    pub fn new(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner,
            max_frame_len,
        }
    }
}

#[async_trait]
impl<R> FrameReader for StreamFrameReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        frame::read_frame(&mut self.inner, self.max_frame_len).await
    }
}

/// [`FrameWriter`] over any `AsyncWrite`.
pub struct StreamFrameWriter<W> {
    inner: W,
}

impl<W> StreamFrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W> FrameWriter for StreamFrameWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        frame::write_frame(&mut self.inner, payload).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

// ── Connectors ────────────────────────────────────────────────────────────────

/// Opens links for endpoints of the kinds it supports.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a link to `endpoint`.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectFailed`] when the peer cannot be reached and
    /// [`TransportError::Unsupported`] for an endpoint kind this connector
    /// does not handle.  The caller applies the connect timeout.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        max_frame_len: usize,
    ) -> Result<FramedLink, TransportError>;
}

/// Connects TCP endpoints with tokio's `TcpStream`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        max_frame_len: usize,
    ) -> Result<FramedLink, TransportError> {
        let Endpoint::Tcp { host, port } = endpoint else {
            return Err(TransportError::Unsupported(endpoint.to_string()));
        };
        let stream = TcpStream::connect((host.as_str(), *port))
            .await
            .map_err(|source| TransportError::ConnectFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;
        // Small input packets must not wait for Nagle coalescing.
        if let Err(e) = stream.set_nodelay(true) {
            warn!("could not disable Nagle on {endpoint}: {e}");
        }
        debug!("tcp stream open to {endpoint}");
        Ok(FramedLink::from_stream(stream, max_frame_len))
    }
}

/// Platform hook that opens an RFCOMM socket to a Bluetooth address.
#[async_trait]
pub trait RfcommSocketFactory: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    async fn open(&self, address: &str) -> std::io::Result<Self::Stream>;
}

/// Connects RFCOMM endpoints through a platform [`RfcommSocketFactory`].
pub struct RfcommConnector<F> {
    factory: F,
}

impl<F> RfcommConnector<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F> Connector for RfcommConnector<F>
where
    F: RfcommSocketFactory,
{
    async fn connect(
        &self,
        endpoint: &Endpoint,
        max_frame_len: usize,
    ) -> Result<FramedLink, TransportError> {
        let Endpoint::Rfcomm { address } = endpoint else {
            return Err(TransportError::Unsupported(endpoint.to_string()));
        };
        let stream = self
            .factory
            .open(address)
            .await
            .map_err(|source| TransportError::ConnectFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;
        debug!("rfcomm socket open to {endpoint}");
        Ok(FramedLink::from_stream(stream, max_frame_len))
    }
}

/// Dispatches to the connector registered for the endpoint's transport.
#[derive(Clone)]
pub struct EndpointConnector {
    tcp: Option<Arc<dyn Connector>>,
    rfcomm: Option<Arc<dyn Connector>>,
}

impl EndpointConnector {
    /// TCP only.
    pub fn tcp() -> Self {
        Self {
            tcp: Some(Arc::new(TcpConnector)),
            rfcomm: None,
        }
    }

    /// Adds (or replaces) the RFCOMM connector.
    pub fn with_rfcomm(mut self, connector: Arc<dyn Connector>) -> Self {
        self.rfcomm = Some(connector);
        self
    }

    /// Replaces the TCP connector.
    pub fn with_tcp(mut self, connector: Arc<dyn Connector>) -> Self {
        self.tcp = Some(connector);
        self
    }
}

#[async_trait]
impl Connector for EndpointConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        max_frame_len: usize,
    ) -> Result<FramedLink, TransportError> {
        let connector = match endpoint {
            Endpoint::Tcp { .. } => self.tcp.as_ref(),
            Endpoint::Rfcomm { .. } => self.rfcomm.as_ref(),
        };
        match connector {
            Some(c) => c.connect(endpoint, max_frame_len).await,
            None => Err(TransportError::Unsupported(endpoint.to_string())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
