//! TCP transport with SLIP framing.
//!
//! The server speaks SLIP over a plain TCP stream.  [`TcpSlipConnector`]
//! opens the stream and splits it into a [`SlipReader`] and a [`SlipWriter`],
//! which implement the application layer's frame ports.
//!
//! # Binary streaming
//!
//! TCP is a *stream* protocol: a single `read()` may return a fragment of a
//! frame or several frames at once.  [`SlipReader`] feeds every chunk into a
//! [`SlipDecoder`], which keeps partial frames between reads, and hands out
//! completed frames one at a time.
//!
//! Both halves are generic over `AsyncRead`/`AsyncWrite` so the framing can be
//! tested against `tokio_test::io::Mock` without a socket.

pub mod mock;

use std::collections::VecDeque;
use std::net::{SocketAddr, ToSocketAddrs};

use async_trait::async_trait;
use smartport_core::protocol::slip::{encode_frame, SlipDecoder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::application::transport::{
    ConnectError, Connector, FrameReader, FrameWriter, Link, TransportError,
};

const READ_CHUNK: usize = 4096;

/// Resolves `host:port` once, preferring an IPv4 address.
///
/// Blocks on the system resolver; call it before the bus loop starts.
///
/// # Errors
///
/// [`ConnectError::Resolve`] if the lookup fails and
/// [`ConnectError::NoAddress`] if it returns nothing.
pub fn resolve_server_addr(host: &str, port: u16) -> Result<SocketAddr, ConnectError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| ConnectError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ConnectError::NoAddress {
            host: host.to_string(),
        })
}

/// Opens SLIP-framed TCP links to the server.
#[derive(Debug, Clone)]
pub struct TcpSlipConnector {
    max_frame_len: usize,
}

impl TcpSlipConnector {
    /// `max_frame_len` caps a single decoded frame; longer frames are dropped.
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

#[async_trait]
impl Connector for TcpSlipConnector {
    async fn connect(&self, addr: SocketAddr) -> Result<Link, ConnectError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ConnectError::Connect { addr, source })?;

        // Requests and responses are small and latency-bound.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle on {addr}: {e}");
        }

        let (read_half, write_half) = stream.into_split();
        Ok(Link {
            reader: Box::new(SlipReader::new(read_half, self.max_frame_len)),
            writer: Box::new(SlipWriter::new(write_half)),
        })
    }
}

/// Reads SLIP frames from a byte stream.
pub struct SlipReader<R> {
    inner: R,
    decoder: SlipDecoder,
    ready: VecDeque<Vec<u8>>,
    chunk: Vec<u8>,
}

impl<R> SlipReader<R> {
    pub fn new(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner,
            decoder: SlipDecoder::new(max_frame_len),
            ready: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK],
        }
    }
}

#[async_trait]
impl<R> FrameReader for SlipReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }

            let n = self.inner.read(&mut self.chunk).await?;
            if n == 0 {
                if self.decoder.pending_len() > 0 {
                    debug!(
                        "stream closed with {} bytes of an unfinished frame",
                        self.decoder.pending_len()
                    );
                }
                return Ok(None);
            }

            for result in self.decoder.feed(&self.chunk[..n]) {
                match result {
                    Ok(frame) => self.ready.push_back(frame),
                    Err(e) => warn!("dropping corrupt SLIP frame: {e}"),
                }
            }
        }
    }
}

/// Writes SLIP frames to a byte stream.
pub struct SlipWriter<W> {
    inner: W,
}

impl<W> SlipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W> FrameWriter for SlipWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let wire = encode_frame(frame);
        self.inner.write_all(&wire).await?;
        self.inner.flush().await?;
        Ok(())
    }
}
