//! Live-connection binding for a stream codec pair.
//!
//! One [`CompressedLink`] serves one connected transport. An outbound task
//! owns the compressor and the transport's write half; an inbound task owns
//! the decompressor and the read half. Each codec therefore has exactly one
//! logical writer, which is the ownership rule the codecs require. A
//! broadcast shutdown channel carries the "about to close" signal: both
//! tasks leave their pump loops and finalize their codec while the
//! transport is still up, so the peer sees a legally terminated compressed
//! stream instead of a truncated one.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::compression::{Compression, Compressor, Decompressor};
use crate::transport::ChannelSink;

/// Read buffer size for the inbound half.
const READ_BUFFER_SIZE: usize = 8192;

/// Monotonic link id for correlating the two directions' logs.
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Why a direction's pump loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpEndReason {
    /// Outbound only: every sender handle was dropped.
    SendersDropped,
    /// Inbound only: the peer closed the transport.
    TransportClosed,
    /// The transport read or write itself failed.
    TransportError,
    /// The codec reported a connection-fatal fault.
    CodecFault,
    /// The link's shutdown signal fired.
    Shutdown,
}

/// Compressed duplex link over a connected byte transport.
///
/// Plaintext units queued with [`send`](Self::send) come out of the peer's
/// decompressor in order; decompressed units from the peer arrive through
/// [`recv`](Self::recv). [`close`](Self::close) signals both directions to
/// finalize and waits for them.
pub struct CompressedLink {
    link_id: u64,
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    shutdown_tx: broadcast::Sender<()>,
    outbound_task: JoinHandle<()>,
    inbound_task: JoinHandle<()>,
}

impl CompressedLink {
    /// Bind a fresh codec pair to `transport` and start both pumps.
    pub fn attach<T>(transport: T, level: Compression) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let link_id = NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed);
        let (read_half, write_half) = tokio::io::split(transport);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(link_id, "compressed link attached");

        let outbound_task = tokio::spawn(pump_outbound(
            link_id,
            level,
            outbound_rx,
            write_half,
            shutdown_tx.subscribe(),
        ));
        let inbound_task = tokio::spawn(pump_inbound(
            link_id,
            read_half,
            inbound_tx,
            shutdown_tx.subscribe(),
        ));

        Self {
            link_id,
            outbound_tx,
            inbound_rx,
            shutdown_tx,
            outbound_task,
            inbound_task,
        }
    }

    /// Queue one logical unit for compression and transmission.
    pub fn send(&self, unit: Vec<u8>) -> io::Result<()> {
        self.outbound_tx
            .send(unit)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "outbound pump is gone"))
    }

    /// Next decompressed unit from the peer, or `None` once the inbound
    /// direction has ended.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.inbound_rx.recv().await
    }

    /// True when either direction has already ended.
    pub fn is_closed(&self) -> bool {
        self.outbound_task.is_finished() || self.inbound_task.is_finished()
    }

    /// Signal "about to close" to both directions and wait for them to
    /// finalize their codecs and exit.
    pub async fn close(self) {
        info!(link_id = self.link_id, "closing compressed link");
        let _ = self.shutdown_tx.send(());
        let _ = self.outbound_task.await;
        let _ = self.inbound_task.await;
    }
}

/// Move every pending wire buffer from the codec's sink channel to the
/// transport, preserving production order.
async fn flush_wire<W: AsyncWrite + Unpin>(
    wire_rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    write_half: &mut W,
) -> io::Result<()> {
    while let Ok(buf) = wire_rx.try_recv() {
        write_half.write_all(&buf).await?;
    }
    write_half.flush().await
}

/// Outbound pump: plaintext units in, compressed wire bytes out.
///
/// The compressor's sink is a channel drained to the write half after every
/// codec call, so a unit's wire bytes hit the transport before the next
/// unit is fed.
async fn pump_outbound<W>(
    link_id: u64,
    level: Compression,
    mut units: mpsc::UnboundedReceiver<Vec<u8>>,
    mut write_half: W,
    mut shutdown: broadcast::Receiver<()>,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (wire_tx, mut wire_rx) = mpsc::unbounded_channel();
    let mut compressor = Compressor::with_level(ChannelSink::new(wire_tx), level);

    let end_reason = loop {
        tokio::select! {
            unit = units.recv() => match unit {
                Some(unit) => {
                    debug!(link_id, bytes = unit.len(), "outbound unit");
                    if let Err(e) = compressor.write(&unit) {
                        error!(link_id, error = %e, "outbound codec fault");
                        break PumpEndReason::CodecFault;
                    }
                    if let Err(e) = flush_wire(&mut wire_rx, &mut write_half).await {
                        error!(link_id, error = %e, "outbound transport write failed");
                        break PumpEndReason::TransportError;
                    }
                }
                None => break PumpEndReason::SendersDropped,
            },
            _ = shutdown.recv() => break PumpEndReason::Shutdown,
        }
    };

    // About to close: emit the stream trailer while the transport is still
    // up, then shut the write half so the peer observes a clean end.
    if let Err(e) = compressor.finalize() {
        error!(link_id, error = %e, "outbound finalize failed");
    }
    if let Err(e) = flush_wire(&mut wire_rx, &mut write_half).await {
        debug!(link_id, error = %e, "trailer write failed, transport already down");
    }
    let _ = write_half.shutdown().await;

    info!(link_id, reason = ?end_reason, "outbound pump ended");
}

/// Inbound pump: wire bytes in, decompressed units out.
async fn pump_inbound<R>(
    link_id: u64,
    mut read_half: R,
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    mut shutdown: broadcast::Receiver<()>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut decompressor = Decompressor::new(ChannelSink::new(inbound_tx));
    let mut read_buf = [0u8; READ_BUFFER_SIZE];

    let end_reason = loop {
        tokio::select! {
            read = read_half.read(&mut read_buf) => match read {
                Ok(0) => break PumpEndReason::TransportClosed,
                Ok(n) => {
                    debug!(link_id, bytes = n, "inbound wire data");
                    if let Err(e) = decompressor.write(&read_buf[..n]) {
                        error!(link_id, error = %e, "inbound codec fault");
                        break PumpEndReason::CodecFault;
                    }
                }
                Err(e) => {
                    error!(link_id, error = %e, "transport read error");
                    break PumpEndReason::TransportError;
                }
            },
            _ = shutdown.recv() => break PumpEndReason::Shutdown,
        }
    };

    if let Err(e) = decompressor.finalize() {
        error!(link_id, error = %e, "inbound finalize failed");
    }

    info!(link_id, reason = ?end_reason, "inbound pump ended");
}
