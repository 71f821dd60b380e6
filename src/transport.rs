//! Transport seam: the codec's view of the wire.
//!
//! The stream codec treats its transport purely as an ordered, reliable byte
//! sink. It never opens, closes or retries the underlying connection;
//! backpressure and queuing stay with whoever owns the socket. This module
//! defines that seam and the two sinks used in practice: an in-memory
//! capture buffer for synchronous callers and tests, and a channel sink
//! that hands codec output to the task owning the socket write half.

use std::io;

use tokio::sync::mpsc;

/// Ordered byte sink the codec writes to.
///
/// One `send` per codec drain pass: all bytes of a pass arrive in a single
/// call, in production order. Errors are the sink's own and propagate
/// unchanged through the codec.
pub trait ByteSink {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl ByteSink for Vec<u8> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).send(bytes)
    }
}

/// Sink that forwards each drain pass to an async writer task.
///
/// The channel is unbounded so a pass is never partially delivered; the
/// writer task applies the transport's real backpressure when it performs
/// the socket write. A closed channel means the writer task is gone and
/// surfaces as `BrokenPipe`.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { tx }
    }
}

impl ByteSink for ChannelSink {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "transport channel closed"))
    }
}
