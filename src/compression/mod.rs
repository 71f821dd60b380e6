//! Stateful stream compression over a live byte transport.
//!
//! One compressor and one decompressor serve each connection, one per
//! direction, each exclusively owned by the path that drives it. Every
//! `write` call carries one logical unit of protocol data (typically a
//! stanza); a synchronizing flush after each non-final write keeps that unit
//! independently decodable by the peer, so the receiving side never has to
//! buffer across unit boundaries waiting for more wire data. `finalize`
//! emits the bytes that close the stream format legally and must run before
//! the owning connection goes away; it is idempotent.

mod engine;

pub mod bridge;

pub use bridge::CompressedLink;
pub use engine::{DeflateEngine, EngineError, EngineStep, Flush, InflateEngine, StreamEngine};
pub use flate2::Compression;

use std::io;

use thiserror::Error;
use tracing::debug;

use crate::transport::ByteSink;

/// Size of one engine output segment.
///
/// Compressed stanzas are small, so one segment usually holds a full drain
/// pass; bulk payloads just loop. Raising this trades stack per call against
/// iterations for large transfers.
const OUTPUT_SEGMENT: usize = 1024;

/// Errors from the stream codec.
///
/// `EngineFault` and `DesyncFault` are fatal to the owning connection:
/// codec and peer state are no longer aligned, so no retry is meaningful.
/// The connection must be torn down and re-established with fresh codec
/// instances.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The compression engine reported an unrecoverable internal error.
    #[error("compression engine fault: {0}")]
    EngineFault(#[from] EngineError),
    /// The decompressor left wire bytes unconsumed after a drain pass:
    /// the compressed stream is malformed or the two sides have lost
    /// framing alignment.
    #[error("compressed stream desynchronized: {remaining} input bytes left unconsumed")]
    DesyncFault { remaining: usize },
    /// `write` was called after `finalize`.
    #[error("codec already finalized")]
    Finalized,
    /// The bound transport rejected a write.
    #[error("transport write failed: {0}")]
    Transport(#[from] io::Error),
}

/// Drain pass: feed `chunk` and collect engine output in segment-sized
/// bites until the engine stops filling the segment, which means nothing
/// more is pending for this pass. Returns how much of `chunk` was consumed
/// and whether the stream format reached its end; the caller decides what
/// leftovers mean for its direction.
fn drain<E: StreamEngine>(
    engine: &mut E,
    chunk: &[u8],
    flush: Flush,
    out: &mut Vec<u8>,
) -> Result<(usize, bool), CodecError> {
    let mut consumed = 0;
    loop {
        let mut segment = [0u8; OUTPUT_SEGMENT];
        let step = engine.process(&chunk[consumed..], &mut segment, flush)?;
        consumed += step.consumed;
        out.extend_from_slice(&segment[..step.produced]);
        if step.stream_end {
            return Ok((consumed, true));
        }
        if step.produced < OUTPUT_SEGMENT {
            if consumed == chunk.len() {
                return Ok((consumed, false));
            }
            if step.consumed == 0 && step.produced == 0 {
                // No progress and input remains: stop and let the caller
                // classify the leftovers.
                return Ok((consumed, false));
            }
        }
    }
}

/// Outbound half of the stream codec: compresses protocol units and hands
/// the wire bytes to the bound sink.
///
/// Calls must be serialized by the owner. One logical writer drives the
/// instance at a time: one task per direction, never shared.
pub struct Compressor<S: ByteSink> {
    engine: DeflateEngine,
    sink: S,
    finished: bool,
}

impl<S: ByteSink> Compressor<S> {
    /// Codec bound to `sink` at the default compression level.
    pub fn new(sink: S) -> Self {
        Self::with_level(sink, Compression::default())
    }

    /// Codec bound to `sink` at an explicit level.
    pub fn with_level(sink: S, level: Compression) -> Self {
        Self {
            engine: DeflateEngine::new(level),
            sink,
            finished: false,
        }
    }

    /// Compress one logical unit of outbound data.
    ///
    /// Feeds the whole chunk, then runs a synchronizing flush so everything
    /// submitted so far is deliverable to the peer as a self-contained piece
    /// of the stream. All bytes drained by the pass reach the sink in one
    /// `send`, in production order.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), CodecError> {
        if self.finished {
            return Err(CodecError::Finalized);
        }
        let mut wire = Vec::new();
        let (consumed, _) = drain(&mut self.engine, chunk, Flush::None, &mut wire)?;
        if consumed != chunk.len() {
            // The deflate engine always accepts its input when given output
            // space. Leftovers mean the context itself is broken.
            return Err(CodecError::EngineFault(EngineError(format!(
                "engine left {} of {} input bytes unconsumed",
                chunk.len() - consumed,
                chunk.len()
            ))));
        }
        drain(&mut self.engine, &[], Flush::Sync, &mut wire)?;
        if !wire.is_empty() {
            self.sink.send(&wire)?;
        }
        debug!(bytes_in = chunk.len(), bytes_out = wire.len(), "compressed unit");
        Ok(())
    }

    /// Close out the compressed stream.
    ///
    /// Emits the trailing bytes that end the stream format, then refuses
    /// further input. Idempotent: a second call does nothing and produces no
    /// output. Must run before the owning connection closes so the peer
    /// sees a legally terminated stream.
    pub fn finalize(&mut self) -> Result<(), CodecError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let mut wire = Vec::new();
        drain(&mut self.engine, &[], Flush::Finish, &mut wire)?;
        if !wire.is_empty() {
            self.sink.send(&wire)?;
        }
        debug!(trailer_bytes = wire.len(), "compressor finalized");
        Ok(())
    }

    /// True once [`finalize`](Self::finalize) has run.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The bound sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the codec, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Inbound half of the stream codec: decompresses wire bytes and hands the
/// recovered plaintext to the bound sink.
///
/// Same ownership rules as [`Compressor`].
pub struct Decompressor<S: ByteSink> {
    engine: InflateEngine,
    sink: S,
    finished: bool,
    /// The peer's stream reached its end marker; any further wire bytes are
    /// outside the stream format.
    stream_ended: bool,
}

impl<S: ByteSink> Decompressor<S> {
    /// Codec bound to `sink`. No level applies on the decompress direction;
    /// the stream's own header describes its parameters.
    pub fn new(sink: S) -> Self {
        Self {
            engine: InflateEngine::new(),
            sink,
            finished: false,
            stream_ended: false,
        }
    }

    /// Decompress one chunk of wire bytes.
    ///
    /// The engine must consume the entire chunk. Compressed input left
    /// behind, or input arriving after the stream's end marker, means the
    /// stream is malformed or desynchronized; silently dropping those bytes
    /// would corrupt the boundary of the next unit, so they surface as
    /// [`CodecError::DesyncFault`] instead.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), CodecError> {
        if self.finished {
            return Err(CodecError::Finalized);
        }
        if self.stream_ended && !chunk.is_empty() {
            return Err(CodecError::DesyncFault {
                remaining: chunk.len(),
            });
        }
        let mut plain = Vec::new();
        let (consumed, ended) = drain(&mut self.engine, chunk, Flush::None, &mut plain)?;
        self.stream_ended = ended;
        if consumed != chunk.len() {
            return Err(CodecError::DesyncFault {
                remaining: chunk.len() - consumed,
            });
        }
        if !ended {
            drain(&mut self.engine, &[], Flush::Sync, &mut plain)?;
        }
        if !plain.is_empty() {
            self.sink.send(&plain)?;
        }
        debug!(bytes_in = chunk.len(), bytes_out = plain.len(), "decompressed unit");
        Ok(())
    }

    /// Close out the decompress direction. Idempotent, mirrors
    /// [`Compressor::finalize`].
    pub fn finalize(&mut self) -> Result<(), CodecError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if self.stream_ended {
            // The format already closed itself; nothing is pending.
            debug!("decompressor finalized after stream end");
            return Ok(());
        }
        let mut plain = Vec::new();
        drain(&mut self.engine, &[], Flush::Finish, &mut plain)?;
        if !plain.is_empty() {
            self.sink.send(&plain)?;
        }
        debug!(trailer_bytes = plain.len(), "decompressor finalized");
        Ok(())
    }

    /// True once [`finalize`](Self::finalize) has run.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The bound sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the codec, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}
