//! Incremental compression engine behind a small capability seam.
//!
//! The codec layer drives an opaque streaming engine through one primitive:
//! feed some input, drain into a fixed-size output segment, under a
//! requested flush mode. [`DeflateEngine`] and [`InflateEngine`] implement
//! the seam on flate2's zlib contexts. Each engine value exclusively owns
//! one live context, released when the value drops, so the context can
//! never leak or be shared between codecs.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use thiserror::Error;

/// Flush mode for one engine pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Plain feed: the engine may hold output back for better ratios.
    None,
    /// Synchronizing flush: everything fed so far becomes decodable by the
    /// peer without further input, at some ratio cost.
    Sync,
    /// Terminal flush: closes the stream format. No further input is legal
    /// afterwards.
    Finish,
}

/// Progress made by one engine pass.
#[derive(Debug, Clone, Copy)]
pub struct EngineStep {
    /// Input bytes consumed by this pass.
    pub consumed: usize,
    /// Output bytes produced into the segment by this pass.
    pub produced: usize,
    /// The stream format reached its end marker.
    pub stream_end: bool,
}

/// Unrecoverable engine-level failure.
///
/// Fatal to the owning codec: after one of these the engine's internal
/// state no longer matches what the peer expects, so retrying cannot help.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EngineError(pub(crate) String);

/// Streaming compression engine: the codec's only view of the underlying
/// library. One implementation per direction, each wrapping one live
/// context.
pub trait StreamEngine {
    /// Feed `input` and drain into `segment` under `flush`.
    ///
    /// The engine consumes as much input and produces as much output as
    /// fits. A segment that comes back full means more output may be
    /// pending; the caller loops until a pass leaves slack.
    fn process(
        &mut self,
        input: &[u8],
        segment: &mut [u8],
        flush: Flush,
    ) -> Result<EngineStep, EngineError>;
}

/// Compress direction, zlib framing.
pub struct DeflateEngine {
    ctx: Compress,
}

impl DeflateEngine {
    pub fn new(level: Compression) -> Self {
        Self {
            ctx: Compress::new(level, true),
        }
    }
}

impl StreamEngine for DeflateEngine {
    fn process(
        &mut self,
        input: &[u8],
        segment: &mut [u8],
        flush: Flush,
    ) -> Result<EngineStep, EngineError> {
        let flush = match flush {
            Flush::None => FlushCompress::None,
            Flush::Sync => FlushCompress::Sync,
            Flush::Finish => FlushCompress::Finish,
        };
        let before_in = self.ctx.total_in();
        let before_out = self.ctx.total_out();
        let status = self
            .ctx
            .compress(input, segment, flush)
            .map_err(|e| EngineError(e.to_string()))?;
        Ok(EngineStep {
            consumed: (self.ctx.total_in() - before_in) as usize,
            produced: (self.ctx.total_out() - before_out) as usize,
            stream_end: matches!(status, Status::StreamEnd),
        })
    }
}

/// Decompress direction, zlib framing.
pub struct InflateEngine {
    ctx: Decompress,
}

impl InflateEngine {
    pub fn new() -> Self {
        Self {
            ctx: Decompress::new(true),
        }
    }
}

impl Default for InflateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamEngine for InflateEngine {
    fn process(
        &mut self,
        input: &[u8],
        segment: &mut [u8],
        flush: Flush,
    ) -> Result<EngineStep, EngineError> {
        let flush = match flush {
            Flush::None => FlushDecompress::None,
            Flush::Sync => FlushDecompress::Sync,
            Flush::Finish => FlushDecompress::Finish,
        };
        let before_in = self.ctx.total_in();
        let before_out = self.ctx.total_out();
        let status = self
            .ctx
            .decompress(input, segment, flush)
            .map_err(|e| EngineError(e.to_string()))?;
        Ok(EngineStep {
            consumed: (self.ctx.total_in() - before_in) as usize,
            produced: (self.ctx.total_out() - before_out) as usize,
            stream_end: matches!(status, Status::StreamEnd),
        })
    }
}
