//! Wire-level primitives for an XMPP client: addressing, base64
//! transcoding and per-connection stream compression.
//!
//! Three independent pieces, leaves first:
//!
//! - [`jid`]: structured XMPP addresses with strict parsing, validation
//!   and normalization.
//! - [`base64`]: the RFC 4648 transcoder used for binary payloads embedded
//!   in text protocol fields.
//! - [`compression`]: the stateful zlib stream codec that sits directly on
//!   a connection's byte transport, plus [`compression::bridge`], which
//!   binds one codec pair to a live duplex transport and finalizes both
//!   directions when the connection is about to close.
//!
//! [`transport`] defines the byte-sink seam between the codec and whoever
//! owns the socket.
//!
//! The crate emits structured diagnostics through `tracing`; installing a
//! subscriber is the embedding application's job.

pub mod base64;
pub mod compression;
pub mod jid;
pub mod transport;

pub use compression::{CodecError, CompressedLink, Compression, Compressor, Decompressor};
pub use jid::Jid;
pub use transport::ByteSink;
