//! Base64 binary-to-text transcoding (RFC 4648).
//!
//! Used wherever binary payloads ride inside text protocol fields: SASL
//! exchanges, inline avatar data. Encoding is the standard alphabet with `=`
//! padding and no line wrapping; decoding tolerates line-wrapped input by
//! stripping newlines before validation. Both directions are pure functions
//! over the input buffer, safe to call from any thread.

use thiserror::Error;

/// The 64-symbol encoding alphabet (RFC 4648 §4).
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Sentinel in [`DECODE_TABLE`] for the padding symbol `=`.
const PAD: u8 = 64;

/// Sentinel in [`DECODE_TABLE`] for bytes outside the alphabet.
const INVALID: u8 = 0xff;

/// Inverse of [`ALPHABET`]: symbol byte to 6-bit value, `=` to [`PAD`],
/// anything else to [`INVALID`]. Pure data, built at compile time, so there
/// is no initialization order to worry about.
const DECODE_TABLE: [u8; 256] = build_decode_table();

const fn build_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table[b'=' as usize] = PAD;
    table
}

/// Why a decode failed.
///
/// A decode failure rejects the one value being decoded; it is never fatal
/// to the surrounding stream or connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Input length (after newline stripping) is not a multiple of 4.
    #[error("encoded length {0} is not a multiple of 4")]
    BadLength(usize),
    /// A byte outside the 65-symbol alphabet.
    #[error("invalid symbol {byte:#04x} at position {pos}")]
    BadSymbol { byte: u8, pos: usize },
    /// `=` anywhere other than the trailing one or two positions of the
    /// final quartet, or a data symbol after `=`.
    #[error("misplaced padding at position {0}")]
    BadPadding(usize),
}

/// Encode bytes as base64 text.
///
/// Input is processed in 3-byte groups producing 4 output symbols each; a
/// final group of 1 or 2 bytes is completed with `==` or `=`. Output length
/// is always a multiple of 4 and no line breaks are introduced.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    let mut groups = bytes.chunks_exact(3);
    for group in &mut groups {
        let n = (group[0] as u32) << 16 | (group[1] as u32) << 8 | group[2] as u32;
        out.push(ALPHABET[(n >> 18) as usize & 0x3f] as char);
        out.push(ALPHABET[(n >> 12) as usize & 0x3f] as char);
        out.push(ALPHABET[(n >> 6) as usize & 0x3f] as char);
        out.push(ALPHABET[n as usize & 0x3f] as char);
    }
    match groups.remainder() {
        [a] => {
            let n = (*a as u32) << 16;
            out.push(ALPHABET[(n >> 18) as usize & 0x3f] as char);
            out.push(ALPHABET[(n >> 12) as usize & 0x3f] as char);
            out.push('=');
            out.push('=');
        }
        [a, b] => {
            let n = (*a as u32) << 16 | (*b as u32) << 8;
            out.push(ALPHABET[(n >> 18) as usize & 0x3f] as char);
            out.push(ALPHABET[(n >> 12) as usize & 0x3f] as char);
            out.push(ALPHABET[(n >> 6) as usize & 0x3f] as char);
            out.push('=');
        }
        _ => {}
    }
    out
}

/// Decode base64 text to bytes.
///
/// Newlines (`\n`, `\r`) are stripped first so line-wrapped input decodes.
/// The remaining length must be a multiple of 4. Each quartet maps through
/// the inverse table to 3 output bytes; `=` in the third or fourth position
/// of the final quartet truncates that group to 1 or 2 bytes. Padding in a
/// data position, padding before the final quartet, or any byte outside the
/// alphabet fails the whole decode.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let stripped: Vec<u8> = text
        .bytes()
        .filter(|&b| b != b'\n' && b != b'\r')
        .collect();
    if stripped.len() % 4 != 0 {
        return Err(DecodeError::BadLength(stripped.len()));
    }

    let quartets = stripped.len() / 4;
    let mut out = Vec::with_capacity(quartets * 3);
    for (q, group) in stripped.chunks_exact(4).enumerate() {
        let last = q + 1 == quartets;
        let mut vals = [0u8; 4];
        let mut pad = 0usize;
        for (i, &byte) in group.iter().enumerate() {
            let pos = q * 4 + i;
            let v = DECODE_TABLE[byte as usize];
            if v == INVALID {
                return Err(DecodeError::BadSymbol { byte, pos });
            }
            if v == PAD {
                // Padding is only legal as the trailing one or two symbols
                // of the final quartet.
                if !last || i < 2 {
                    return Err(DecodeError::BadPadding(pos));
                }
                pad += 1;
            } else {
                if pad > 0 {
                    return Err(DecodeError::BadPadding(pos));
                }
                vals[i] = v;
            }
        }
        let n = (vals[0] as u32) << 18
            | (vals[1] as u32) << 12
            | (vals[2] as u32) << 6
            | vals[3] as u32;
        out.push((n >> 16) as u8);
        if pad < 2 {
            out.push((n >> 8) as u8);
        }
        if pad == 0 {
            out.push(n as u8);
        }
    }
    Ok(out)
}
