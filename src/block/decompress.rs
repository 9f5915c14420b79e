//! Block decoder.
//!
//! Reads commands until the input is exhausted and materializes the output
//! block. This is the path that faces untrusted data: every read is checked
//! against the input size and every write against the output capacity, and
//! any malformed condition comes back as a [`DecompressError`] — never a
//! panic, never an out-of-bounds access.
//!
//! Two semantics are load-bearing:
//!
//! - LZ copies run **byte-wise forward** from already-written output. An
//!   overlapping reference (`offset` close to the write position) re-reads
//!   bytes produced earlier in the same command, fanning short patterns out —
//!   a block copy primitive would decode those streams differently.
//! - Seq commands serialize each value through little-endian byte writes, so
//!   neither alignment nor host byte order can leak into the output.

use core::fmt;

use crate::block::control::{self, CommandClass};
use crate::block::plane;
use crate::block::types::{read_le16, read_le32, write_le16, write_le32, BLOCK_SIZE, LITERAL_PLANES};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors returned by block decompression. Each maps to one malformed-input
/// condition; none are recoverable mid-block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressError {
    /// Control byte does not name any command.
    UnknownCommand(u8),
    /// A command promised more payload than the input holds.
    Truncated,
    /// LZ back-offset at or past the current output position.
    OffsetOutOfRange { offset: usize, opos: usize },
    /// A length field or write range exceeds the block capacity.
    LengthOverflow(usize),
    /// A plane command inside another plane payload; the encoder never emits
    /// these, and rejecting them bounds decode recursion at one level.
    NestedPlane,
}

impl fmt::Display for DecompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompressError::UnknownCommand(c) => write!(f, "unknown command byte 0x{c:02x}"),
            DecompressError::Truncated => write!(f, "compressed stream truncated"),
            DecompressError::OffsetOutOfRange { offset, opos } => {
                write!(f, "LZ offset 0x{offset:x} at or past output position 0x{opos:x}")
            }
            DecompressError::LengthOverflow(len) => {
                write!(f, "length 0x{len:x} exceeds block capacity")
            }
            DecompressError::NestedPlane => write!(f, "nested plane command"),
        }
    }
}

impl std::error::Error for DecompressError {}

// ─────────────────────────────────────────────────────────────────────────────
// Decoder
// ─────────────────────────────────────────────────────────────────────────────

/// Decompress one bare command stream (no length prefix) into `dst`.
///
/// Returns the number of bytes produced. `dst` should hold a full block
/// ([`BLOCK_SIZE`] bytes); a well-formed stream never produces more.
pub fn decompress(src: &[u8], dst: &mut [u8]) -> Result<usize, DecompressError> {
    run(src, dst, false)
}

fn run(src: &[u8], dst: &mut [u8], nested: bool) -> Result<usize, DecompressError> {
    let mut ipos = 0;
    let mut opos = 0;

    while ipos < src.len() {
        let ctrl = control::read_control(src, &mut ipos)?;
        match ctrl.class {
            CommandClass::Literal => {
                let count = ctrl.value;
                if ipos + count > src.len() {
                    return Err(DecompressError::Truncated);
                }
                if opos + count > dst.len() {
                    return Err(DecompressError::LengthOverflow(count));
                }
                dst[opos..opos + count].copy_from_slice(&src[ipos..ipos + count]);
                ipos += count;
                opos += count;
            }

            CommandClass::Rle => {
                let count = ctrl.value;
                let byte = control::next_byte(src, &mut ipos)?;
                if opos + count > dst.len() {
                    return Err(DecompressError::LengthOverflow(count));
                }
                dst[opos..opos + count].fill(byte);
                opos += count;
            }

            CommandClass::Lz { long } => {
                let offset = ctrl.value;
                let mut length = control::next_byte(src, &mut ipos)? as usize;
                if long {
                    length |= (control::next_byte(src, &mut ipos)? as usize) << 8;
                }
                if offset >= opos {
                    return Err(DecompressError::OffsetOutOfRange { offset, opos });
                }
                if opos + length > dst.len() {
                    return Err(DecompressError::LengthOverflow(length));
                }
                // Byte-wise forward copy; the source range may extend into
                // bytes this same loop just wrote.
                for k in 0..length {
                    dst[opos + k] = dst[offset + k];
                }
                opos += length;
            }

            CommandClass::Seq8 => {
                let count = ctrl.value;
                let mut value = control::next_byte(src, &mut ipos)?;
                if opos + count > dst.len() {
                    return Err(DecompressError::LengthOverflow(count));
                }
                for _ in 0..count {
                    dst[opos] = value;
                    opos += 1;
                    value = value.wrapping_add(1);
                }
            }

            CommandClass::Seq16 => {
                let count = ctrl.value;
                if ipos + 2 > src.len() {
                    return Err(DecompressError::Truncated);
                }
                let mut value = read_le16(src, ipos);
                ipos += 2;
                if opos + count * 2 > dst.len() {
                    return Err(DecompressError::LengthOverflow(count * 2));
                }
                for _ in 0..count {
                    write_le16(dst, opos, value);
                    opos += 2;
                    value = value.wrapping_add(1);
                }
            }

            CommandClass::Seq32 => {
                let count = ctrl.value;
                if ipos + 4 > src.len() {
                    return Err(DecompressError::Truncated);
                }
                let mut value = read_le32(src, ipos);
                ipos += 4;
                if opos + count * 4 > dst.len() {
                    return Err(DecompressError::LengthOverflow(count * 4));
                }
                for _ in 0..count {
                    write_le32(dst, opos, value);
                    opos += 4;
                    value = value.wrapping_add(1);
                }
            }

            CommandClass::Plane => {
                if nested {
                    return Err(DecompressError::NestedPlane);
                }
                let packed_len = ctrl.value;
                if ipos + packed_len > src.len() {
                    return Err(DecompressError::Truncated);
                }
                let mut planed = [0u8; BLOCK_SIZE];
                let produced = run(&src[ipos..ipos + packed_len], &mut planed, true)?;
                if opos + produced > dst.len() {
                    return Err(DecompressError::LengthOverflow(produced));
                }
                plane::inverse(
                    &planed[..produced],
                    &mut dst[opos..opos + produced],
                    LITERAL_PLANES,
                );
                ipos += packed_len;
                opos += produced;
            }
        }
    }

    Ok(opos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(src: &[u8]) -> Result<Vec<u8>, DecompressError> {
        let mut dst = vec![0u8; BLOCK_SIZE];
        let n = decompress(src, &mut dst)?;
        dst.truncate(n);
        Ok(dst)
    }

    #[test]
    fn empty_stream_produces_nothing() {
        assert_eq!(decode(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rle_command_expands() {
        assert_eq!(decode(&[0x41, 0x2c, 0x41]).unwrap(), vec![0x41u8; 300]);
    }

    #[test]
    fn overlapping_lz_fans_out_one_byte() {
        // Literal 'Q', then LZ offset 0 length 200 with opos = 1: each copied
        // byte re-reads the byte written just before it.
        let out = decode(&[0xa1, b'Q', 0xe0, 200]).unwrap();
        assert_eq!(out, vec![b'Q'; 201]);
    }

    #[test]
    fn long_lz_length_uses_second_byte() {
        // Length 300 needs the long form; offset 0 into a 1-byte prefix.
        let out = decode(&[0xa1, b'Z', 0xf0, 0x2c, 0x01]).unwrap();
        assert_eq!(out, vec![b'Z'; 301]);
    }

    #[test]
    fn seq16_wraps_modulo_width() {
        let out = decode(&[0x82, 0x04, 0xfe, 0xff]).unwrap();
        assert_eq!(out, [0xfe, 0xff, 0xff, 0xff, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn seq32_materializes_counters() {
        let out = decode(&[0x83, 0x03, 0xff, 0xff, 0xff, 0xff]).unwrap();
        assert_eq!(
            out,
            [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn seq8_can_fill_the_whole_block() {
        let out = decode(&[0x01, 0x10, 0x00, 0x07]).unwrap();
        assert_eq!(out.len(), BLOCK_SIZE);
        assert_eq!(out[0], 7);
        assert_eq!(out[255], (7u8).wrapping_add(255));
    }

    #[test]
    fn lz_offset_at_output_position_is_rejected() {
        assert_eq!(
            decode(&[0xe5, 0x04]),
            Err(DecompressError::OffsetOutOfRange { offset: 5, opos: 0 })
        );
    }

    #[test]
    fn truncated_literal_is_rejected() {
        assert_eq!(decode(&[0xa6, 0x41]), Err(DecompressError::Truncated));
    }

    #[test]
    fn seq_overflowing_the_block_is_rejected() {
        // One literal byte, then a full-block Seq8: 1 + 4096 > 4096.
        assert!(matches!(
            decode(&[0xa1, 0x41, 0x01, 0x10, 0x00, 0x00]),
            Err(DecompressError::LengthOverflow(_))
        ));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(matches!(
            decode(&[0x05, 0x01, 0x01]),
            Err(DecompressError::UnknownCommand(0x05))
        ));
    }

    #[test]
    fn nested_plane_is_rejected() {
        // Outer plane whose payload opens with another plane command.
        assert_eq!(
            decode(&[0x84, 0x02, 0x84, 0x00]),
            Err(DecompressError::NestedPlane)
        );
    }

    #[test]
    fn plane_payload_is_decoded_and_unsplit() {
        // Payload: seq8 of 8 values 0..7. Planed interpretation of those
        // bytes maps position p + 4k back to plane order.
        let out = decode(&[0x84, 0x03, 0x81, 0x08, 0x00]).unwrap();
        assert_eq!(out, [0, 2, 4, 6, 1, 3, 5, 7]);
    }
}
