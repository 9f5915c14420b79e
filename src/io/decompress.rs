//! Stream decompression: framed blocks in, raw bytes out.
//!
//! Decoding is sequential — frames are small and the decoder is cheap next
//! to the match search, so the complexity of out-of-order reassembly buys
//! nothing here. Both the extended 4-byte framing and the legacy 2-byte
//! length-prefix framing (read-only) are supported.

use std::io::{self, Read, Write};

use crate::block::decompress::decompress;
use crate::block::types::BLOCK_SIZE;
use crate::frame::{legacy_payload_len, FrameHeader};
use crate::io::{read_header, StreamStats};

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Read one frame payload of `len` bytes.
fn read_payload(reader: &mut dyn Read, len: usize) -> io::Result<Vec<u8>> {
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated frame payload: expected {len} bytes"),
            )
        } else {
            e
        }
    })?;
    Ok(payload)
}

/// Decode one compressed payload and write the recovered block.
fn write_block(writer: &mut dyn Write, payload: &[u8], block_index: u64) -> io::Result<usize> {
    let mut block = [0u8; BLOCK_SIZE];
    let len = decompress(payload, &mut block)
        .map_err(|e| invalid_data(format!("block {block_index}: {e}")))?;
    writer.write_all(&block[..len])?;
    Ok(len)
}

/// Decompress an extended-framing stream (4-byte headers, stored-raw escape).
pub fn decompress_stream(reader: &mut dyn Read, writer: &mut dyn Write) -> io::Result<StreamStats> {
    let mut stats = StreamStats::default();

    while let Some(bytes) = read_header::<4>(reader)? {
        let header = FrameHeader::decode(bytes)
            .map_err(|e| invalid_data(format!("frame {}: {e}", stats.blocks)))?;
        let payload = read_payload(reader, header.payload_len)?;
        stats.bytes_read += (bytes.len() + payload.len()) as u64;

        if header.is_stored() {
            if payload.len() > BLOCK_SIZE {
                return Err(invalid_data(format!(
                    "frame {}: stored block of {} bytes exceeds maximum {BLOCK_SIZE}",
                    stats.blocks,
                    payload.len()
                )));
            }
            writer.write_all(&payload)?;
            stats.bytes_written += payload.len() as u64;
        } else {
            stats.bytes_written += write_block(writer, &payload, stats.blocks)? as u64;
        }
        stats.blocks += 1;
    }

    writer.flush()?;
    Ok(stats)
}

/// Decompress a legacy stream: 2-byte little-endian length, then payload.
/// No flags, no stored-raw escape.
pub fn decompress_stream_legacy(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
) -> io::Result<StreamStats> {
    let mut stats = StreamStats::default();

    while let Some(bytes) = read_header::<2>(reader)? {
        let payload_len = legacy_payload_len(bytes)
            .map_err(|e| invalid_data(format!("frame {}: {e}", stats.blocks)))?;
        let payload = read_payload(reader, payload_len)?;
        stats.bytes_read += (bytes.len() + payload.len()) as u64;
        stats.bytes_written += write_block(writer, &payload, stats.blocks)? as u64;
        stats.blocks += 1;
    }

    writer.flush()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::compress::compress;
    use crate::block::types::compress_bound;
    use std::io::Cursor;

    #[test]
    fn rejects_truncated_payload() {
        // Valid header promising 16 bytes, only 3 present.
        let mut stream = FrameHeader::compressed(16).encode().to_vec();
        stream.extend_from_slice(&[1, 2, 3]);
        let err = decompress_stream(&mut Cursor::new(stream), &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn rejects_oversized_frame_length() {
        let bytes = (0x0012_3456u32).to_be_bytes();
        let err = decompress_stream(&mut Cursor::new(bytes), &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_corrupt_block_payload() {
        // LZ command with an impossible back-offset.
        let mut stream = FrameHeader::compressed(2).encode().to_vec();
        stream.extend_from_slice(&[0xe5, 0x04]);
        let err = decompress_stream(&mut Cursor::new(stream), &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("LZ offset"));
    }

    #[test]
    fn legacy_stream_round_trips() {
        // A legacy stream is what the codec emits with its prefix enabled.
        let blocks: [&[u8]; 3] = [b"ABCDEFABCDEFABCDEF", &[0x41; 300], &[7u8; 1]];
        let mut stream = Vec::new();
        for block in blocks {
            let mut buf = vec![0u8; compress_bound(block.len())];
            let n = compress(block, &mut buf, 0).unwrap();
            stream.extend_from_slice(&buf[..n]);
        }

        let mut restored = Vec::new();
        let stats =
            decompress_stream_legacy(&mut Cursor::new(stream), &mut restored).unwrap();
        assert_eq!(stats.blocks, 3);
        assert_eq!(restored, blocks.concat());
    }
}
