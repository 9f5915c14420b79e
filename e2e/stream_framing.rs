//! E2E Test Suite 02: Stream Framing
//!
//! Drives the stream driver end to end over in-memory readers/writers:
//! multi-block streams, worker-pool compression, the stored-raw escape,
//! legacy-framing reads, and framing-level error reporting.

use std::io::Cursor;

use lzjody::io::{
    compress_stream, decompress_stream, decompress_stream_legacy, Prefs, StreamStats,
};
use lzjody::{compress, compress_bound, FrameHeader, BLOCK_SIZE, FRAME_HEADER_SIZE, NOCOMPRESS};

fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

fn compress_to_vec(data: &[u8], prefs: &Prefs) -> (Vec<u8>, StreamStats) {
    let mut packed = Vec::new();
    let stats = compress_stream(&mut Cursor::new(data), &mut packed, prefs).expect("compress");
    (packed, stats)
}

fn decompress_to_vec(stream: &[u8]) -> (Vec<u8>, StreamStats) {
    let mut restored = Vec::new();
    let stats =
        decompress_stream(&mut Cursor::new(stream), &mut restored).expect("decompress");
    (restored, stats)
}

// ─────────────────────────────────────────────────────────────────────────────
// Round trips
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_multi_block_round_trip() {
    // Three and a half blocks of compressible text.
    let data = b"all work and no play makes jack a dull boy. ".repeat(320);
    let (packed, cstats) = compress_to_vec(&data, &Prefs::default());
    assert_eq!(cstats.blocks as usize, data.len().div_ceil(BLOCK_SIZE));
    assert!(packed.len() < data.len() / 2);

    let (restored, dstats) = decompress_to_vec(&packed);
    assert_eq!(restored, data);
    assert_eq!(dstats.blocks, cstats.blocks);
    assert_eq!(dstats.bytes_written, data.len() as u64);
}

#[test]
fn test_exact_block_multiple_round_trip() {
    let data = vec![0x11u8; BLOCK_SIZE * 4];
    let (packed, stats) = compress_to_vec(&data, &Prefs::default());
    assert_eq!(stats.blocks, 4);
    assert_eq!(decompress_to_vec(&packed).0, data);
}

#[test]
fn test_single_byte_stream() {
    let (packed, _) = compress_to_vec(&[0x7f], &Prefs::default());
    // One stored frame: a lone byte cannot shrink.
    assert_eq!(packed.len(), FRAME_HEADER_SIZE + 1);
    assert_eq!(decompress_to_vec(&packed).0, vec![0x7f]);
}

#[test]
fn test_empty_stream() {
    let (packed, stats) = compress_to_vec(&[], &Prefs::default());
    assert!(packed.is_empty());
    assert_eq!(stats.blocks, 0);
    let (restored, stats) = decompress_to_vec(&[]);
    assert!(restored.is_empty());
    assert_eq!(stats.blocks, 0);
}

#[test]
fn test_incompressible_stream_uses_stored_frames() {
    let data = noise(BLOCK_SIZE * 2, 0xbeef);
    let (packed, _) = compress_to_vec(&data, &Prefs::default());
    // Two stored frames: 4 bytes of header overhead per block.
    assert_eq!(packed.len(), data.len() + 2 * FRAME_HEADER_SIZE);

    let header = FrameHeader::decode([packed[0], packed[1], packed[2], packed[3]]).unwrap();
    assert!(header.is_stored());
    assert_eq!(header.flags, NOCOMPRESS as u8);
    assert_eq!(decompress_to_vec(&packed).0, data);
}

#[test]
fn test_mixed_compressibility_stream() {
    let mut data = Vec::new();
    data.extend_from_slice(&vec![0u8; BLOCK_SIZE]);
    data.extend_from_slice(&noise(BLOCK_SIZE, 42));
    data.extend_from_slice(&b"abcd".repeat(BLOCK_SIZE / 4));
    data.extend_from_slice(&noise(100, 43));
    let (packed, _) = compress_to_vec(&data, &Prefs::default());
    assert_eq!(decompress_to_vec(&packed).0, data);
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker-pool compression
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_parallel_compression_is_byte_identical() {
    let mut data = Vec::new();
    for block in 0..24 {
        match block % 3 {
            0 => data.extend_from_slice(&vec![block as u8; BLOCK_SIZE]),
            1 => data.extend_from_slice(&noise(BLOCK_SIZE, block)),
            _ => {
                for v in 0u32..(BLOCK_SIZE as u32 / 4) {
                    data.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
    }
    let (st, _) = compress_to_vec(&data, &Prefs { nb_workers: 1, fast_lz: false });
    for workers in [2, 4, 8] {
        let (mt, stats) = compress_to_vec(&data, &Prefs { nb_workers: workers, fast_lz: false });
        assert_eq!(st, mt, "{workers} workers changed the stream");
        assert_eq!(stats.bytes_written as usize, mt.len());
    }
    assert_eq!(decompress_to_vec(&st).0, data);
}

#[test]
fn test_parallel_fast_lz_round_trips() {
    let data = b"fast path still has to be correct ".repeat(1500);
    let (packed, _) = compress_to_vec(&data, &Prefs { nb_workers: 4, fast_lz: true });
    assert_eq!(decompress_to_vec(&packed).0, data);
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy framing (read-only)
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_legacy_stream_round_trip() {
    // A legacy stream is the codec's own prefixed output, concatenated.
    let blocks: Vec<Vec<u8>> = vec![
        b"ABCDEFABCDEFABCDEF".to_vec(),
        vec![0x41; 300],
        noise(1000, 77),
        (0..10).collect(),
    ];
    let mut stream = Vec::new();
    for block in &blocks {
        let mut buf = vec![0u8; compress_bound(block.len())];
        let n = compress(block, &mut buf, 0).expect("compress");
        stream.extend_from_slice(&buf[..n]);
    }

    let mut restored = Vec::new();
    let stats = decompress_stream_legacy(&mut Cursor::new(&stream), &mut restored)
        .expect("legacy decompress");
    assert_eq!(stats.blocks as usize, blocks.len());
    assert_eq!(restored, blocks.concat());
}

#[test]
fn test_legacy_rejects_truncated_payload() {
    // Prefix promises 300 payload bytes, stream ends after 2.
    let stream = [0x2c, 0x01, 0x41, 0x2c];
    let err = decompress_stream_legacy(&mut Cursor::new(&stream), &mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

// ─────────────────────────────────────────────────────────────────────────────
// Framing errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_truncated_header_is_distinct_from_eof() {
    let err = decompress_stream(&mut Cursor::new(&[0x00, 0x00]), &mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    assert!(err.to_string().contains("header"));
}

#[test]
fn test_oversized_frame_is_rejected() {
    // 28-bit length far beyond any block.
    let header = (0x00ab_cdefu32).to_be_bytes();
    let err = decompress_stream(&mut Cursor::new(&header), &mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn test_oversized_stored_block_is_rejected() {
    // Stored frame claiming more than a block of raw payload.
    let len = BLOCK_SIZE + 10;
    let mut stream = FrameHeader::stored(len).encode().to_vec();
    stream.extend_from_slice(&vec![0u8; len]);
    let err = decompress_stream(&mut Cursor::new(&stream), &mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    assert!(err.to_string().contains("stored block"));
}

#[test]
fn test_corrupt_payload_reports_block_index() {
    // First frame valid, second frame carries a bad LZ offset.
    let mut stream = Vec::new();
    let (first, _) = compress_to_vec(b"AAAAAAAAAAAAAAAA", &Prefs::default());
    stream.extend_from_slice(&first);
    stream.extend_from_slice(&FrameHeader::compressed(2).encode());
    stream.extend_from_slice(&[0xe5, 0x04]);

    let mut out = Vec::new();
    let err = decompress_stream(&mut Cursor::new(&stream), &mut out).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    assert!(err.to_string().contains("block 1"));
    // The first block was already written before the failure.
    assert_eq!(out, b"AAAAAAAAAAAAAAAA");
}
