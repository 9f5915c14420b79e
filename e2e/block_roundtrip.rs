//! E2E Test Suite 01: Block One-Shot Codec
//!
//! Round-trips the block encoder and decoder across the boundary sizes,
//! every command class, the stored seed scenarios, and the malformed-input
//! rejections the decoder must uphold.

use lzjody::{compress, compress_bound, decompress, DecompressError, BLOCK_SIZE, FAST_LZ};

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Compress with the default length prefix and return the full output.
fn pack(data: &[u8]) -> Vec<u8> {
    pack_with(data, 0)
}

fn pack_with(data: &[u8], options: u32) -> Vec<u8> {
    let mut out = vec![0u8; compress_bound(data.len())];
    let n = compress(data, &mut out, options).expect("compress");
    out.truncate(n);
    out
}

fn unpack(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; BLOCK_SIZE];
    let n = decompress(payload, &mut out).expect("decompress");
    out.truncate(n);
    out
}

/// Assert `decompress(compress(data))` reproduces `data` exactly.
fn assert_round_trip(data: &[u8]) {
    let packed = pack(data);
    assert_eq!(
        unpack(&packed[2..]),
        data,
        "round-trip mismatch for {} bytes",
        data.len()
    );
}

/// Deterministic high-entropy filler.
fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            // xorshift32
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Boundary sizes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_boundary_lengths_round_trip() {
    // 0, 1, MIN_LZ_MATCH − 1, MIN_LZ_MATCH, and the full block.
    for len in [0usize, 1, 3, 4, BLOCK_SIZE] {
        assert_round_trip(&noise(len, 7));
        assert_round_trip(&vec![0x5a; len]);
    }
}

#[test]
fn test_empty_block_is_a_zero_prefix() {
    let packed = pack(&[]);
    assert_eq!(packed, [0x00, 0x00]);
    assert_eq!(unpack(&[]), Vec::<u8>::new());
}

// ─────────────────────────────────────────────────────────────────────────────
// Seed scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_seed_rle_block() {
    let data = vec![0x41u8; 300];
    let packed = pack(&data);
    // One RLE command: 3 payload bytes plus the 2-byte prefix.
    assert_eq!(packed, [0x03, 0x00, 0x41, 0x2c, 0x41]);
    assert_eq!(unpack(&packed[2..]), data);
}

#[test]
fn test_seed_ascending_bytes_seq8() {
    let data: Vec<u8> = (0..10).collect();
    let packed = pack(&data);
    assert_eq!(packed, [0x03, 0x00, 0x81, 0x0a, 0x00]);
    assert_eq!(unpack(&packed[2..]), data);
}

#[test]
fn test_seed_u32_counters() {
    // Ten LE u32 counters. The leading 4-byte zero run is claimed by RLE
    // (highest-priority finder); the remaining nine counters are one Seq32.
    let mut data = Vec::new();
    for v in 0u32..10 {
        data.extend_from_slice(&v.to_le_bytes());
    }
    let packed = pack(&data);
    assert_eq!(
        packed,
        [0x08, 0x00, 0xc4, 0x00, 0x83, 0x09, 0x01, 0x00, 0x00, 0x00]
    );
    assert_eq!(unpack(&packed[2..]), data);
}

#[test]
fn test_seq32_without_rle_preemption() {
    // Counters starting at a value with no repeated leading bytes make a
    // pure Seq32 block.
    let mut data = Vec::new();
    for v in 0u32..10 {
        data.extend_from_slice(&(0x0102_0304 + v).to_le_bytes());
    }
    let packed = pack(&data);
    assert_eq!(packed, [0x06, 0x00, 0x83, 0x0a, 0x04, 0x03, 0x02, 0x01]);
    assert_eq!(unpack(&packed[2..]), data);
}

#[test]
fn test_seed_repeated_word_lz() {
    let data = b"ABCDEFABCDEF";
    let packed = pack(data);
    assert_eq!(
        packed,
        [0x09, 0x00, 0xa6, b'A', b'B', b'C', b'D', b'E', b'F', 0xe0, 0x06]
    );
    assert_eq!(unpack(&packed[2..]), data);
}

#[test]
fn test_seed_word_noise_word() {
    let mut data = Vec::new();
    data.extend_from_slice(b"ABCDEF");
    data.extend_from_slice(&noise(30, 99));
    data.extend_from_slice(b"ABCDEF");
    assert_round_trip(&data);
}

// ─────────────────────────────────────────────────────────────────────────────
// Command-class coverage
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_full_zero_block_max_rle() {
    let data = vec![0u8; BLOCK_SIZE];
    let packed = pack(&data);
    assert_eq!(packed, [0x03, 0x00, 0x50, 0x00, 0x00]);
    assert_eq!(unpack(&packed[2..]), data);
}

#[test]
fn test_seq16_counters() {
    let mut data = Vec::new();
    for v in 0x7ffcu16..0x8004 {
        data.extend_from_slice(&v.to_le_bytes());
    }
    assert_round_trip(&data);
}

#[test]
fn test_long_lz_match_round_trips() {
    // 600-byte pattern repeated: the second occurrence is a single LZ match
    // of length ≥ 256, exercising the long-length form.
    let unit = noise(600, 3);
    let mut data = unit.clone();
    data.extend_from_slice(&unit);
    assert_round_trip(&data);

    let packed = pack(&data);
    assert!(
        packed.len() < data.len() * 3 / 4,
        "repeated pattern should compress: {} of {}",
        packed.len(),
        data.len()
    );
}

#[test]
fn test_encoder_side_overlap() {
    // "ABAB…" encodes as a 2-byte literal plus one overlapping LZ match;
    // the decoder's byte-wise copy has to fan the pair out.
    let data: Vec<u8> = std::iter::repeat([b'A', b'B'])
        .take(500)
        .flatten()
        .collect();
    let packed = pack(&data);
    assert!(packed.len() <= 10);
    assert_eq!(unpack(&packed[2..]), data);
}

#[test]
fn test_plane_recursion_on_strided_records() {
    // Four-byte records with an incrementing key and constant payload only
    // become compressible after the 4-plane split.
    let mut data = Vec::new();
    for i in 0u8..60 {
        data.extend_from_slice(&[i, 0xde, 0xad, 0x99]);
    }
    let packed = pack(&data);
    assert!(
        packed.len() < 24,
        "planed literals should collapse: {} bytes",
        packed.len()
    );
    // Payload leads with the plane command tag.
    assert_eq!(packed[2] & 0x7f, 0x04);
    assert_eq!(unpack(&packed[2..]), data);
}

#[test]
fn test_incompressible_block_survives() {
    let data = noise(BLOCK_SIZE, 0xc0ffee);
    let packed = pack(&data);
    // Incompressible input expands a little; the caller frames it raw.
    assert!(packed.len() >= data.len());
    assert!(packed.len() <= compress_bound(data.len()));
    assert_eq!(unpack(&packed[2..]), data);
}

#[test]
fn test_saturated_byte_index_linear_path() {
    // 0xAA fills two of every three positions — over 2048 occurrences, so
    // its offset list saturates and match search on it goes linear — while
    // the rotating filler byte keeps runs shorter than the RLE minimum.
    let data: Vec<u8> = (0..BLOCK_SIZE)
        .map(|i| if i % 3 == 2 { (i / 3) as u8 } else { 0xaa })
        .collect();
    assert_round_trip(&data);
}

#[test]
fn test_mixed_content_blocks() {
    let mut data = Vec::new();
    data.extend_from_slice(&[0u8; 64]);
    data.extend_from_slice(b"the quick brown fox jumps over the lazy dog");
    for v in 0u32..40 {
        data.extend_from_slice(&v.to_le_bytes());
    }
    data.extend_from_slice(&noise(500, 5));
    data.extend_from_slice(b"the quick brown fox jumps over the lazy dog");
    data.extend_from_slice(&[0xffu8; 31]);
    assert_round_trip(&data);
}

#[test]
fn test_many_random_lengths_round_trip() {
    for seed in 1..40u32 {
        let len = (seed as usize * 131) % (BLOCK_SIZE + 1);
        assert_round_trip(&noise(len, seed));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FAST_LZ
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_fast_lz_never_beats_exhaustive() {
    // The earliest candidate gives a 4-byte match, a later one 8 bytes;
    // FAST_LZ settles for the first.
    let mut data = Vec::new();
    data.extend_from_slice(b"ABCD....");
    data.extend_from_slice(b"ABCDEFGH");
    data.extend_from_slice(&noise(16, 11));
    data.extend_from_slice(b"ABCDEFGH");

    let best = pack_with(&data, 0);
    let fast = pack_with(&data, FAST_LZ);
    assert!(fast.len() >= best.len());

    assert_eq!(unpack(&best[2..]), data);
    assert_eq!(unpack(&fast[2..]), data);
}

#[test]
fn test_fast_lz_round_trips_everything() {
    for seed in [2u32, 9, 21] {
        let data = noise(2048, seed);
        let packed = pack_with(&data, FAST_LZ);
        assert_eq!(unpack(&packed[2..]), data);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Malformed input
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_decoder_rejects_bad_lz_offset() {
    let mut out = vec![0u8; BLOCK_SIZE];
    assert_eq!(
        decompress(&[0xe5, 0x04], &mut out),
        Err(DecompressError::OffsetOutOfRange { offset: 5, opos: 0 })
    );
}

#[test]
fn test_decoder_rejects_overlong_seq() {
    let mut out = vec![0u8; BLOCK_SIZE];
    // Literal byte, then a Seq8 that would overflow the block by one.
    assert!(matches!(
        decompress(&[0xa1, 0x41, 0x01, 0x10, 0x00, 0x00], &mut out),
        Err(DecompressError::LengthOverflow(_))
    ));
}

#[test]
fn test_decoder_rejects_truncation_everywhere() {
    // Chop a valid stream at every byte; each prefix must fail cleanly or
    // decode to a prefix of the original (never panic, never overread).
    let mut data = Vec::new();
    data.extend_from_slice(b"ABCDEFABCDEF");
    for i in 0u8..40 {
        data.extend_from_slice(&[i, 1, 2, 3]);
    }
    let packed = pack(&data);
    let payload = &packed[2..];
    for cut in 0..payload.len() {
        let mut out = vec![0u8; BLOCK_SIZE];
        let _ = decompress(&payload[..cut], &mut out);
    }
}

#[test]
fn test_decoder_rejects_garbage() {
    for seed in 1..20u32 {
        let garbage = noise(64, seed);
        let mut out = vec![0u8; BLOCK_SIZE];
        // Must terminate with Ok or a typed error — tolerated either way,
        // panics and hangs are the failure mode under test.
        let _ = decompress(&garbage, &mut out);
    }
}
