//! Block encoder.
//!
//! At every input position the encoder consults three match finders in fixed
//! priority order — RLE, then LZ, then arithmetic sequences — and the first
//! that succeeds emits its command and advances. Bytes nobody wants pile up
//! in a pending literal run; whenever a finder fires (or the block ends) the
//! run is flushed, and runs long enough to matter are first re-compressed
//! through a 4-plane byte transform by recursing into this same encoder with
//! [`REALFLUSH`] set so the recursion is one level deep.
//!
//! The encoder never shrinks its own output: an incompressible block simply
//! compresses to something at least as large as the input, and the framing
//! layer decides to store the block raw instead.

use core::cell::RefCell;
use core::fmt;

use crate::block::control;
use crate::block::index::ByteIndex;
use crate::block::plane;
use crate::block::types::{
    compress_bound, read_le16, read_le32, write_le16, write_le32, BLOCK_SIZE, FAST_LZ,
    LENGTH_PREFIX_SIZE, LITERAL_PLANES, MAX_LZ_BYTE_SCANS, MAX_LZ_MATCH, MIN_LZ_MATCH,
    MIN_PLANE_LENGTH, MIN_RLE_LENGTH, MIN_SEQ16_LENGTH, MIN_SEQ32_LENGTH, MIN_SEQ8_LENGTH,
    NOPREFIX, REALFLUSH, TAG_LIT, TAG_LZ, TAG_LZ_LONG, TAG_PLANE, TAG_RLE, TAG_SEQ16, TAG_SEQ32,
    TAG_SEQ8,
};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors returned by block compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressError {
    /// The input exceeds [`BLOCK_SIZE`] bytes.
    InputTooLarge(usize),
    /// The output buffer is smaller than [`compress_bound`] requires.
    OutputTooSmall,
    /// A control field value exceeded 0x1000. Indicates a codec bug, not a
    /// data-dependent condition.
    ControlOverflow,
}

impl fmt::Display for CompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressError::InputTooLarge(len) => {
                write!(f, "input length {len} exceeds block size {BLOCK_SIZE}")
            }
            CompressError::OutputTooSmall => write!(f, "output buffer below compress_bound"),
            CompressError::ControlOverflow => write!(f, "control field value above 0x1000"),
        }
    }
}

impl std::error::Error for CompressError {}

// ─────────────────────────────────────────────────────────────────────────────
// Reusable compression context
// ─────────────────────────────────────────────────────────────────────────────

/// Reusable block-compression context.
///
/// Owns the ~1 MiB byte index and, after the first literal-flush recursion,
/// a nested context for the planed pass. Creating one per block works but
/// wastes allocations; keep one per worker thread and feed it blocks. The
/// free function [`compress`] does exactly that through a thread-local.
pub struct Compressor {
    index: ByteIndex,
    /// Context for the recursive literal pass; allocated on first use.
    inner: Option<Box<Compressor>>,
}

impl Compressor {
    pub fn new() -> Self {
        Compressor {
            index: ByteIndex::new(),
            inner: None,
        }
    }

    /// Compress one block of up to [`BLOCK_SIZE`] bytes into `dst`.
    ///
    /// Returns the compressed length, which includes the 2-byte little-endian
    /// length prefix unless [`NOPREFIX`] is set in `options`. `dst` must hold
    /// at least [`compress_bound`]`(src.len())` bytes.
    pub fn compress(
        &mut self,
        src: &[u8],
        dst: &mut [u8],
        options: u32,
    ) -> Result<usize, CompressError> {
        if src.len() > BLOCK_SIZE {
            return Err(CompressError::InputTooLarge(src.len()));
        }
        if dst.len() < compress_bound(src.len()) {
            return Err(CompressError::OutputTooSmall);
        }

        let Compressor { index, inner } = self;
        let mut enc = Encoder {
            input: src,
            out: dst,
            ipos: 0,
            opos: if options & NOPREFIX != 0 {
                0
            } else {
                LENGTH_PREFIX_SIZE
            },
            literals: 0,
            literal_start: 0,
            options,
            index,
            inner,
        };

        if src.len() < MIN_LZ_MATCH {
            // Too short for any finder; the whole block is one literal run.
            enc.literals = src.len();
        } else {
            enc.index.build(src);
            while enc.ipos < src.len() {
                if !(enc.find_rle()? || enc.find_lz()? || enc.find_seq()?) {
                    if enc.literals == 0 {
                        enc.literal_start = enc.ipos;
                    }
                    enc.literals += 1;
                    enc.ipos += 1;
                }
            }
        }
        enc.flush_literals()?;

        let opos = enc.opos;
        if options & NOPREFIX == 0 {
            write_le16(dst, 0, (opos - LENGTH_PREFIX_SIZE) as u16);
        }
        Ok(opos)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static COMPRESSOR: RefCell<Compressor> = RefCell::new(Compressor::new());
}

/// One-shot block compression using a per-thread [`Compressor`].
///
/// See [`Compressor::compress`] for the buffer and options contract.
pub fn compress(src: &[u8], dst: &mut [u8], options: u32) -> Result<usize, CompressError> {
    COMPRESSOR.with(|ctx| ctx.borrow_mut().compress(src, dst, options))
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoder state
// ─────────────────────────────────────────────────────────────────────────────

/// Working state for one block encode.
///
/// Invariants between finder calls: `literal_start + literals == ipos`
/// whenever `literals > 0`, and `ipos + literals` never exceeds the input
/// length.
struct Encoder<'a> {
    input: &'a [u8],
    out: &'a mut [u8],
    ipos: usize,
    opos: usize,
    literals: usize,
    literal_start: usize,
    options: u32,
    index: &'a mut ByteIndex,
    inner: &'a mut Option<Box<Compressor>>,
}

/// Length of the common prefix of `data[pos..]` and `data[candidate..]`,
/// capped at `cap`. `candidate < pos` keeps the shorter side in bounds.
#[inline]
fn match_run(data: &[u8], candidate: usize, pos: usize, cap: usize) -> usize {
    data[pos..pos + cap]
        .iter()
        .zip(&data[candidate..candidate + cap])
        .take_while(|(a, b)| a == b)
        .count()
}

/// Count of consecutive little-endian `u32` values incrementing by one,
/// starting at `ipos`, bounded by the remaining input.
fn seq32_run(input: &[u8], ipos: usize) -> usize {
    if ipos + 4 > input.len() {
        return 0;
    }
    let mut expect = read_le32(input, ipos);
    let mut count = 0;
    while ipos + count * 4 + 4 <= input.len() && read_le32(input, ipos + count * 4) == expect {
        count += 1;
        expect = expect.wrapping_add(1);
    }
    count
}

fn seq16_run(input: &[u8], ipos: usize) -> usize {
    if ipos + 2 > input.len() {
        return 0;
    }
    let mut expect = read_le16(input, ipos);
    let mut count = 0;
    while ipos + count * 2 + 2 <= input.len() && read_le16(input, ipos + count * 2) == expect {
        count += 1;
        expect = expect.wrapping_add(1);
    }
    count
}

fn seq8_run(input: &[u8], ipos: usize) -> usize {
    if ipos >= input.len() {
        return 0;
    }
    let mut expect = input[ipos];
    let mut count = 0;
    while ipos + count < input.len() && input[ipos + count] == expect {
        count += 1;
        expect = expect.wrapping_add(1);
    }
    count
}

impl<'a> Encoder<'a> {
    #[inline]
    fn put_control(&mut self, tag: u8, value: usize) -> Result<(), CompressError> {
        control::put_control(self.out, &mut self.opos, tag, value as u16)
    }

    /// RLE finder: a run of at least [`MIN_RLE_LENGTH`] identical bytes.
    fn find_rle(&mut self) -> Result<bool, CompressError> {
        let input = self.input;
        let byte = input[self.ipos];
        let run = input[self.ipos..].iter().take_while(|&&b| b == byte).count();
        if run < MIN_RLE_LENGTH {
            return Ok(false);
        }

        self.flush_literals()?;
        self.put_control(TAG_RLE, run)?;
        self.out[self.opos] = byte;
        self.opos += 1;
        self.ipos += run;
        Ok(true)
    }

    /// LZ finder: longest earlier match of at least [`MIN_LZ_MATCH`] bytes,
    /// or the first such match under [`FAST_LZ`].
    fn find_lz(&mut self) -> Result<bool, CompressError> {
        let input = self.input;
        let ipos = self.ipos;
        if ipos + MIN_LZ_MATCH > input.len() {
            return Ok(false);
        }
        let first = input[ipos];
        let total = self.index.count(first);
        if total == 0 {
            return Ok(false);
        }

        let fast = self.options & FAST_LZ != 0;
        let cap = (input.len() - ipos).min(MAX_LZ_MATCH);
        // Cheap pre-filter: a viable match must already agree at the last
        // byte of the minimum match.
        let probe = input[ipos + MIN_LZ_MATCH - 1];
        let mut best_len = 0;
        let mut best_offset = 0;

        if total < MAX_LZ_BYTE_SCANS {
            for &candidate in self.index.offsets(first) {
                let candidate = candidate as usize;
                if candidate >= ipos {
                    // Offsets ascend; everything further is also unusable.
                    break;
                }
                if input[candidate + MIN_LZ_MATCH - 1] != probe {
                    continue;
                }
                let len = match_run(input, candidate, ipos, cap);
                if len >= MIN_LZ_MATCH && len > best_len {
                    best_len = len;
                    best_offset = candidate;
                    if fast || len == cap {
                        break;
                    }
                }
            }
        } else {
            // The first byte is too common for the index; scan linearly.
            for candidate in 0..ipos {
                if input[candidate + MIN_LZ_MATCH - 1] != probe {
                    continue;
                }
                let len = match_run(input, candidate, ipos, cap);
                if len >= MIN_LZ_MATCH && len > best_len {
                    best_len = len;
                    best_offset = candidate;
                    if fast || len == cap {
                        break;
                    }
                }
            }
        }

        if best_len < MIN_LZ_MATCH {
            return Ok(false);
        }

        self.flush_literals()?;
        let tag = if best_len < 256 {
            TAG_LZ
        } else {
            TAG_LZ | TAG_LZ_LONG
        };
        self.put_control(tag, best_offset)?;
        self.out[self.opos] = best_len as u8;
        self.opos += 1;
        if best_len >= 256 {
            self.out[self.opos] = (best_len >> 8) as u8;
            self.opos += 1;
        }
        self.ipos += best_len;
        Ok(true)
    }

    /// Sequence finder: 32-, 16-, and 8-bit ascending runs, widest first.
    ///
    /// Each width is checked against the current position, so several widths
    /// may fire back to back in one call, each consuming its own span.
    fn find_seq(&mut self) -> Result<bool, CompressError> {
        let mut fired = false;

        let count = seq32_run(self.input, self.ipos);
        if count >= MIN_SEQ32_LENGTH {
            let start = read_le32(self.input, self.ipos);
            self.flush_literals()?;
            self.put_control(TAG_SEQ32, count)?;
            write_le32(self.out, self.opos, start);
            self.opos += 4;
            self.ipos += count * 4;
            fired = true;
        }

        let count = seq16_run(self.input, self.ipos);
        if count >= MIN_SEQ16_LENGTH {
            let start = read_le16(self.input, self.ipos);
            self.flush_literals()?;
            self.put_control(TAG_SEQ16, count)?;
            write_le16(self.out, self.opos, start);
            self.opos += 2;
            self.ipos += count * 2;
            fired = true;
        }

        let count = seq8_run(self.input, self.ipos);
        if count >= MIN_SEQ8_LENGTH {
            let start = self.input[self.ipos];
            self.flush_literals()?;
            self.put_control(TAG_SEQ8, count)?;
            self.out[self.opos] = start;
            self.opos += 1;
            self.ipos += count;
            fired = true;
        }

        Ok(fired)
    }

    /// Emit the pending literal run verbatim.
    fn flush_literals_raw(&mut self) -> Result<(), CompressError> {
        if self.literals == 0 {
            return Ok(());
        }
        self.put_control(TAG_LIT, self.literals)?;
        let start = self.literal_start;
        self.out[self.opos..self.opos + self.literals]
            .copy_from_slice(&self.input[start..start + self.literals]);
        self.opos += self.literals;
        self.literals = 0;
        Ok(())
    }

    /// Flush the pending literal run, re-compressing it through the 4-plane
    /// transform when that wins.
    ///
    /// The recursive pass runs with [`REALFLUSH`] | [`NOPREFIX`], so it can
    /// neither recurse again nor emit a length prefix.
    fn flush_literals(&mut self) -> Result<(), CompressError> {
        if self.literals == 0 {
            return Ok(());
        }
        if self.literals < MIN_RLE_LENGTH + MIN_PLANE_LENGTH || self.options & REALFLUSH != 0 {
            return self.flush_literals_raw();
        }

        let input = self.input;
        let run = &input[self.literal_start..self.literal_start + self.literals];

        let mut planed = [0u8; BLOCK_SIZE];
        let planed = &mut planed[..run.len()];
        plane::forward(run, planed, LITERAL_PLANES);

        let mut packed = [0u8; compress_bound(BLOCK_SIZE)];
        let inner = self.inner.get_or_insert_with(|| Box::new(Compressor::new()));
        let packed_len = inner.compress(planed, &mut packed, self.options | REALFLUSH | NOPREFIX)?;

        if packed_len + MIN_PLANE_LENGTH >= run.len() {
            // The planed form doesn't pay for its control overhead.
            return self.flush_literals_raw();
        }

        self.put_control(TAG_PLANE, packed_len)?;
        self.out[self.opos..self.opos + packed_len].copy_from_slice(&packed[..packed_len]);
        self.opos += packed_len;
        self.literals = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::decompress::decompress;

    fn pack(data: &[u8], options: u32) -> Vec<u8> {
        let mut out = vec![0u8; compress_bound(data.len())];
        let n = compress(data, &mut out, options).unwrap();
        out.truncate(n);
        out
    }

    fn unpack(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; BLOCK_SIZE];
        let n = decompress(payload, &mut out).unwrap();
        out.truncate(n);
        out
    }

    #[test]
    fn rle_run_compresses_to_one_command() {
        let data = vec![0x41u8; 300];
        let packed = pack(&data, 0);
        // prefix 3, then RLE control 0x41 0x2c (run 300), then the byte.
        assert_eq!(packed, [0x03, 0x00, 0x41, 0x2c, 0x41]);
        assert_eq!(unpack(&packed[2..]), data);
    }

    #[test]
    fn ascending_bytes_become_seq8() {
        let data: Vec<u8> = (0..10).collect();
        let packed = pack(&data, 0);
        assert_eq!(packed, [0x03, 0x00, 0x81, 0x0a, 0x00]);
        assert_eq!(unpack(&packed[2..]), data);
    }

    #[test]
    fn counter_words_become_rle_then_seq32() {
        // Ten little-endian u32 counters. The first sixteen bytes open with
        // a four-byte zero run, so RLE claims it before the sequence finder
        // sees the remaining nine counters.
        let mut data = Vec::new();
        for v in 0u32..10 {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let packed = pack(&data, 0);
        assert_eq!(
            packed,
            [0x08, 0x00, 0xc4, 0x00, 0x83, 0x09, 0x01, 0x00, 0x00, 0x00]
        );
        assert_eq!(unpack(&packed[2..]), data);
    }

    #[test]
    fn repeated_word_becomes_literal_then_lz() {
        let data = b"ABCDEFABCDEF";
        let packed = pack(data, 0);
        assert_eq!(
            packed,
            [0x09, 0x00, 0xa6, b'A', b'B', b'C', b'D', b'E', b'F', 0xe0, 0x06]
        );
        assert_eq!(unpack(&packed[2..]), data);
    }

    #[test]
    fn full_zero_block_is_a_single_max_rle() {
        let data = vec![0u8; BLOCK_SIZE];
        let packed = pack(&data, 0);
        // Run length 0x1000 rides its top bit in the control byte.
        assert_eq!(packed, [0x03, 0x00, 0x50, 0x00, 0x00]);
        assert_eq!(unpack(&packed[2..]), data);
    }

    #[test]
    fn empty_block_is_prefix_only() {
        let packed = pack(&[], 0);
        assert_eq!(packed, [0x00, 0x00]);
        assert_eq!(unpack(&packed[2..]), Vec::<u8>::new());
    }

    #[test]
    fn below_min_match_is_all_literals() {
        let packed = pack(&[0x42], 0);
        assert_eq!(packed, [0x02, 0x00, 0xa1, 0x42]);
        let packed = pack(&[1, 2, 3], 0);
        assert_eq!(packed, [0x04, 0x00, 0xa3, 1, 2, 3]);
    }

    #[test]
    fn noprefix_omits_the_length_prefix() {
        let with = pack(b"ABCDEFABCDEF", 0);
        let without = pack(b"ABCDEFABCDEF", NOPREFIX);
        assert_eq!(&with[2..], &without[..]);
    }

    #[test]
    fn strided_records_go_through_the_plane_pass() {
        // 16 four-byte records: an incrementing key byte plus three constant
        // bytes. Raw, no finder bites; planed, the key bytes form a Seq8 run
        // and each constant byte column an RLE run.
        let mut data = Vec::new();
        for i in 0u8..16 {
            data.extend_from_slice(&[i, 0x55, 0x66, 0x77]);
        }
        let packed = pack(&data, 0);
        assert_eq!(
            packed,
            [
                0x0e, 0x00, // prefix: 14 payload bytes
                0x84, 0x0c, // plane command, 12 packed bytes
                0x81, 0x10, 0x00, // seq8: 16 values from 0
                0x40, 0x10, 0x55, // rle: 16 × 0x55
                0x40, 0x10, 0x66, // rle: 16 × 0x66
                0x40, 0x10, 0x77, // rle: 16 × 0x77
            ]
        );
        assert_eq!(unpack(&packed[2..]), data);
    }

    #[test]
    fn plane_pass_backs_off_when_it_does_not_pay() {
        // A literal run long enough to attempt the plane pass but with no
        // plane structure falls back to a plain literal command.
        let data: Vec<u8> = (0u16..64).map(|v| (v.wrapping_mul(37) % 251) as u8).collect();
        let packed = pack(&data, 0);
        assert_eq!(packed[2], TAG_LIT | (64u16 >> 8) as u8);
        assert_eq!(packed[3], 64);
        assert_eq!(unpack(&packed[2..]), data);
    }

    #[test]
    fn input_above_block_size_is_rejected() {
        let data = vec![0u8; BLOCK_SIZE + 1];
        let mut out = vec![0u8; compress_bound(data.len())];
        assert_eq!(
            compress(&data, &mut out, 0),
            Err(CompressError::InputTooLarge(BLOCK_SIZE + 1))
        );
    }

    #[test]
    fn undersized_output_is_rejected_up_front() {
        let data = [0u8; 64];
        let mut out = vec![0u8; compress_bound(64) - 1];
        assert_eq!(
            compress(&data, &mut out, 0),
            Err(CompressError::OutputTooSmall)
        );
    }

    #[test]
    fn reusable_context_matches_one_shot() {
        let mut ctx = Compressor::new();
        let data = b"ABCDEFABCDEFABCDEF";
        let mut a = vec![0u8; compress_bound(data.len())];
        let mut b = vec![0u8; compress_bound(data.len())];
        let na = ctx.compress(data, &mut a, 0).unwrap();
        let nb = compress(data, &mut b, 0).unwrap();
        assert_eq!(&a[..na], &b[..nb]);
        // Same context across blocks: the index is rebuilt, not carried over.
        let other = vec![0x77u8; 40];
        let nc = ctx.compress(&other, &mut a, 0).unwrap();
        assert_eq!(unpack(&a[2..nc]), other);
    }

    #[test]
    fn match_run_respects_the_cap() {
        let data = b"aaaaaaaa";
        assert_eq!(match_run(data, 0, 2, 6), 6);
        assert_eq!(match_run(data, 0, 2, 3), 3);
    }

    #[test]
    fn seq_runs_wrap_around_their_width() {
        let data = [0xfe, 0xff, 0x00, 0x01, 0x02];
        assert_eq!(seq8_run(&data, 0), 5);
        let mut words = Vec::new();
        for v in [0xfffeu16, 0xffff, 0x0000, 0x0001] {
            words.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(seq16_run(&words, 0), 4);
    }

    #[test]
    fn seq_runs_stop_at_the_input_end() {
        // 9 bytes: two full u32 reads, the ninth byte is unreachable at
        // width 4 but caps the u8 run.
        let mut data = Vec::new();
        data.extend_from_slice(&5u32.to_le_bytes());
        data.extend_from_slice(&6u32.to_le_bytes());
        data.push(0xaa);
        assert_eq!(seq32_run(&data, 0), 2);
        assert_eq!(seq8_run(&data, 5), 1);
    }
}
