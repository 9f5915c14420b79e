//! LZJody block compression.
//!
//! A byte-oriented, block-framed lossless codec: each input block of up to
//! 4096 bytes becomes a stream of typed commands — literal runs, LZ
//! back-references, RLE runs, 8/16/32-bit arithmetic sequences, and a
//! recursive byte-plane transform over literal runs. Blocks are fully
//! independent (no dictionary carry-over), which is what makes the stream
//! driver's per-block parallelism safe.
//!
//! The layers, inside out:
//!
//! - [`block`] — the codec: encoder, decoder, wire constants, plane transform.
//! - [`frame`] — the per-block frame header (4-byte extended form; legacy
//!   2-byte form read-only).
//! - [`io`] — stdin/stdout stream driver with worker-pool compression.
//! - [`cli`] / [`config`] — argument parsing and defaults for the binary.
//!
//! ```
//! use lzjody::{compress, compress_bound, decompress, BLOCK_SIZE};
//!
//! let data = b"ABCDEFABCDEFABCDEF";
//! let mut packed = vec![0u8; compress_bound(data.len())];
//! let n = compress(data, &mut packed, 0).unwrap();
//!
//! // The default framing starts with a 2-byte little-endian length prefix;
//! // the decoder consumes the bare command stream after it.
//! let mut restored = vec![0u8; BLOCK_SIZE];
//! let len = decompress(&packed[2..n], &mut restored).unwrap();
//! assert_eq!(&restored[..len], data);
//! ```

pub mod block;
pub mod cli;
pub mod config;
pub mod frame;
pub mod io;

/// One-shot block compression. See [`block::compress::compress`].
pub use block::compress::{compress, CompressError, Compressor};
/// One-shot block decompression. See [`block::decompress::decompress`].
pub use block::decompress::{decompress, DecompressError};
/// Reversible byte-plane interleave used by the Plane command.
pub use block::plane;
/// Worst-case compressed size for a given input length.
pub use block::types::compress_bound;
/// Option flags for [`compress`] and the frame layer.
pub use block::types::{FAST_LZ, NOCOMPRESS, NOPREFIX, REALFLUSH};
pub use block::types::{BLOCK_SIZE, LENGTH_PREFIX_SIZE};
/// Frame header codec used by the stream driver.
pub use frame::{FrameError, FrameHeader, FRAME_HEADER_SIZE};
