//! The block codec: a ≤ 4096-byte input block in, a typed command stream out,
//! and back again.
//!
//! Submodules follow the data path: [`types`] fixes the wire format and
//! parameters, [`index`] accelerates match search, [`control`] reads and
//! writes command headers, [`plane`] is the reversible byte-plane transform,
//! [`compress`] hosts the encoder and [`decompress`] the decoder.

pub mod compress;
pub(crate) mod control;
pub mod decompress;
pub(crate) mod index;
pub mod plane;
pub mod types;

pub use compress::{compress, CompressError, Compressor};
pub use decompress::{decompress, DecompressError};
pub use types::{compress_bound, BLOCK_SIZE, LENGTH_PREFIX_SIZE};
