//! Stream driver: frames a byte stream as successive compressed blocks.
//!
//! The driver owns everything outside the codec: splitting input into
//! ≤ 4096-byte blocks, the 4-byte frame header around each payload, the
//! stored-raw escape for incompressible blocks, worker-pool parallelism on
//! the compression side, and error reporting as `std::io::Error` with
//! distinct messages per failure.

use std::io::{self, Read};

pub mod compress;
pub mod decompress;

pub use compress::compress_stream;
pub use decompress::{decompress_stream, decompress_stream_legacy};

// ─────────────────────────────────────────────────────────────────────────────
// Driver preferences and statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime knobs the CLI hands to the stream functions.
#[derive(Debug, Clone, Copy)]
pub struct Prefs {
    /// Compression worker threads; 0 or 1 means single-threaded.
    pub nb_workers: usize,
    /// Accept the first LZ match instead of searching for the longest.
    pub fast_lz: bool,
}

impl Default for Prefs {
    fn default() -> Self {
        Prefs {
            nb_workers: 1,
            fast_lz: false,
        }
    }
}

/// Byte and block counts from one stream run.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub blocks: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Read helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Fill `buf` as far as the reader allows; a short count means end of input.
pub(crate) fn read_to_capacity(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Read an exact `N`-byte header. `None` on clean end of stream; an
/// `UnexpectedEof` error when the stream dies inside the header.
pub(crate) fn read_header<const N: usize>(reader: &mut dyn Read) -> io::Result<Option<[u8; N]>> {
    let mut buf = [0u8; N];
    let filled = read_to_capacity(reader, &mut buf)?;
    match filled {
        0 => Ok(None),
        n if n == N => Ok(Some(buf)),
        n => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("truncated frame header: {n} of {N} bytes"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_to_capacity_stops_at_eof() {
        let mut src = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(read_to_capacity(&mut src, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }

    #[test]
    fn read_header_distinguishes_eof_from_truncation() {
        let mut empty = Cursor::new(Vec::<u8>::new());
        assert_eq!(read_header::<4>(&mut empty).unwrap(), None);

        let mut whole = Cursor::new(vec![9u8; 4]);
        assert_eq!(read_header::<4>(&mut whole).unwrap(), Some([9; 4]));

        let mut short = Cursor::new(vec![9u8; 2]);
        let err = read_header::<4>(&mut short).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
