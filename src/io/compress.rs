//! Stream compression: raw bytes in, framed blocks out.
//!
//! Blocks are independent, so parallelism is per block. [`BlockPipeline`]
//! owns the whole parallel path: the reader submits blocks and the pipeline
//! stamps each with an ascending sequence number, encodes it on a rayon
//! worker, and hands frames back to the writer strictly in sequence order,
//! parking any that finish early. Admission is bounded by a pre-filled
//! token channel, so the reader stalls instead of outrunning the encoders,
//! and every worker reuses its thread-local compression context.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use crate::block::compress::compress;
use crate::block::types::{compress_bound, BLOCK_SIZE, FAST_LZ, NOPREFIX};
use crate::frame::{FrameHeader, FRAME_HEADER_SIZE};
use crate::io::{read_to_capacity, Prefs, StreamStats};

// ─────────────────────────────────────────────────────────────────────────────
// Per-block frame assembly
// ─────────────────────────────────────────────────────────────────────────────

/// Compress one block and wrap it in a frame, falling back to a stored
/// frame when compression does not shrink it.
fn encode_frame(block: &[u8], options: u32) -> io::Result<Vec<u8>> {
    let mut frame = vec![0u8; FRAME_HEADER_SIZE + compress_bound(block.len())];
    let packed_len = compress(block, &mut frame[FRAME_HEADER_SIZE..], options)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("block encode: {e}")))?;

    if packed_len >= block.len() {
        // Incompressible: store the raw block under the NOCOMPRESS flag.
        let header = FrameHeader::stored(block.len());
        frame[..FRAME_HEADER_SIZE].copy_from_slice(&header.encode());
        frame[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + block.len()].copy_from_slice(block);
        frame.truncate(FRAME_HEADER_SIZE + block.len());
    } else {
        let header = FrameHeader::compressed(packed_len);
        frame[..FRAME_HEADER_SIZE].copy_from_slice(&header.encode());
        frame.truncate(FRAME_HEADER_SIZE + packed_len);
    }
    Ok(frame)
}

// ─────────────────────────────────────────────────────────────────────────────
// Parallel encode pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// One encoded block on its way back to the writer.
type SequencedFrame = (u64, io::Result<Vec<u8>>);

/// Sequence-ordered parallel block encoder.
///
/// The producer side runs on the caller's thread: [`submit`](Self::submit)
/// numbers each block and ships it to a worker, [`drain`](Self::drain)
/// writes whatever finished in order, [`finish`](Self::finish) blocks until
/// the tail is written. Frame order on the wire always equals submission
/// order, whatever order the workers finish in.
struct BlockPipeline {
    pool: rayon::ThreadPool,
    /// Admission tokens; one per block the pipeline will hold at a time.
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
    /// Finished frames travelling back from the workers.
    result_tx: Sender<SequencedFrame>,
    result_rx: Receiver<SequencedFrame>,
    /// Encoder options stamped onto every job.
    options: u32,
    /// Sequence number for the next submitted block.
    next_seq: u64,
    /// Sequence number the writer still owes the output stream.
    next_write: u64,
    /// Frames that finished ahead of their turn.
    parked: BTreeMap<u64, io::Result<Vec<u8>>>,
}

impl BlockPipeline {
    /// Spin up `workers` encoder threads. Returns `None` when `workers` is
    /// zero or thread spawning fails.
    fn new(workers: usize, options: u32) -> Option<Self> {
        if workers == 0 {
            return None;
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .ok()?;

        // One block encoding plus two queued per worker; blocks are 4 KiB,
        // so the ceiling is small and the reader gets stalled, not the pool.
        let capacity = workers * 3;
        let (slot_tx, slot_rx) = bounded(capacity);
        for _ in 0..capacity {
            slot_tx.send(()).ok()?;
        }
        let (result_tx, result_rx) = unbounded();

        Some(BlockPipeline {
            pool,
            slot_tx,
            slot_rx,
            result_tx,
            result_rx,
            options,
            next_seq: 0,
            next_write: 0,
            parked: BTreeMap::new(),
        })
    }

    /// Queue one block for encoding, blocking while the pipeline is full.
    fn submit(&mut self, block: Vec<u8>) {
        self.slot_rx.recv().expect("pipeline slot channel closed");

        let seq = self.next_seq;
        self.next_seq += 1;
        let options = self.options;
        let result_tx = self.result_tx.clone();
        let slot_tx = self.slot_tx.clone();
        self.pool.spawn(move || {
            let frame = encode_frame(&block, options);
            // Sends only fail once the pipeline itself is gone.
            let _ = result_tx.send((seq, frame));
            let _ = slot_tx.send(());
        });
    }

    /// Collect finished frames without blocking and write the in-order
    /// prefix. Returns bytes written.
    fn drain(&mut self, writer: &mut dyn Write) -> io::Result<u64> {
        while let Ok((seq, frame)) = self.result_rx.try_recv() {
            self.parked.insert(seq, frame);
        }
        self.write_ready(writer)
    }

    /// Wait for every outstanding block and write the remaining frames in
    /// order. Returns bytes written.
    fn finish(&mut self, writer: &mut dyn Write) -> io::Result<u64> {
        let mut written = self.drain(writer)?;
        while self.next_write < self.next_seq {
            let (seq, frame) = self
                .result_rx
                .recv()
                .expect("pipeline result channel closed");
            self.parked.insert(seq, frame);
            written += self.write_ready(writer)?;
        }
        Ok(written)
    }

    fn write_ready(&mut self, writer: &mut dyn Write) -> io::Result<u64> {
        let mut written = 0u64;
        while let Some(frame) = self.parked.remove(&self.next_write) {
            self.next_write += 1;
            let frame = frame?;
            writer.write_all(&frame)?;
            written += frame.len() as u64;
        }
        Ok(written)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream loops
// ─────────────────────────────────────────────────────────────────────────────

/// Compress `reader` to `writer` as a sequence of extended frames.
pub fn compress_stream(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    prefs: &Prefs,
) -> io::Result<StreamStats> {
    let mut options = NOPREFIX;
    if prefs.fast_lz {
        options |= FAST_LZ;
    }

    let stats = if prefs.nb_workers > 1 {
        compress_stream_mt(reader, writer, options, prefs.nb_workers)?
    } else {
        compress_stream_st(reader, writer, options)?
    };
    writer.flush()?;
    Ok(stats)
}

fn compress_stream_st(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    options: u32,
) -> io::Result<StreamStats> {
    let mut stats = StreamStats::default();
    let mut block = [0u8; BLOCK_SIZE];

    loop {
        let len = read_to_capacity(reader, &mut block)?;
        if len == 0 {
            break;
        }
        let frame = encode_frame(&block[..len], options)?;
        writer.write_all(&frame)?;
        stats.bytes_read += len as u64;
        stats.bytes_written += frame.len() as u64;
        stats.blocks += 1;
    }
    Ok(stats)
}

fn compress_stream_mt(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    options: u32,
    workers: usize,
) -> io::Result<StreamStats> {
    let mut pipeline = BlockPipeline::new(workers, options).ok_or_else(|| {
        io::Error::new(io::ErrorKind::Other, "failed to start compression workers")
    })?;
    let mut stats = StreamStats::default();
    let mut block = [0u8; BLOCK_SIZE];

    loop {
        let len = read_to_capacity(reader, &mut block)?;
        if len == 0 {
            break;
        }
        pipeline.submit(block[..len].to_vec());
        stats.bytes_read += len as u64;
        stats.blocks += 1;
        stats.bytes_written += pipeline.drain(writer)?;
    }

    stats.bytes_written += pipeline.finish(writer)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::decompress::decompress_stream;
    use std::io::Cursor;

    fn round_trip(data: &[u8], prefs: &Prefs) -> (Vec<u8>, StreamStats) {
        let mut packed = Vec::new();
        let stats = compress_stream(&mut Cursor::new(data), &mut packed, prefs).unwrap();
        assert_eq!(stats.bytes_read, data.len() as u64);
        assert_eq!(stats.bytes_written, packed.len() as u64);

        let mut restored = Vec::new();
        decompress_stream(&mut Cursor::new(&packed), &mut restored).unwrap();
        assert_eq!(restored, data);
        (packed, stats)
    }

    #[test]
    fn empty_input_produces_no_frames() {
        let (packed, stats) = round_trip(&[], &Prefs::default());
        assert!(packed.is_empty());
        assert_eq!(stats.blocks, 0);
    }

    #[test]
    fn compressible_stream_shrinks() {
        let data = vec![0xabu8; 3 * BLOCK_SIZE + 17];
        let (packed, stats) = round_trip(&data, &Prefs::default());
        assert_eq!(stats.blocks, 4);
        assert!(packed.len() < data.len() / 10);
    }

    #[test]
    fn incompressible_block_is_stored_raw() {
        // High-entropy filler defeats every finder; the frame must carry the
        // stored flag and exactly block-length payload.
        let mut state = 0x2545_f491u32;
        let data: Vec<u8> = (0..600)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect();
        let (packed, _) = round_trip(&data, &Prefs::default());
        let header = FrameHeader::decode([packed[0], packed[1], packed[2], packed[3]]).unwrap();
        assert!(header.is_stored());
        assert_eq!(header.payload_len, data.len());
        assert_eq!(packed.len(), FRAME_HEADER_SIZE + data.len());
    }

    #[test]
    fn multithreaded_output_matches_single_threaded() {
        // Mixed content across 10 blocks; frame order must be byte-identical.
        let mut data = Vec::new();
        for i in 0u32..(10 * BLOCK_SIZE as u32 / 4) {
            data.extend_from_slice(&(i / 7).to_le_bytes());
        }
        let (st, _) = round_trip(&data, &Prefs { nb_workers: 1, fast_lz: false });
        for workers in [2, 4, 8] {
            let (mt, stats) = round_trip(&data, &Prefs { nb_workers: workers, fast_lz: false });
            assert_eq!(st, mt, "{workers} workers changed the stream");
            assert_eq!(stats.bytes_written as usize, mt.len());
        }
        assert_eq!(decompress_stream_to_vec(&st), data);
    }

    fn decompress_stream_to_vec(stream: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        decompress_stream(&mut Cursor::new(stream), &mut out).unwrap();
        out
    }

    #[test]
    fn pipeline_preserves_submission_order() {
        // 32 distinguishable blocks through 4 workers; whatever order the
        // workers finish in, the frames must come out 0, 1, 2, …
        let mut pipeline = BlockPipeline::new(4, NOPREFIX).expect("pipeline");
        let blocks: Vec<Vec<u8>> = (0..32u8).map(|i| vec![i; 512]).collect();

        let mut stream = Vec::new();
        for block in &blocks {
            pipeline.submit(block.clone());
            pipeline.drain(&mut stream).unwrap();
        }
        pipeline.finish(&mut stream).unwrap();

        assert_eq!(decompress_stream_to_vec(&stream), blocks.concat());
    }

    #[test]
    fn pipeline_finish_accounts_every_byte() {
        let mut pipeline = BlockPipeline::new(2, NOPREFIX).expect("pipeline");
        for i in 0..8u8 {
            pipeline.submit(vec![i; 100]);
        }
        let mut stream = Vec::new();
        let written = pipeline.finish(&mut stream).unwrap();
        assert_eq!(written as usize, stream.len());
        assert_eq!(pipeline.next_write, pipeline.next_seq);
        assert!(pipeline.parked.is_empty());
    }

    #[test]
    fn pipeline_propagates_encode_errors() {
        // An oversized block cannot be encoded; the error must surface at
        // the writer side, not vanish on the worker thread.
        let mut pipeline = BlockPipeline::new(2, NOPREFIX).expect("pipeline");
        pipeline.submit(vec![0u8; BLOCK_SIZE + 1]);
        let err = pipeline.finish(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn pipeline_rejects_zero_workers() {
        assert!(BlockPipeline::new(0, NOPREFIX).is_none());
    }
}
