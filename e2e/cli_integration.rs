//! E2E Test Suite 03: CLI Integration
//!
//! Spawns the real `lzjody` binary and drives it through pipes and files:
//! compress/decompress round trips, the legacy read path, exit codes, and
//! usage errors.

use std::io::Write;
use std::process::{Command, Stdio};

fn lzjody() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lzjody"))
}

/// Run the binary with `args`, feeding `input` on stdin; returns
/// (exit code, stdout).
fn run(args: &[&str], input: &[u8]) -> (i32, Vec<u8>) {
    let mut child = lzjody()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn lzjody");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input)
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");
    (output.status.code().unwrap_or(-1), output.stdout)
}

#[test]
fn test_compress_decompress_round_trip() {
    let data = b"round and round the ragged rock the ragged rascal ran ".repeat(400);

    let (code, packed) = run(&["-c", "-q"], &data);
    assert_eq!(code, 0);
    assert!(packed.len() < data.len());

    let (code, restored) = run(&["-d", "-q"], &packed);
    assert_eq!(code, 0);
    assert_eq!(restored, data);
}

#[test]
fn test_multithreaded_compression_round_trip() {
    let data: Vec<u8> = (0u32..40_000).flat_map(|v| (v / 3).to_le_bytes()).collect();

    let (code, packed) = run(&["-c", "-q", "-T", "4"], &data);
    assert_eq!(code, 0);

    let (code, restored) = run(&["-d", "-q"], &packed);
    assert_eq!(code, 0);
    assert_eq!(restored, data);
}

#[test]
fn test_fast_flag_round_trip() {
    let data = b"ABCDEFGH".repeat(2000);
    let (code, packed) = run(&["-c", "-q", "-F"], &data);
    assert_eq!(code, 0);
    let (code, restored) = run(&["-d", "-q"], &packed);
    assert_eq!(code, 0);
    assert_eq!(restored, data);
}

#[test]
fn test_legacy_decompress_flag() {
    // Build a legacy stream with the library (prefixed block output).
    let block = b"ABCDEFABCDEFABCDEF";
    let mut packed = vec![0u8; lzjody::compress_bound(block.len())];
    let n = lzjody::compress(block, &mut packed, 0).expect("compress");
    packed.truncate(n);

    let (code, restored) = run(&["-d", "-l", "-q"], &packed);
    assert_eq!(code, 0);
    assert_eq!(restored, block);
}

#[test]
fn test_empty_input_round_trip() {
    let (code, packed) = run(&["-c", "-q"], &[]);
    assert_eq!(code, 0);
    assert!(packed.is_empty());

    let (code, restored) = run(&["-d", "-q"], &packed);
    assert_eq!(code, 0);
    assert!(restored.is_empty());
}

#[test]
fn test_files_through_shell_pipeline() {
    // Same flow a user runs: lzjody -c < file > file.lzj; lzjody -d < file.lzj
    let dir = tempfile::tempdir().expect("tempdir");
    let raw_path = dir.path().join("input.bin");
    let packed_path = dir.path().join("input.bin.lzj");

    let data = vec![0xabu8; 100_000];
    std::fs::write(&raw_path, &data).expect("write input");

    let status = lzjody()
        .arg("-c")
        .stdin(std::fs::File::open(&raw_path).expect("open input"))
        .stdout(std::fs::File::create(&packed_path).expect("create output"))
        .stderr(Stdio::null())
        .status()
        .expect("run compress");
    assert!(status.success());
    assert!(std::fs::metadata(&packed_path).expect("meta").len() < 1000);

    let (code, restored) = run(
        &["-d", "-q"],
        &std::fs::read(&packed_path).expect("read packed"),
    );
    assert_eq!(code, 0);
    assert_eq!(restored, data);
}

// ─────────────────────────────────────────────────────────────────────────────
// Exit codes and usage
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_no_mode_is_an_error() {
    let (code, _) = run(&[], &[]);
    assert_eq!(code, 1);
}

#[test]
fn test_unknown_option_is_an_error() {
    let (code, _) = run(&["--no-such-thing"], &[]);
    assert_eq!(code, 1);
}

#[test]
fn test_legacy_with_compress_is_an_error() {
    let (code, _) = run(&["-c", "-l"], &[]);
    assert_eq!(code, 1);
}

#[test]
fn test_corrupt_stream_fails_decompression() {
    let (code, _) = run(&["-d", "-q"], b"\x00\x00\x00\x02\xe5\x04");
    assert_eq!(code, 1);
}

#[test]
fn test_truncated_stream_fails_decompression() {
    let (code, packed) = run(&["-c", "-q"], &[0x55u8; 9000]);
    assert_eq!(code, 0);
    let (code, _) = run(&["-d", "-q"], &packed[..packed.len() - 1]);
    assert_eq!(code, 1);
}

#[test]
fn test_version_and_help_exit_zero() {
    let (code, stdout) = run(&["-V"], &[]);
    assert_eq!(code, 0);
    assert!(String::from_utf8_lossy(&stdout).contains("lzjody"));

    let (code, _) = run(&["-h"], &[]);
    assert_eq!(code, 0);
}
