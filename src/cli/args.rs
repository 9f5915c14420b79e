//! Command-line argument parsing.
//!
//! [`parse_args`] reads `std::env::args()`; [`parse_args_from`] takes an
//! explicit slice so tests never touch the process environment. Bad or
//! unknown options return an `Err` whose message begins with `bad usage:`.

use anyhow::{anyhow, bail, Result};

use crate::cli::constants::{display_level, set_display_level, PROGRAM_NAME};
use crate::config::{NB_WORKERS_DEFAULT, NB_WORKERS_MAX};

/// Selected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    Compress,
    Decompress,
}

/// Everything the dispatch phase needs, produced by one parsing pass.
#[derive(Debug)]
pub struct ParsedArgs {
    pub op_mode: OpMode,
    /// Decompress legacy (2-byte length prefix) input.
    pub legacy: bool,
    /// First-match LZ search.
    pub fast_lz: bool,
    /// Worker threads; 0 = auto-detect. Defaults to
    /// [`NB_WORKERS_DEFAULT`].
    pub nb_workers: usize,
    /// Write compressed data to a terminal without complaint.
    pub force_stdout: bool,
    /// `-h`/`-V` was handled; exit 0 without doing any I/O.
    pub exit_early: bool,
}

/// Parse `std::env::args()` (skipping argv[0]).
pub fn parse_args() -> Result<ParsedArgs> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    parse_args_from(&argv)
}

/// Parse an explicit argument list.
pub fn parse_args_from(argv: &[String]) -> Result<ParsedArgs> {
    let mut op_mode: Option<OpMode> = None;
    let mut legacy = false;
    let mut fast_lz = false;
    let mut nb_workers: usize = NB_WORKERS_DEFAULT;
    let mut force_stdout = false;
    let mut exit_early = false;

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" | "--compress" => op_mode = Some(OpMode::Compress),
            "-d" | "--decompress" => op_mode = Some(OpMode::Decompress),
            "-l" | "--legacy" => legacy = true,
            "-F" | "--fast" => fast_lz = true,
            "-f" | "--force" => force_stdout = true,
            "-q" | "--quiet" => set_display_level(display_level().saturating_sub(1)),
            "-v" | "--verbose" => set_display_level(display_level() + 1),
            "-h" | "--help" => {
                print_usage();
                exit_early = true;
            }
            "-V" | "--version" => {
                println!("{} {}", PROGRAM_NAME, env!("CARGO_PKG_VERSION"));
                exit_early = true;
            }
            "-T" | "--threads" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("bad usage: -T needs a thread count"))?;
                nb_workers = parse_workers(value)?;
            }
            other => {
                // Allow the attached form `-TN`.
                if let Some(value) = other.strip_prefix("-T") {
                    nb_workers = parse_workers(value)?;
                } else {
                    bail!("bad usage: unknown option '{other}'");
                }
            }
        }
    }

    if exit_early {
        // Any op mode is irrelevant; the caller exits 0.
        return Ok(ParsedArgs {
            op_mode: OpMode::Compress,
            legacy,
            fast_lz,
            nb_workers,
            force_stdout,
            exit_early,
        });
    }

    let Some(op_mode) = op_mode else {
        bail!("bad usage: specify -c (compress) or -d (decompress)");
    };
    if legacy && op_mode != OpMode::Decompress {
        bail!("bad usage: -l only applies to decompression");
    }

    Ok(ParsedArgs {
        op_mode,
        legacy,
        fast_lz,
        nb_workers,
        force_stdout,
        exit_early,
    })
}

fn parse_workers(value: &str) -> Result<usize> {
    let count: usize = value
        .parse()
        .map_err(|_| anyhow!("bad usage: invalid thread count '{value}'"))?;
    if count > NB_WORKERS_MAX {
        bail!("bad usage: thread count {count} above maximum {NB_WORKERS_MAX}");
    }
    Ok(count)
}

/// Print the usage summary to stderr.
pub fn print_usage() {
    eprintln!("{PROGRAM_NAME} {}", env!("CARGO_PKG_VERSION"));
    eprintln!("usage: {PROGRAM_NAME} -c|-d [options] < input > output");
    eprintln!("  -c          compress stdin to stdout");
    eprintln!("  -d          decompress stdin to stdout");
    eprintln!("  -l          with -d: input uses the legacy 2-byte framing");
    eprintln!("  -F          faster, slightly weaker LZ match search");
    eprintln!("  -T N        use N compression threads (0 = all cores, the default)");
    eprintln!("  -f          allow compressed output on a terminal");
    eprintln!("  -q / -v     quieter / more verbose");
    eprintln!("  -h / -V     help / version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ParsedArgs> {
        let argv: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        parse_args_from(&argv)
    }

    #[test]
    fn compress_and_decompress_modes() {
        assert_eq!(parse(&["-c"]).unwrap().op_mode, OpMode::Compress);
        assert_eq!(parse(&["-d"]).unwrap().op_mode, OpMode::Decompress);
        // Last one wins, like repeated flags elsewhere in the family.
        assert_eq!(parse(&["-c", "-d"]).unwrap().op_mode, OpMode::Decompress);
    }

    #[test]
    fn thread_count_accepts_both_spellings() {
        assert_eq!(parse(&["-c", "-T", "8"]).unwrap().nb_workers, 8);
        assert_eq!(parse(&["-c", "-T8"]).unwrap().nb_workers, 8);
        assert_eq!(parse(&["-c", "-T0"]).unwrap().nb_workers, 0);
    }

    #[test]
    fn thread_count_defaults_to_auto_detect() {
        assert_eq!(parse(&["-c"]).unwrap().nb_workers, NB_WORKERS_DEFAULT);
        assert_eq!(NB_WORKERS_DEFAULT, 0);
    }

    #[test]
    fn missing_mode_is_bad_usage() {
        let err = parse(&[]).unwrap_err();
        assert!(err.to_string().starts_with("bad usage:"));
    }

    #[test]
    fn legacy_requires_decompress() {
        assert!(parse(&["-c", "-l"]).is_err());
        let ok = parse(&["-d", "-l"]).unwrap();
        assert!(ok.legacy);
    }

    #[test]
    fn unknown_option_is_bad_usage() {
        let err = parse(&["-c", "--frobnicate"]).unwrap_err();
        assert!(err.to_string().contains("--frobnicate"));
    }

    #[test]
    fn oversized_thread_count_is_rejected() {
        assert!(parse(&["-c", "-T", "9999"]).is_err());
        assert!(parse(&["-c", "-Tbogus"]).is_err());
    }
}
