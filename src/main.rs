//! Binary entry point for the `lzjody` command-line tool.
//!
//! Parsing happens in [`lzjody::cli::args`]; this file only validates the
//! terminal situation, resolves the worker count, and dispatches to the
//! stream driver. All exit paths go through the integer code returned by
//! [`run`].

use std::io::IsTerminal;

use lzjody::cli::args::{parse_args, print_usage, OpMode, ParsedArgs};
use lzjody::config::NB_WORKERS_MAX;
use lzjody::displaylevel;
use lzjody::io::{compress_stream, decompress_stream, decompress_stream_legacy, Prefs, StreamStats};

fn ratio(stats: &StreamStats) -> f64 {
    if stats.bytes_read == 0 {
        100.0
    } else {
        stats.bytes_written as f64 / stats.bytes_read as f64 * 100.0
    }
}

fn run(args: ParsedArgs) -> i32 {
    // Resolve the worker request: 0 = one per core, capped like any other.
    let nb_workers = match args.nb_workers {
        0 => num_cpus::get().min(NB_WORKERS_MAX),
        n => n,
    };

    match args.op_mode {
        OpMode::Compress => {
            if std::io::stdout().is_terminal() && !args.force_stdout {
                displaylevel!(1, "refusing to write compressed data to a terminal (use -f)\n");
                return 1;
            }
            let prefs = Prefs {
                nb_workers,
                fast_lz: args.fast_lz,
            };
            let mut stdin = std::io::stdin().lock();
            let mut stdout = std::io::stdout().lock();
            match compress_stream(&mut stdin, &mut stdout, &prefs) {
                Ok(stats) => {
                    displaylevel!(
                        2,
                        "Compressed {} bytes into {} bytes ==> {:.2}%\n",
                        stats.bytes_read,
                        stats.bytes_written,
                        ratio(&stats)
                    );
                    0
                }
                Err(e) => {
                    displaylevel!(1, "lzjody: compression failed: {e}\n");
                    1
                }
            }
        }
        OpMode::Decompress => {
            if std::io::stdin().is_terminal() {
                displaylevel!(1, "refusing to read compressed data from a terminal\n");
                return 1;
            }
            let mut stdin = std::io::stdin().lock();
            let mut stdout = std::io::stdout().lock();
            let result = if args.legacy {
                decompress_stream_legacy(&mut stdin, &mut stdout)
            } else {
                decompress_stream(&mut stdin, &mut stdout)
            };
            match result {
                Ok(stats) => {
                    displaylevel!(
                        2,
                        "Decompressed {} bytes into {} bytes ({} blocks)\n",
                        stats.bytes_read,
                        stats.bytes_written,
                        stats.blocks
                    );
                    0
                }
                Err(e) => {
                    displaylevel!(1, "lzjody: decompression failed: {e}\n");
                    1
                }
            }
        }
    }
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("lzjody: {e}");
            print_usage();
            std::process::exit(1);
        }
    };

    if args.exit_early {
        std::process::exit(0);
    }

    std::process::exit(run(args));
}
