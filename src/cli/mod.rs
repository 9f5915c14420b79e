//! Command-line surface: argument parsing and display machinery.

pub mod args;
pub mod constants;

pub use args::{parse_args, parse_args_from, OpMode, ParsedArgs};
