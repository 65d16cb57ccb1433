//! # dmap
//!
//! Command line tools for SuperDARN DMAP files.
//!
//! ```text
//! dmap check   <input> [--file-type T] [--no-validate] [--json]
//! dmap dump    <input> [--record N]
//! dmap convert <input> <output> [--file-type T] [--no-validate]
//! dmap encode  <input.json> <output> [--file-type T] [--types F] [--no-validate]
//! ```
//!
//! The file type (`iqdat`, `rawacf`, `fitacf`, `grid`, `map`) is taken from
//! `--file-type` or inferred from the file name. When it is known, records
//! are checked against that type's field dictionary unless `--no-validate`
//! is given.
//!
//! Logging goes to stderr and is controlled with `-v`/`-q` or `RUST_LOG`.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dmap_core::FileType;

mod commands;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(name = "dmap", version, about = "Check, dump and convert SuperDARN DMAP files")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Decode a file and report its record count
    Check {
        input: PathBuf,

        /// File type to validate against (default: inferred from the name)
        #[arg(short = 't', long)]
        file_type: Option<FileType>,

        /// Skip the field dictionary check
        #[arg(long, default_value_t = false)]
        no_validate: bool,

        /// Print the summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print records as JSON, one object per line
    Dump {
        input: PathBuf,

        /// Only print the record with this index
        #[arg(short, long)]
        record: Option<usize>,
    },

    /// Decode, validate and re-encode a file
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// File type to validate against (default: inferred from the input name)
        #[arg(short = 't', long)]
        file_type: Option<FileType>,

        /// Skip the field dictionary check
        #[arg(long, default_value_t = false)]
        no_validate: bool,
    },

    /// Build a DMAP file from a JSON list of records
    Encode {
        input: PathBuf,
        output: PathBuf,

        /// File type whose dictionary types the fields (default: inferred from the output name)
        #[arg(short = 't', long)]
        file_type: Option<FileType>,

        /// JSON object of field name to type name, e.g. {"cp": "short"}
        #[arg(long)]
        types: Option<PathBuf>,

        /// Skip the field dictionary check
        #[arg(long, default_value_t = false)]
        no_validate: bool,
    },
}

/// Run one command, writing its normal output to `out`
pub fn run(args: &Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    match &args.command {
        Command::Check {
            input,
            file_type,
            no_validate,
            json,
        } => commands::check(input, *file_type, !no_validate, *json, out),
        Command::Dump { input, record } => commands::dump(input, *record, out),
        Command::Convert {
            input,
            output,
            file_type,
            no_validate,
        } => commands::convert(input, output, *file_type, !no_validate, out),
        Command::Encode {
            input,
            output,
            file_type,
            types,
            no_validate,
        } => commands::encode(input, output, *file_type, types.as_deref(), !no_validate, out),
    }
}
