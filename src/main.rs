use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::error;

use hcmp::{process_file, Mode};

/// Compresses a file with Huffman coding, or restores a `.hcmp` file.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// File to compress, or a .hcmp file to decompress
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Where to write the result instead of next to the input
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Log every pipeline stage
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let mode = Mode::detect(&cli.path);
    match process_file(&cli.path, cli.output.as_deref()) {
        Ok(written) => match mode {
            Mode::Compress => {
                println!("Data successfully compressed into {}.", written.display())
            }
            Mode::Decompress => {
                println!("Data successfully decompressed into {}.", written.display())
            }
        },
        // failures are reported, not turned into an exit status
        Err(err) => {
            error!("{}: {err:?}", cli.path.display());
            match mode {
                Mode::Compress => println!("Compression failed: {err}"),
                Mode::Decompress => println!("Decompression failed: {err}"),
            }
        }
    }
    ExitCode::SUCCESS
}
