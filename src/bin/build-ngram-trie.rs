use std::fs::File;
use std::io::BufWriter;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::info;

use ngram_trie::Trie;

/// Builds a bit-packed n-gram trie from an ARPA-format language model and
/// writes it out as a binary snapshot.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Highest n-gram order declared in the ARPA file.
    #[arg(short = 'n', long)]
    order: u16,

    /// Path to the ARPA-format input file.
    arpa_file: PathBuf,

    /// Path the binary snapshot is written to.
    out_file: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("build-ngram-trie: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), ngram_trie::Error> {
    let source = open_arpa(&args.arpa_file)?;

    let t0 = Instant::now();
    let trie = Trie::build_from_arpa(args.order, source)?;
    info!(elapsed = ?t0.elapsed(), order = args.order, "trie built");

    let t1 = Instant::now();
    let out = BufWriter::new(File::create(&args.out_file)?);
    trie.save(out)?;
    info!(elapsed = ?t1.elapsed(), path = ?args.out_file, "snapshot written");

    Ok(())
}

fn open_arpa(path: &PathBuf) -> Result<impl BufRead, ngram_trie::Error> {
    Ok(BufReader::new(File::open(path)?))
}
