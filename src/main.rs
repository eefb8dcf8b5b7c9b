use clap::Parser;
use get_blunted::gfa::write_gfa;
use get_blunted::provenance::write_provenance;
use get_blunted::Bluntifier;
use rayon::ThreadPoolBuilder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::num::NonZeroUsize;

/// Transform a GFA with overlapped links into an equivalent blunt graph.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Input GFA whose L lines carry CIGAR overlaps
    #[clap(value_parser)]
    gfa: String,

    /// Write a provenance table mapping each output node to the input
    /// interval(s) it derives from
    #[clap(short = 'p', long, value_parser)]
    provenance: Option<String>,

    /// Number of threads for parallel processing
    #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::new(1).unwrap())]
    num_threads: NonZeroUsize,
}

fn run(args: &Args) -> get_blunted::Result<()> {
    let file = File::open(&args.gfa)?;
    let mut bluntifier = Bluntifier::from_reader(BufReader::new(file))?;
    bluntifier.bluntify()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_gfa(&bluntifier.graph, &mut out)?;
    out.flush()?;

    if let Some(path) = &args.provenance {
        let mut file = BufWriter::new(File::create(path)?);
        write_provenance(&bluntifier.provenance, &mut file)?;
        file.flush()?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    ThreadPoolBuilder::new()
        .num_threads(args.num_threads.into())
        .build_global()
        .unwrap();

    if let Err(error) = run(&args) {
        eprintln!("error: {}", error);
        std::process::exit(1);
    }
}
