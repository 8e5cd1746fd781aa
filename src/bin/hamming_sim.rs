use clap::Parser;
use hamming_channel::cs::ecc::payload::{
    FileSink, FileSource, Payload, PayloadSink, PayloadSource, PlaceholderSource,
};
use hamming_channel::cs::ecc::pipeline::{Pipeline, PipelineConfig};
use hamming_channel::{Error, Result};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Send a file through a Hamming(7,4)-coded binary symmetric channel and
/// write the corrected and uncorrected reconstructions.
#[derive(Parser, Debug)]
#[command(name = "hamming_sim", version, about)]
struct Args {
    /// Payload file; decodable images keep their dimensions, anything else is raw bytes
    #[arg(long)]
    input: Option<PathBuf>,

    /// Directory receiving original, corrected and uncorrected outputs
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Probability that the channel flips any given bit
    #[arg(long, default_value_t = 0.01)]
    error_rate: f64,

    /// Channel seed for reproducible runs
    #[arg(long, env = "HAMMING_SEED")]
    seed: Option<u64>,

    /// Width of the placeholder image used when no input is available
    #[arg(long, default_value_t = 256)]
    width: usize,

    /// Height of the placeholder image used when no input is available
    #[arg(long, default_value_t = 256)]
    height: usize,

    /// Decode blocks on all cores
    #[arg(long)]
    parallel: bool,
}

fn load_payload(args: &Args) -> Result<Payload> {
    let mut placeholder = PlaceholderSource::new(args.width, args.height);
    let Some(path) = &args.input else {
        info!("no input given, using a {}x{} placeholder", args.width, args.height);
        return placeholder.load();
    };

    match FileSource::new(path).load() {
        Err(Error::PayloadNotFound(missing)) => {
            warn!(
                "{} not found, using a {}x{} placeholder",
                missing.display(),
                args.width,
                args.height
            );
            placeholder.load()
        }
        other => other,
    }
}

fn run(args: &Args) -> Result<()> {
    let config = PipelineConfig {
        error_rate: args.error_rate,
        seed: args.seed,
        parallel: args.parallel,
    };
    config.validate()?;

    let payload = load_payload(args)?;
    info!(
        "transmitting {} bytes at error rate {}",
        payload.len(),
        config.error_rate
    );

    let output = Pipeline::from_config(&config)?.run(&payload, config.error_rate)?;
    let stats = output.stats;
    info!(
        "channel: {} / {} bits flipped ({:.4}%)",
        stats.flipped_bits,
        stats.total_bits,
        stats.bit_error_rate() * 100.0
    );
    info!(
        "blocks: {} total, {} corrupted, {} with multiple errors",
        stats.blocks, stats.corrupted_blocks, stats.uncorrectable_blocks
    );

    let report = output.report(&payload);
    info!(
        "bytes wrong: {} corrected, {} uncorrected (of {}), {} blocks repaired",
        report.corrected_byte_errors,
        report.uncorrected_byte_errors,
        report.total_bytes,
        output.corrections
    );

    let mut sink = FileSink::new(&args.output_dir);
    for (name, result) in [
        ("original", &payload),
        ("corrected", &output.corrected),
        ("uncorrected", &output.uncorrected),
    ] {
        let path = sink.store(name, result)?;
        info!("wrote {}", path.display());
    }

    Ok(())
}

/// Exit status for rejected parameters or streams, distinct from I/O failures
const EXIT_INVALID: u8 = 2;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_domain() => {
            error!("{}", e);
            ExitCode::from(EXIT_INVALID)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
