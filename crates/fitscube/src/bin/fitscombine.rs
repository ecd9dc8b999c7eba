use std::path::PathBuf;
use std::process;

use clap::Parser;
use fitscube::{combine, ClipRange, CombineOptions};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Concatenate FITS cubes along the third (frame) axis.
///
/// Inputs are ordered by their frame coordinate, checked for matching
/// geometry and scaling, and written to OUTPUT with NAXIS3 set to the total
/// number of frames.
#[derive(Parser, Debug)]
#[command(name = "fitscombine", version)]
struct Cli {
    /// File to create. Must not exist.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Cubes to concatenate, in any order.
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Lower bound kept when clipping float32 data.
    #[arg(long, default_value_t = -1000.0, allow_negative_numbers = true)]
    clip_min: f32,

    /// Upper bound kept when clipping float32 data.
    #[arg(long, default_value_t = 1000.0, allow_negative_numbers = true)]
    clip_max: f32,

    /// Copy samples unchanged.
    #[arg(long, conflicts_with_all = ["clip_min", "clip_max"])]
    no_clip: bool,

    /// Streaming buffer size in MiB.
    #[arg(long, value_name = "MIB", default_value_t = 512)]
    buffer_mib: usize,

    /// Leave a partially written output behind on failure.
    #[arg(long)]
    keep_partial: bool,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Less log output (-q warnings only, -qq errors only).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,
}

impl Cli {
    fn default_level(&self) -> &'static str {
        match (self.verbose, self.quiet) {
            (0, 0) => "info",
            (1, _) => "debug",
            (v, _) if v > 1 => "trace",
            (_, 1) => "warn",
            _ => "error",
        }
    }

    fn options(&self) -> CombineOptions {
        let clip = if self.no_clip {
            None
        } else {
            Some(ClipRange::new(self.clip_min, self.clip_max))
        };
        CombineOptions::new()
            .with_clip(clip)
            .with_buffer_size(self.buffer_mib.saturating_mul(1024 * 1024))
            .keep_partial_output(self.keep_partial)
    }
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.default_level());

    if cli.output.exists() {
        error!("output file {} already exists", cli.output.display());
        process::exit(-1);
    }

    match combine(&cli.inputs, &cli.output, &cli.options()) {
        Ok(report) => {
            if !report.warnings.is_empty() {
                tracing::info!("{} continuity warning(s)", report.warnings.len());
            }
        }
        Err(e) => {
            error!("{e}");
            process::exit(-1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fitscombine").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn positional_output_then_inputs() {
        let cli = parse(&["out.fits", "a.fits", "b.fits"]);
        assert_eq!(cli.output, PathBuf::from("out.fits"));
        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.default_level(), "info");
    }

    #[test]
    fn requires_an_input() {
        assert!(Cli::try_parse_from(["fitscombine", "out.fits"]).is_err());
    }

    #[test]
    fn default_options() {
        assert_eq!(parse(&["o", "a"]).options(), CombineOptions::default());
    }

    #[test]
    fn clip_flags() {
        let o = parse(&["--clip-min", "-5", "--clip-max", "7.5", "o", "a"]).options();
        assert_eq!(o.clip(), Some(ClipRange::new(-5.0, 7.5)));
        assert_eq!(parse(&["--no-clip", "o", "a"]).options().clip(), None);
    }

    #[test]
    fn buffer_and_partial_flags() {
        let o = parse(&["--buffer-mib", "2", "--keep-partial", "o", "a"]).options();
        assert_eq!(o.buffer_size(), 2 * 1024 * 1024);
        assert!(o.keeps_partial_output());
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(parse(&["-v", "o", "a"]).default_level(), "debug");
        assert_eq!(parse(&["-vv", "o", "a"]).default_level(), "trace");
        assert_eq!(parse(&["-q", "o", "a"]).default_level(), "warn");
        assert_eq!(parse(&["-qq", "o", "a"]).default_level(), "error");
    }
}
