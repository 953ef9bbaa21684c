use std::fmt::Display;
use std::path::PathBuf;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};

use hffax::DetectorKind;

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program accepts raw PCM samples in signed 16-bit (i16) format, at the given sampling --rate, and decodes any HF weatherfax pages that are present. Each page is written to the --output-dir as a PNG image.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program accepts raw PCM samples in signed 16-bit (i16) format, at the given sampling --rate, and decodes any HF weatherfax pages that are present. Each page is written to the --output-dir as a PNG image named for the time it was completed:

    fax-20240131-235900.png

Tune your receiver to upper sideband, 1.9 kHz below the station's published frequency. You can pipe in audio from a sound card with parec

    parec --channels 1 --format s16ne \
      --rate 11025 --latency-msec 500 \
        | faxdec -r 11025

or convert an audio file with sox

    sox input.wav -t raw -r 11025 -e signed -b 16 -c 1 - \
        | faxdec -r 11025 --rectify bars

A page begins when start phasing is detected. It ends at the stop tone or at the end of the input.

Pages which were received with a slightly wrong line length come out skewed. Use --rectify to straighten them. The "bars" method needs a dark calibration bar down one side of the chart. The "correlate" method does not.

To rectify a page you have already saved, give it with --image instead of providing audio.
"#;

const ADVANCED: &str = "Advanced Options";

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print NOTHING, not even the names of saved pages
    #[arg(short, long)]
    pub quiet: bool,

    /// Sampling rate (Hz)
    ///
    /// Set to the sampling rate of your audio source. Rates of
    /// 8000 Hz and up are supported.
    #[arg(short, long, default_value_t = 11025)]
    pub rate: u32,

    /// Input file (or "-" for stdin)
    ///
    /// The input must be one-channel (mono), signed 16-bit
    /// native-endian at --rate.
    #[arg(long, default_value_t = STDIN_FILE.to_string())]
    pub file: String,

    /// Directory for saved pages
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Index of cooperation
    ///
    /// The image is π × IOC pixels wide. Nearly all stations
    /// use 576.
    #[arg(long, default_value_t = 576)]
    pub ioc: u32,

    /// Rectification method for received pages
    #[arg(long, value_enum, default_value_t = Rectify::None)]
    pub rectify: Rectify,

    /// Rectify an existing image file and exit
    ///
    /// No audio is read. The rectified image is saved to the
    /// --output-dir with a "-rectified" suffix. If --rectify is
    /// "none", the "bars" method is used.
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Start phasing detector (ratio, matcher, adjusting)
    #[arg(long, default_value_t = DetectorKind::Matcher)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub detector: DetectorKind,

    /// Log the presence of fax tones, using a background thread
    #[arg(long)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub signal_detect: bool,
}

impl Args {
    /// Return true if the user requests input from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file == STDIN_FILE
    }
}

/// Page rectification method
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rectify {
    /// Save pages as received
    None,

    /// Align the calibration bar
    Bars,

    /// Align each row with the rows above it
    Correlate,
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clap() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse() {
        let args = Args::try_parse_from(["faxdec", "-r", "8000", "--rectify", "bars"])
            .expect("parse failed");
        assert_eq!(8000, args.rate);
        assert_eq!(Rectify::Bars, args.rectify);
        assert_eq!(DetectorKind::Matcher, args.detector);
        assert!(args.input_is_stdin());
        assert_eq!(None, args.image);

        let args = Args::try_parse_from(["faxdec", "--detector", "ratio", "--file", "x.raw"])
            .expect("parse failed");
        assert_eq!(DetectorKind::Ratio, args.detector);
        assert_eq!(Rectify::None, args.rectify);
        assert!(!args.input_is_stdin());

        assert!(Args::try_parse_from(["faxdec", "--detector", "bogus"]).is_err());
    }
}
