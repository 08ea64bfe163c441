//! Command-line interface definitions for fetchmux.
//!
//! Defines the clap command structure. Inputs that are not given as flags
//! (URL, output directory, quality, container) are prompted for
//! interactively by the download command.

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Fetchmux: split-stream video downloader",
    long_about = "Downloads the audio and video streams of an online video separately and \
                  merges them into a single file with ffmpeg, with live progress reporting."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug) logging
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Downloads a video's audio and video streams and merges them
    Download(DownloadArgs),
}

/// Container format of the merged output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Container {
    Mkv,
    Mp4,
    Webm,
}

impl Container {
    pub fn as_str(self) -> &'static str {
        match self {
            Container::Mkv => "mkv",
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct DownloadArgs {
    /// URL of the video to download (prompted for when omitted)
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Directory where the merged file is written (prompted for when omitted)
    #[arg(short = 'o', long = "output", value_name = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Video quality to download, by format id or label (e.g. "137" or "1080p")
    #[arg(long, value_name = "QUALITY")]
    pub quality: Option<String>,

    /// Audio quality to download, by format id or label (defaults to best available)
    #[arg(long, value_name = "QUALITY")]
    pub audio_quality: Option<String>,

    /// Container for the merged output file
    #[arg(long, value_enum, value_name = "CONTAINER")]
    pub container: Option<Container>,

    /// Path to the ffmpeg binary used for merging
    #[arg(long, value_name = "PATH", env = "FETCHMUX_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Path to the yt-dlp binary used for probing stream metadata
    #[arg(long, value_name = "PATH", env = "FETCHMUX_YTDLP", default_value = "yt-dlp")]
    pub ytdlp: PathBuf,

    /// Optional: Directory for log files (defaults to OUTPUT_DIR/logs)
    #[arg(short, long, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Disable the per-run log file
    #[arg(long, default_value_t = false)]
    pub no_log: bool,
}

/// Parses command-line arguments from std::env::args_os().
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parses command-line arguments from an iterator (used by tests).
pub fn parse_cli_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::parse_from(args)
}
