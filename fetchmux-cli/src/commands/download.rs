//! Implementation of the 'download' command.
//!
//! Resolves the run inputs (prompting for any that were not given as
//! flags), probes the media, picks the streams, and drives the core
//! download/merge pipeline with a live progress display.

use crate::cli::{Container, DownloadArgs};
use crate::error::CliResult;
use crate::logging::{get_timestamp, setup_logging};
use crate::{prompts, terminal};
use fetchmux_core::{
    check_dependency, dedup_variants, format_eta, format_mb, probe_media, resolve_output_path,
    select_audio, select_video, ConsoleDisplay, CoreError, MediaInfo, MergeSpec, PipelinePlan,
    PipelineSummary, StreamVariant,
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, LevelFilter};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Runs the download command from parsed arguments.
pub fn run_download(args: DownloadArgs, log_level: LevelFilter) -> CliResult<()> {
    let run_start = Instant::now();

    let url = resolve_url(&args)?;
    let output_dir = resolve_output_dir(&args)?;

    setup_session_logging(&args, &output_dir, log_level)?;
    debug!("Run started: {}", chrono::Local::now());

    check_dependencies(&args)?;

    let info = probe_with_spinner(&args.ytdlp, &url)?;
    let variants = dedup_variants(info.variants.clone());

    let audio = select_audio(&variants, args.audio_quality.as_deref())?;
    let video = pick_video(&variants, &args)?;
    let container = pick_container(&args)?;

    let output_path = resolve_output_path(&output_dir, &info.title, container.as_str())?;

    display_run_info(&url, &info, audio, video, &output_path);

    let summary = execute_pipeline(&args, audio, video, &output_path)?;

    display_run_summary(&summary, run_start);
    Ok(())
}

/// Returns the URL, prompting for it when none was given.
fn resolve_url(args: &DownloadArgs) -> CliResult<String> {
    match &args.url {
        Some(url) => Ok(url.clone()),
        None if std::io::stdin().is_terminal() => prompts::prompt_url(),
        None => Err(CoreError::OperationFailed(
            "no URL given and not running interactively".to_string(),
        )),
    }
}

/// Returns the output directory, which must already exist.
fn resolve_output_dir(args: &DownloadArgs) -> CliResult<PathBuf> {
    let dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        // The prompt validates existence itself.
        None if std::io::stdin().is_terminal() => return prompts::prompt_output_dir(),
        None => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
    };
    if !dir.is_dir() {
        return Err(CoreError::PathError(format!(
            "output directory {} does not exist",
            dir.display()
        )));
    }
    Ok(dir)
}

/// Initializes logging, writing a per-run log file unless disabled.
fn setup_session_logging(
    args: &DownloadArgs,
    output_dir: &Path,
    level: LevelFilter,
) -> CliResult<()> {
    let log_file = if args.no_log {
        None
    } else {
        let log_dir = args
            .log_dir
            .clone()
            .unwrap_or_else(|| output_dir.join("logs"));
        Some(log_dir.join(format!("fetchmux_run_{}.log", get_timestamp())))
    };
    setup_logging(level, log_file.as_deref())
        .map_err(|e| CoreError::OperationFailed(format!("Failed to initialize logging: {e}")))?;
    if let Some(path) = &log_file {
        debug!("Run log: {}", path.display());
    }
    Ok(())
}

/// Verifies the external tools exist before any network work.
fn check_dependencies(args: &DownloadArgs) -> CliResult<()> {
    check_dependency(&args.ffmpeg, "-version")?;
    check_dependency(&args.ytdlp, "--version")?;
    Ok(())
}

/// Probes the URL for stream metadata, spinning while yt-dlp runs.
fn probe_with_spinner(ytdlp: &Path, url: &str) -> CliResult<MediaInfo> {
    let spinner = ProgressBar::new_spinner();
    if std::io::stderr().is_terminal() {
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner} {msg}")
                .unwrap(),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
    } else {
        spinner.set_draw_target(ProgressDrawTarget::hidden());
    }
    spinner.set_message("Fetching stream information");
    let result = probe_media(ytdlp, url);
    spinner.finish_and_clear();
    result
}

/// Picks the video stream from an explicit flag, a prompt, or best available.
fn pick_video<'a>(
    variants: &'a [StreamVariant],
    args: &DownloadArgs,
) -> CliResult<&'a StreamVariant> {
    if let Some(choice) = args.quality.as_deref() {
        return select_video(variants, Some(choice));
    }
    if std::io::stdin().is_terminal() {
        let format_id = prompts::prompt_video_quality(variants)?;
        return select_video(variants, Some(&format_id));
    }
    select_video(variants, None)
}

/// Picks the output container from a flag, a prompt, or the mkv default.
fn pick_container(args: &DownloadArgs) -> CliResult<Container> {
    match args.container {
        Some(container) => Ok(container),
        None if std::io::stdin().is_terminal() => prompts::prompt_container(),
        None => Ok(Container::Mkv),
    }
}

/// Prints the resolved inputs before the download starts.
fn display_run_info(
    url: &str,
    info: &MediaInfo,
    audio: &StreamVariant,
    video: &StreamVariant,
    output_path: &Path,
) {
    terminal::print_section("Initialization");
    terminal::print_status("Source", url, false);
    terminal::print_status("Title", &info.title, false);
    if let Some(secs) = info.duration_secs {
        terminal::print_status("Duration", &format_duration(secs), false);
    }
    terminal::print_status("Audio", &describe_variant(audio), false);
    terminal::print_status("Video", &describe_variant(video), false);
    terminal::print_status("Output", &output_path.display().to_string(), false);
}

/// Builds the pipeline plan and runs it to completion on a fresh runtime.
fn execute_pipeline(
    args: &DownloadArgs,
    audio: &StreamVariant,
    video: &StreamVariant,
    output_path: &Path,
) -> CliResult<PipelineSummary> {
    let plan = PipelinePlan {
        audio_url: audio.url.clone(),
        video_url: video.url.clone(),
        merge: MergeSpec::new(&args.ffmpeg, output_path),
    };
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CoreError::OperationFailed(format!("Failed to start async runtime: {e}")))?;
    let mut display = ConsoleDisplay::new();
    runtime.block_on(fetchmux_core::pipeline::run(plan, &mut display))
}

/// Prints the result section after a successful merge.
fn display_run_summary(summary: &PipelineSummary, run_start: Instant) {
    terminal::print_section("Download complete");
    terminal::print_success(&format!("Wrote {}", summary.output_path.display()));
    terminal::print_status(
        "Audio size",
        &format!("{} MB", format_mb(summary.audio_bytes)),
        false,
    );
    terminal::print_status(
        "Video size",
        &format!("{} MB", format_mb(summary.video_bytes)),
        false,
    );
    terminal::print_status("Download time", &format_eta(Some(summary.elapsed)), false);
    terminal::print_status("Total time", &format_eta(Some(run_start.elapsed())), true);
}

fn describe_variant(variant: &StreamVariant) -> String {
    match variant.filesize {
        Some(bytes) => format!(
            "{} ({}, {} MB)",
            variant.quality_label,
            variant.container,
            format_mb(bytes)
        ),
        None => format!("{} ({})", variant.quality_label, variant.container),
    }
}

/// Formats a duration in seconds as hh:mm:ss.
fn format_duration(secs: f64) -> String {
    let total = secs.round() as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
