//! Interactive prompts for run inputs that were not given as flags.

use crate::cli::Container;
use crate::error::CliResult;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use fetchmux_core::{format_mb, CoreError, StreamVariant};
use std::path::{Path, PathBuf};

fn prompt_failed(e: dialoguer::Error) -> CoreError {
    CoreError::OperationFailed(format!("Interactive prompt failed: {e}"))
}

/// Asks for the video URL, rejecting anything that does not parse as one.
pub fn prompt_url() -> CliResult<String> {
    let url: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Video URL")
        .validate_with(|input: &String| -> Result<(), String> {
            url::Url::parse(input)
                .map(|_| ())
                .map_err(|e| format!("not a valid URL: {e}"))
        })
        .interact_text()
        .map_err(prompt_failed)?;
    Ok(url)
}

/// Asks for the output directory, defaulting to the user's home directory.
pub fn prompt_output_dir() -> CliResult<PathBuf> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let dir: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Output directory")
        .default(home.display().to_string())
        .validate_with(|input: &String| -> Result<(), String> {
            if Path::new(input).is_dir() {
                Ok(())
            } else {
                Err(format!("{input} is not an existing directory"))
            }
        })
        .interact_text()
        .map_err(prompt_failed)?;
    Ok(PathBuf::from(dir))
}

/// Asks which video quality to download and returns the chosen format id.
///
/// The list is ordered best-first so accepting the default picks the
/// highest resolution.
pub fn prompt_video_quality(variants: &[StreamVariant]) -> CliResult<String> {
    let choices = sorted_video_variants(variants);
    if choices.is_empty() {
        return Err(CoreError::NoMatchingVariant(
            "no video stream available".to_string(),
        ));
    }
    let items = variant_labels(&choices);
    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Video quality")
        .items(&items)
        .default(0)
        .interact()
        .map_err(prompt_failed)?;
    Ok(choices[index].format_id.clone())
}

/// Asks for the container of the merged file.
pub fn prompt_container() -> CliResult<Container> {
    let choices = [Container::Mkv, Container::Mp4, Container::Webm];
    let items: Vec<&str> = choices.iter().map(|c| c.as_str()).collect();
    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Output container")
        .items(&items)
        .default(0)
        .interact()
        .map_err(prompt_failed)?;
    Ok(choices[index])
}

fn sorted_video_variants(variants: &[StreamVariant]) -> Vec<&StreamVariant> {
    let mut choices: Vec<&StreamVariant> = variants.iter().filter(|v| v.has_video).collect();
    choices.sort_by(|a, b| b.height.cmp(&a.height).then(b.filesize.cmp(&a.filesize)));
    choices
}

fn variant_labels(choices: &[&StreamVariant]) -> Vec<String> {
    choices
        .iter()
        .map(|v| {
            let size = match v.filesize {
                Some(bytes) => format!("{} MB", format_mb(bytes)),
                None => "size unknown".to_string(),
            };
            format!("{} ({}, {})", v.quality_label, v.container, size)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(id: &str, height: Option<u32>, has_video: bool, filesize: Option<u64>) -> StreamVariant {
        StreamVariant {
            format_id: id.to_string(),
            quality_label: height.map_or("audio only".to_string(), |h| format!("{h}p")),
            container: "mp4".to_string(),
            has_video,
            has_audio: !has_video,
            height,
            audio_bitrate: None,
            filesize,
            url: format!("https://cdn.example/{id}"),
        }
    }

    #[test]
    fn test_video_choices_sorted_best_first() {
        let variants = vec![
            variant("160", Some(144), true, Some(1_000)),
            variant("137", Some(1080), true, Some(9_000)),
            variant("140", None, false, Some(2_000)),
            variant("136", Some(720), true, None),
        ];
        let choices = sorted_video_variants(&variants);
        let ids: Vec<&str> = choices.iter().map(|v| v.format_id.as_str()).collect();
        assert_eq!(ids, vec!["137", "136", "160"]);
    }

    #[test]
    fn test_variant_labels_include_size_when_known() {
        let variants = vec![
            variant("137", Some(1080), true, Some(10 * 1024 * 1024)),
            variant("136", Some(720), true, None),
        ];
        let choices = sorted_video_variants(&variants);
        let labels = variant_labels(&choices);
        assert_eq!(labels[0], "1080p (mp4, 10.00 MB)");
        assert_eq!(labels[1], "720p (mp4, size unknown)");
    }
}
