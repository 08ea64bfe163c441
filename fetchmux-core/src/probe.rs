//! Media probing via yt-dlp.
//!
//! `probe_media` shells out to `yt-dlp -J` and reduces its format list to
//! the variants this tool can use: each entry needs a direct URL and at
//! least one of an audio or video track. Selection helpers pick the best
//! defaults and resolve user choices against the deduplicated list.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use log::debug;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

/// Top-level document produced by `yt-dlp -J`.
#[derive(Debug, Deserialize)]
struct ProbeDocument {
    title: String,
    duration: Option<f64>,
    formats: Vec<ProbeFormat>,
}

/// One entry of the probe's format list. Codec fields use the string
/// `"none"` for an absent track.
#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_id: String,
    url: Option<String>,
    ext: Option<String>,
    format_note: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    abr: Option<f64>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
}

/// A downloadable stream variant, classified by track content.
#[derive(Debug, Clone)]
pub struct StreamVariant {
    pub format_id: String,
    pub quality_label: String,
    pub container: String,
    pub has_video: bool,
    pub has_audio: bool,
    pub height: Option<u32>,
    pub audio_bitrate: Option<f64>,
    pub filesize: Option<u64>,
    pub url: String,
}

/// Probe result: the media's title plus its usable variants.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub title: String,
    pub duration_secs: Option<f64>,
    pub variants: Vec<StreamVariant>,
}

/// Verifies that an external program is on the PATH and answers its
/// version flag.
pub fn check_dependency(program: &Path, version_arg: &str) -> CoreResult<()> {
    let output = Command::new(program).arg(version_arg).output();
    match output {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(line) = stdout.lines().next() {
                debug!("found {}: {}", program.display(), line.trim());
            }
            Ok(())
        }
        Ok(_) => Err(CoreError::OperationFailed(format!(
            "{} failed its version check",
            program.display()
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(CoreError::DependencyNotFound(program.display().to_string()))
        }
        Err(e) => Err(CoreError::CommandStart(program.display().to_string(), e)),
    }
}

/// Runs `yt-dlp -J` against `url` and parses the result.
pub fn probe_media(ytdlp: &Path, url: &str) -> CoreResult<MediaInfo> {
    debug!("probing {url} with {}", ytdlp.display());
    let output = Command::new(ytdlp)
        .arg("-J")
        .arg("--no-warnings")
        .arg(url)
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => CoreError::DependencyNotFound(ytdlp.display().to_string()),
            _ => CoreError::CommandStart(ytdlp.display().to_string(), e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().last().unwrap_or("no error output").trim();
        return Err(CoreError::ProbeFailed(format!(
            "probe of {url} exited with {}: {detail}",
            output.status
        )));
    }

    parse_probe_document(&String::from_utf8_lossy(&output.stdout))
}

/// Parses a `yt-dlp -J` document into `MediaInfo`.
pub fn parse_probe_document(json: &str) -> CoreResult<MediaInfo> {
    let document: ProbeDocument = serde_json::from_str(json)?;
    let variants: Vec<StreamVariant> = document
        .formats
        .into_iter()
        .filter_map(variant_from_format)
        .collect();
    debug!(
        "probe found {} usable variants for \"{}\"",
        variants.len(),
        document.title
    );
    Ok(MediaInfo {
        title: document.title,
        duration_secs: document.duration,
        variants,
    })
}

fn variant_from_format(format: ProbeFormat) -> Option<StreamVariant> {
    let url = format.url?;
    let has_video = format.vcodec.as_deref().is_some_and(|c| c != "none");
    let has_audio = format.acodec.as_deref().is_some_and(|c| c != "none");
    if !has_video && !has_audio {
        // Storyboard and other metadata-only entries.
        return None;
    }

    let quality_label = match (&format.format_note, format.height, format.abr) {
        (Some(note), _, _) if !note.is_empty() => note.clone(),
        (_, Some(height), _) => format!("{height}p"),
        (_, _, Some(abr)) => format!("{abr:.0}kbps"),
        _ => "unknown".to_string(),
    };

    Some(StreamVariant {
        format_id: format.format_id,
        quality_label,
        container: format.ext.unwrap_or_else(|| "unknown".to_string()),
        has_video,
        has_audio,
        height: format.height,
        audio_bitrate: format.abr,
        filesize: format.filesize.or(format.filesize_approx),
        url,
    })
}

/// Drops variants whose `(quality_label, container)` pair was already seen.
/// Probe output commonly lists the same rendition under several codecs;
/// one entry per pair keeps selection prompts readable.
#[must_use]
pub fn dedup_variants(variants: Vec<StreamVariant>) -> Vec<StreamVariant> {
    let mut seen = HashSet::new();
    variants
        .into_iter()
        .filter(|v| seen.insert((v.quality_label.clone(), v.container.clone())))
        .collect()
}

/// Picks the audio variant: an explicit choice by format id or quality
/// label, otherwise the audio-only variant with the highest bitrate.
pub fn select_audio<'a>(
    variants: &'a [StreamVariant],
    choice: Option<&str>,
) -> CoreResult<&'a StreamVariant> {
    if let Some(choice) = choice {
        return variants
            .iter()
            .filter(|v| v.has_audio)
            .find(|v| v.format_id == choice || v.quality_label == choice)
            .ok_or_else(|| CoreError::NoMatchingVariant(choice.to_string()));
    }

    let audio_only = variants
        .iter()
        .filter(|v| v.has_audio && !v.has_video)
        .max_by_key(|v| audio_rank(v));
    audio_only
        .or_else(|| variants.iter().filter(|v| v.has_audio).max_by_key(|v| audio_rank(v)))
        .ok_or_else(|| CoreError::NoMatchingVariant("no audio stream available".to_string()))
}

/// Picks the video variant: an explicit choice by format id or quality
/// label, otherwise the variant with the greatest height.
pub fn select_video<'a>(
    variants: &'a [StreamVariant],
    choice: Option<&str>,
) -> CoreResult<&'a StreamVariant> {
    if let Some(choice) = choice {
        return variants
            .iter()
            .filter(|v| v.has_video)
            .find(|v| v.format_id == choice || v.quality_label == choice)
            .ok_or_else(|| CoreError::NoMatchingVariant(choice.to_string()));
    }

    variants
        .iter()
        .filter(|v| v.has_video)
        .max_by_key(|v| (v.height.unwrap_or(0), v.filesize.unwrap_or(0)))
        .ok_or_else(|| CoreError::NoMatchingVariant("no video stream available".to_string()))
}

fn audio_rank(variant: &StreamVariant) -> (u64, u64) {
    let milli_bitrate = variant
        .audio_bitrate
        .map(|abr| (abr * 1000.0) as u64)
        .unwrap_or(0);
    (milli_bitrate, variant.filesize.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "title": "Test Video",
        "duration": 212.5,
        "formats": [
            {"format_id": "sb0", "url": "http://x/sb", "ext": "mhtml",
             "vcodec": "none", "acodec": "none"},
            {"format_id": "140", "url": "http://x/140", "ext": "m4a",
             "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5,
             "filesize": 3400000},
            {"format_id": "251", "url": "http://x/251", "ext": "webm",
             "vcodec": "none", "acodec": "opus", "abr": 160.0,
             "filesize": 4000000},
            {"format_id": "137", "url": "http://x/137", "ext": "mp4",
             "vcodec": "avc1.640028", "acodec": "none", "height": 1080,
             "format_note": "1080p", "filesize": 90000000},
            {"format_id": "399", "url": "http://x/399", "ext": "mp4",
             "vcodec": "av01.0.08M.08", "acodec": "none", "height": 1080,
             "format_note": "1080p", "filesize": 70000000},
            {"format_id": "248", "url": "http://x/248", "ext": "webm",
             "vcodec": "vp9", "acodec": "none", "height": 1080,
             "format_note": "1080p", "filesize": 80000000},
            {"format_id": "22", "url": "http://x/22", "ext": "mp4",
             "vcodec": "avc1.64001F", "acodec": "mp4a.40.2", "height": 720,
             "format_note": "720p", "abr": 192.0},
            {"format_id": "drm", "ext": "mp4", "vcodec": "avc1",
             "acodec": "none", "height": 2160}
        ]
    }"#;

    fn probe() -> MediaInfo {
        parse_probe_document(PROBE_JSON).unwrap()
    }

    #[test]
    fn test_parse_skips_unusable_formats() {
        let info = probe();
        assert_eq!(info.title, "Test Video");
        assert_eq!(info.duration_secs, Some(212.5));
        // The storyboard and the url-less entry are gone.
        assert_eq!(info.variants.len(), 6);
        assert!(info.variants.iter().all(|v| !v.format_id.starts_with("sb")));
        assert!(info.variants.iter().all(|v| v.format_id != "drm"));
    }

    #[test]
    fn test_classification() {
        let info = probe();
        let audio = info.variants.iter().find(|v| v.format_id == "140").unwrap();
        assert!(audio.has_audio && !audio.has_video);

        let video = info.variants.iter().find(|v| v.format_id == "137").unwrap();
        assert!(video.has_video && !video.has_audio);
        assert_eq!(video.quality_label, "1080p");
        assert_eq!(video.container, "mp4");

        let progressive = info.variants.iter().find(|v| v.format_id == "22").unwrap();
        assert!(progressive.has_video && progressive.has_audio);
    }

    #[test]
    fn test_quality_label_fallbacks() {
        let json = r#"{
            "title": "t",
            "formats": [
                {"format_id": "a", "url": "http://x/a", "ext": "mp4",
                 "vcodec": "avc1", "acodec": "none", "height": 480},
                {"format_id": "b", "url": "http://x/b", "ext": "m4a",
                 "vcodec": "none", "acodec": "mp4a", "abr": 128.0},
                {"format_id": "c", "url": "http://x/c", "ext": "m4a",
                 "vcodec": "none", "acodec": "mp4a"}
            ]
        }"#;
        let info = parse_probe_document(json).unwrap();
        assert_eq!(info.variants[0].quality_label, "480p");
        assert_eq!(info.variants[1].quality_label, "128kbps");
        assert_eq!(info.variants[2].quality_label, "unknown");
    }

    #[test]
    fn test_dedup_by_label_and_container() {
        let info = probe();
        let deduped = dedup_variants(info.variants);
        // 137 and 399 share ("1080p", "mp4"); only the first survives.
        assert!(deduped.iter().any(|v| v.format_id == "137"));
        assert!(!deduped.iter().any(|v| v.format_id == "399"));
        // 248 differs in container, so it stays.
        assert!(deduped.iter().any(|v| v.format_id == "248"));
    }

    #[test]
    fn test_select_audio_default_prefers_highest_bitrate() {
        let info = probe();
        let audio = select_audio(&info.variants, None).unwrap();
        assert_eq!(audio.format_id, "251");
    }

    #[test]
    fn test_select_audio_falls_back_to_progressive() {
        let json = r#"{
            "title": "t",
            "formats": [
                {"format_id": "22", "url": "http://x/22", "ext": "mp4",
                 "vcodec": "avc1", "acodec": "mp4a", "height": 720,
                 "abr": 192.0}
            ]
        }"#;
        let info = parse_probe_document(json).unwrap();
        let audio = select_audio(&info.variants, None).unwrap();
        assert_eq!(audio.format_id, "22");
    }

    #[test]
    fn test_select_video_default_prefers_height_then_size() {
        let info = probe();
        let video = select_video(&info.variants, None).unwrap();
        // Three 1080p variants; the largest file wins the tie.
        assert_eq!(video.format_id, "137");
    }

    #[test]
    fn test_select_by_explicit_choice() {
        let info = probe();
        assert_eq!(
            select_video(&info.variants, Some("248")).unwrap().format_id,
            "248"
        );
        assert_eq!(
            select_video(&info.variants, Some("720p")).unwrap().format_id,
            "22"
        );
        assert_eq!(
            select_audio(&info.variants, Some("140")).unwrap().format_id,
            "140"
        );
    }

    #[test]
    fn test_select_no_match() {
        let info = probe();
        let err = select_video(&info.variants, Some("4320p")).unwrap_err();
        assert!(matches!(err, CoreError::NoMatchingVariant(label) if label == "4320p"));

        let empty: Vec<StreamVariant> = Vec::new();
        assert!(matches!(
            select_audio(&empty, None).unwrap_err(),
            CoreError::NoMatchingVariant(_)
        ));
    }
}
