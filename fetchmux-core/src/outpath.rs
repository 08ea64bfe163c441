//! Output path handling: title sanitisation and collision-free naming.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Turns a media title into a filename stem.
///
/// Whitespace runs become single underscores and path-hostile characters
/// are dropped. An empty result falls back to `untitled` so the caller
/// always gets a usable stem.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    let mut last_was_separator = false;

    for ch in title.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_separator && !stem.is_empty() {
                stem.push('_');
                last_was_separator = true;
            }
            continue;
        }
        if matches!(ch, '/' | '\\' | '\0') {
            continue;
        }
        stem.push(ch);
        last_was_separator = false;
    }

    while stem.ends_with('_') {
        stem.pop();
    }

    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}

/// Resolves the final output path inside `dir`, appending `_1`, `_2`, ...
/// to the stem until the name is free.
pub fn resolve_output_path(dir: &Path, title: &str, container: &str) -> CoreResult<PathBuf> {
    if !dir.is_dir() {
        return Err(CoreError::PathError(format!(
            "output directory does not exist: {}",
            dir.display()
        )));
    }

    let stem = sanitize_title(title);
    let candidate = dir.join(format!("{stem}.{container}"));
    if !candidate.exists() {
        return Ok(candidate);
    }

    for n in 1u32.. {
        let candidate = dir.join(format!("{stem}_{n}.{container}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    unreachable!("u32 range exhausted while resolving output path")
}
