// ABOUTME: Utility functions for the mdslides application
// ABOUTME: Provides path arithmetic, validation and filesystem helpers shared by the pipeline

use crate::errors::{Result, SlidesError};
use log::debug;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Suffix of Markdown source files
pub const MARKDOWN_EXTENSION: &str = "md";

/// Suffix of rendered slideshow files
pub const OUTPUT_EXTENSION: &str = "html";

/// Characters escaped when a relative path becomes an href
const HREF_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Ensure a directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    } else if !path.is_dir() {
        return Err(SlidesError::ValidationError(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure a file's parent directory exists
pub fn ensure_parent_directory_exists(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        ensure_directory_exists(parent)?;
    }
    Ok(())
}

/// Make a path absolute without touching the filesystem, then normalize it.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    Ok(normalize_path(&std::path::absolute(path)?))
}

/// Lexically resolve `.` and `..` components.
///
/// `..` never climbs above the root (or above the first component of a relative path).
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Render a relative path with forward slashes, as used in URLs and node identifiers.
pub fn path_to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Compute the URL path leading from `from_dir` to `target`.
///
/// Both paths must be absolute and normalized. Walks up with `..` for every
/// component of `from_dir` that is not shared with `target`.
pub fn relative_href(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component> = from_dir.components().collect();
    let to: Vec<Component> = target.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat("..".to_string()).take(from.len() - common));
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Percent-encode a `/`-separated relative path for use in an href.
pub fn encode_href(path: &str) -> String {
    utf8_percent_encode(path, HREF_ESCAPES).to_string()
}

/// Whether the path has the Markdown suffix (case-insensitive)
pub fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(MARKDOWN_EXTENSION))
        .unwrap_or(false)
}

/// Whether a URL path string ends with the Markdown suffix (case-insensitive)
pub fn has_markdown_suffix(location: &str) -> bool {
    let suffix_len = MARKDOWN_EXTENSION.len() + 1;
    location.len() > suffix_len
        && location.is_char_boundary(location.len() - suffix_len)
        && location[location.len() - suffix_len..].eq_ignore_ascii_case(".md")
}

/// Replace a trailing Markdown suffix in a URL path string with the output suffix.
pub fn replace_markdown_suffix(location: &str) -> String {
    if has_markdown_suffix(location) {
        let stem = &location[..location.len() - (MARKDOWN_EXTENSION.len() + 1)];
        format!("{}.{}", stem, OUTPUT_EXTENSION)
    } else {
        location.to_string()
    }
}

/// Delete the directory if it exists and recreate it empty
pub fn recreate_directory(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
        debug!("Output directory already exists, deleted {:?}", path);
    }
    fs::create_dir_all(path)?;
    debug!("Output directory created {:?}", path);
    Ok(())
}

/// Write a file, creating parent directories as needed
pub fn create_or_overwrite_file(destination: &Path, content: &str) -> Result<()> {
    let is_overwrite = destination.exists();

    ensure_parent_directory_exists(destination)?;
    fs::write(destination, content)?;

    let action = if is_overwrite { "Overwritten" } else { "Created" };
    debug!("{} file {:?}", action, destination);
    Ok(())
}

/// Copy a single file, creating parent directories as needed
pub fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    ensure_parent_directory_exists(destination)?;
    fs::copy(source, destination)?;
    debug!("Copied file {:?} to {:?}", source, destination);
    Ok(())
}

/// Recursively copy a directory, skipping files for which `skip` returns true.
///
/// `skip` receives the path relative to `source`.
pub fn copy_directory<F>(source: &Path, destination: &Path, skip: F) -> Result<usize>
where
    F: Fn(&Path) -> bool,
{
    let mut copied = 0;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| SlidesError::ValidationError(e.to_string()))?;
        if skip(relative) {
            continue;
        }
        copy_file(entry.path(), &destination.join(relative))?;
        copied += 1;
    }
    debug!(
        "Copied directory {:?} to {:?} ({} files)",
        source, destination, copied
    );
    Ok(copied)
}
