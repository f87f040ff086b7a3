// ABOUTME: Document model for the mdslides application
// ABOUTME: One Markdown source with its destination, frontmatter, effective configuration and body

use crate::cascade::EffectiveConfig;
use crate::errors::{Result, SlidesError};
use gray_matter::engine::YAML;
use gray_matter::Matter;
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static EMOJI_SHORTCODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-zA-Z0-9_+\-]+):").expect("valid emoji shortcode regex"));

/// A discovered Markdown file, ready to be rendered as a slideshow
#[derive(Debug, Clone)]
pub struct Document {
    /// Absolute path of the Markdown source inside the input root
    pub source_path: PathBuf,
    /// Source relative to the input root, with `/` separators
    pub relative_source: String,
    /// Absolute path of the rendered page inside the output root
    pub destination_path: PathBuf,
    /// Destination relative to the output root, with `/` separators
    pub relative_destination: String,
    /// Metadata from the leading frontmatter block
    pub frontmatter: Mapping,
    /// Global configuration with the frontmatter overrides applied and assets resolved
    pub config: EffectiveConfig,
    /// Markdown without frontmatter; links are rewritten in place
    pub body: String,
}

impl Document {
    /// Title shown in the navigation and the page title.
    ///
    /// Prefers `slides.title`, then a top-level `title` frontmatter key, then the file stem.
    pub fn title(&self) -> String {
        if let Some(title) = &self.config.title {
            return title.clone();
        }
        if let Some(Value::String(title)) = self.frontmatter.get("title") {
            return title.clone();
        }
        self.source_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn source_dir(&self) -> &Path {
        self.source_path.parent().unwrap_or(Path::new("."))
    }
}

/// A Markdown source split into frontmatter and body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSource {
    pub frontmatter: Mapping,
    pub body: String,
}

/// Split a Markdown source into its YAML frontmatter and body.
pub fn parse_source(path: &Path, content: &str) -> Result<ParsedSource> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let matter = Matter::<YAML>::new();
    let parsed = matter
        .parse::<Value>(content)
        .map_err(|e| SlidesError::FrontmatterError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let frontmatter = match parsed.data {
        None | Some(Value::Null) => Mapping::new(),
        Some(Value::Mapping(mapping)) => mapping,
        Some(_) => {
            return Err(SlidesError::FrontmatterError {
                path: path.to_path_buf(),
                message: "frontmatter must be a mapping".to_string(),
            })
        }
    };

    Ok(ParsedSource {
        frontmatter,
        body: parsed.content,
    })
}

/// Replace `:shortcode:` aliases with the emoji they name; unknown codes are kept.
pub fn emojize(text: &str) -> String {
    EMOJI_SHORTCODE_REGEX
        .replace_all(text, |caps: &Captures| match emojis::get_by_shortcode(&caps[1]) {
            Some(emoji) => emoji.as_str().to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
