// ABOUTME: Link resolver for the mdslides application
// ABOUTME: Finds relative references in a slideshow, checks their targets and rewrites .md links to .html

use crate::document::Document;
use crate::errors::{Result, SlidesError};
use crate::resources::{url_type, UrlType};
use crate::utils;
use comrak::nodes::NodeValue;
use comrak::{markdown_to_html, parse_document, Arena, ComrakOptions};
use log::{debug, warn};
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{BTreeSet, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));
static SOURCE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src], source[src]").expect("valid source selector"));

static BACKGROUND_IMAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-background-image\s*=\s*(?:"(?P<dq>[^"]+)"|'(?P<sq>[^']+)')"#)
        .expect("valid background image regex")
});

/// `[text](location ...)` and `![alt](location ...)`; anchored on `](` so nested images are found too
static INLINE_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\]\([ \t]*(?:<(?P<angle>[^>\n]*)>|(?P<bare>[^)\s]+))")
        .expect("valid inline link regex")
});

/// `[label]: location`
static REFERENCE_DEFINITION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ ]{0,3}\[[^\]\n]+\]:[ \t]*(?:<(?P<angle>[^>\n]*)>|(?P<bare>\S+))")
        .expect("valid reference definition regex")
});

/// `<a ... href="location">`
static ANCHOR_HREF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?\bhref\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
        .expect("valid anchor href regex")
});

/// What the link resolver found in one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Relative targets that were checked
    pub checked: Vec<String>,
    /// Relative targets without a file behind them
    pub broken: Vec<String>,
    /// Targets whose `.md` suffix was replaced
    pub rewritten: Vec<String>,
}

/// Check the relative references of a document and rewrite links to other slideshows.
///
/// A broken link is an error in strict mode and a warning otherwise. Running
/// this twice on the same document changes nothing the second time.
pub fn resolve_links(document: &mut Document, strict: bool) -> Result<LinkReport> {
    let mut report = LinkReport::default();
    let mut to_rewrite = HashSet::new();

    for target in find_relative_targets(&document.body) {
        let path_part = strip_suffixes(&target);
        let decoded = decode(path_part);
        let exists = target_exists(&document.source_dir().join(&decoded));

        if !exists {
            let err = SlidesError::BrokenLink {
                document: document.relative_source.clone(),
                link: target.clone(),
            };
            if strict {
                return Err(err);
            }
            warn!("{}", err);
            report.broken.push(target.clone());
        } else if utils::has_markdown_suffix(&decoded) {
            to_rewrite.insert(decode(&target));
            report.rewritten.push(target.clone());
        }

        report.checked.push(target);
    }

    if !to_rewrite.is_empty() {
        document.body = rewrite_locations(&document.body, &to_rewrite);
        debug!(
            "Rewrote {} links in {}",
            report.rewritten.len(),
            document.relative_source
        );
    }

    Ok(report)
}

/// Relative link targets in a Markdown body, in sorted order.
///
/// Targets inside code spans and code blocks are ignored.
pub fn find_relative_targets(markdown: &str) -> BTreeSet<String> {
    let html = markdown_to_html(markdown, &comrak_options());
    let fragment = Html::parse_fragment(&html);

    let mut found = BTreeSet::new();

    for element in fragment.select(&LINK_SELECTOR) {
        if let Some(href) = element.value().attr("href") {
            if !inside_code(&element) {
                found.insert(href.to_string());
            }
        }
    }

    for element in fragment.select(&SOURCE_SELECTOR) {
        if let Some(src) = element.value().attr("src") {
            if !inside_code(&element) {
                found.insert(src.to_string());
            }
        }
    }

    for node in fragment.root_element().descendants() {
        if let Node::Comment(comment) = node.value() {
            for caps in BACKGROUND_IMAGE_REGEX.captures_iter(&**comment) {
                if let Some(location) = caps.name("dq").or_else(|| caps.name("sq")) {
                    found.insert(location.as_str().to_string());
                }
            }
        }
    }

    found
        .into_iter()
        .filter(|target| url_type(target) == UrlType::Relative)
        .collect()
}

fn comrak_options() -> ComrakOptions {
    let mut options = ComrakOptions::default();
    options.render.unsafe_ = true; // Allow raw HTML
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.footnotes = true;
    options
}

fn inside_code(element: &ElementRef<'_>) -> bool {
    element.ancestors().any(|ancestor| {
        ancestor
            .value()
            .as_element()
            .is_some_and(|e| matches!(e.name(), "code" | "pre"))
    })
}

/// The location without its `#fragment` or `?query`
fn strip_suffixes(location: &str) -> &str {
    match location.find(['#', '?']) {
        Some(position) => &location[..position],
        None => location,
    }
}

fn decode(location: &str) -> String {
    percent_decode_str(location).decode_utf8_lossy().into_owned()
}

/// A path counts as existing when the file is there, or when it is the page
/// another slideshow will be rendered to.
fn target_exists(path: &Path) -> bool {
    if path.exists() {
        return true;
    }
    let is_output = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(utils::OUTPUT_EXTENSION));
    is_output && sibling_source(path).is_file()
}

fn sibling_source(path: &Path) -> PathBuf {
    path.with_extension(utils::MARKDOWN_EXTENSION)
}

/// How a location is written in the Markdown source
#[derive(Debug, Clone, Copy)]
enum LocationSyntax {
    AngleDestination,
    BareDestination,
    DoubleQuoted,
    SingleQuoted,
}

const DESTINATION_GROUPS: [(&str, LocationSyntax); 2] = [
    ("angle", LocationSyntax::AngleDestination),
    ("bare", LocationSyntax::BareDestination),
];

const ATTRIBUTE_GROUPS: [(&str, LocationSyntax); 2] = [
    ("dq", LocationSyntax::DoubleQuoted),
    ("sq", LocationSyntax::SingleQuoted),
];

/// Replace the Markdown suffix of every occurrence whose location is in `targets`.
///
/// `targets` holds percent-decoded locations as they appear in the rendered
/// HTML. Code blocks and code spans are left alone. Only the location itself changes.
pub fn rewrite_locations(body: &str, targets: &HashSet<String>) -> String {
    let mut content = String::with_capacity(body.len());
    let mut position = 0;
    for range in code_ranges(body) {
        if range.start < position {
            continue;
        }
        content.push_str(&rewrite_text(&body[position..range.start], targets));
        content.push_str(&body[range.clone()]);
        position = range.end;
    }
    content.push_str(&rewrite_text(&body[position..], targets));
    content
}

fn rewrite_text(text: &str, targets: &HashSet<String>) -> String {
    let mut content = text.to_string();
    for (regex, groups) in [
        (&*INLINE_LINK_REGEX, DESTINATION_GROUPS),
        (&*REFERENCE_DEFINITION_REGEX, DESTINATION_GROUPS),
        (&*ANCHOR_HREF_REGEX, ATTRIBUTE_GROUPS),
    ] {
        content = regex
            .replace_all(&content, |caps: &Captures| rewrite_match(caps, groups, targets))
            .into_owned();
    }
    content
}

fn rewrite_match(
    caps: &Captures,
    groups: [(&str, LocationSyntax); 2],
    targets: &HashSet<String>,
) -> String {
    let whole = &caps[0];
    let Some((location, syntax)) = groups
        .iter()
        .find_map(|(group, syntax)| caps.name(group).map(|m| (m, *syntax)))
    else {
        return whole.to_string();
    };

    let raw = location.as_str();
    let Some(rendered) = rendered_location(raw, syntax) else {
        return whole.to_string();
    };
    if !targets.contains(&decode(&rendered)) {
        return whole.to_string();
    }

    let path_part = strip_suffixes(raw);
    if !utils::has_markdown_suffix(path_part) {
        debug!("Not rewriting '{}', its suffix is escaped", raw);
        return whole.to_string();
    }
    let replaced = format!(
        "{}{}",
        utils::replace_markdown_suffix(path_part),
        &raw[path_part.len()..]
    );

    let offset = location.start() - caps.get(0).map_or(0, |m| m.start());
    format!(
        "{}{}{}",
        &whole[..offset],
        replaced,
        &whole[offset + raw.len()..]
    )
}

/// The location as it ends up in the rendered HTML, with backslash escapes
/// and character references undone the same way as during discovery.
fn rendered_location(raw: &str, syntax: LocationSyntax) -> Option<String> {
    let html = match syntax {
        LocationSyntax::AngleDestination => {
            markdown_to_html(&format!("[link](<{}>)", raw), &comrak_options())
        }
        LocationSyntax::BareDestination => {
            markdown_to_html(&format!("[link]({})", raw), &comrak_options())
        }
        LocationSyntax::DoubleQuoted => format!("<a href=\"{}\"></a>", raw),
        LocationSyntax::SingleQuoted => format!("<a href='{}'></a>", raw),
    };
    let fragment = Html::parse_fragment(&html);
    let element = fragment.select(&LINK_SELECTOR).next()?;
    element.value().attr("href").map(str::to_string)
}

/// Byte ranges of code blocks and code spans in a Markdown body, in order.
fn code_ranges(markdown: &str) -> Vec<Range<usize>> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(markdown.match_indices('\n').map(|(index, _)| index + 1))
        .collect();
    // sourcepos lines are 1-based
    let line_offset = |line: usize| {
        line_starts
            .get(line.saturating_sub(1))
            .copied()
            .unwrap_or(markdown.len())
    };

    let arena = Arena::new();
    let root = parse_document(&arena, markdown, &comrak_options());
    let mut blocks: Vec<Range<usize>> = root
        .descendants()
        .filter_map(|node| {
            let ast = node.data.borrow();
            match ast.value {
                NodeValue::CodeBlock(_) => Some(
                    line_offset(ast.sourcepos.start.line)..line_offset(ast.sourcepos.end.line + 1),
                ),
                _ => None,
            }
        })
        .collect();
    blocks.sort_by_key(|block| block.start);

    let mut ranges = Vec::new();
    let mut position = 0;
    for block in blocks {
        if block.start < position {
            continue;
        }
        ranges.extend(code_spans(markdown, position..block.start));
        position = block.end;
        ranges.push(block);
    }
    ranges.extend(code_spans(markdown, position..markdown.len()));
    ranges
}

/// Code spans within `region`: a run of backticks up to the next run of the same length.
///
/// A span does not continue past a blank line.
fn code_spans(markdown: &str, region: Range<usize>) -> Vec<Range<usize>> {
    let bytes = markdown.as_bytes();
    let end = region.end;
    let mut spans = Vec::new();
    let mut i = region.start;

    while i < end {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => {
                let opening = backtick_run(bytes, i, end);
                let start = i;
                i += opening;
                if let Some(close) = closing_run(bytes, i, end, opening) {
                    spans.push(start..close);
                    i = close;
                }
            }
            _ => i += 1,
        }
    }
    spans
}

fn backtick_run(bytes: &[u8], start: usize, end: usize) -> usize {
    bytes[start..end].iter().take_while(|&&b| b == b'`').count()
}

/// End of the backtick run of exactly `length` that closes a span opened before `start`
fn closing_run(bytes: &[u8], start: usize, end: usize, length: usize) -> Option<usize> {
    let mut j = start;
    while j < end {
        match bytes[j] {
            b'`' => {
                let run = backtick_run(bytes, j, end);
                if run == length {
                    return Some(j + run);
                }
                j += run;
            }
            b'\n' if next_line_is_blank(bytes, j + 1, end) => return None,
            _ => j += 1,
        }
    }
    None
}

fn next_line_is_blank(bytes: &[u8], start: usize, end: usize) -> bool {
    bytes[start.min(end)..end]
        .iter()
        .take_while(|&&b| b != b'\n')
        .all(|b| b.is_ascii_whitespace())
}
