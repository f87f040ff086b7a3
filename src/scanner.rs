// ABOUTME: Document scanner for the mdslides application
// ABOUTME: Walks the input tree and turns Markdown files into documents and everything else into static files

use crate::cascade::{build_effective_config, CascadeContext};
use crate::config::Config;
use crate::document::{emojize, parse_source, Document};
use crate::errors::{Result, SlidesError};
use crate::preprocess::run_preprocess_script;
use crate::resources::AssetResolver;
use crate::utils;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Page written when the input consists of a single slideshow
pub const SINGLE_DOCUMENT_DESTINATION: &str = "index.html";

/// A non-Markdown file copied verbatim into the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFile {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

/// Everything found in the input
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Documents in the order of their source paths
    pub documents: Vec<Document>,
    pub static_files: Vec<StaticFile>,
    /// The only document was written to `index.html`; no navigation index is generated
    pub single_document: bool,
}

/// Fixed inputs of one scan
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    /// Markdown file or directory; absolute and normalized
    pub input: &'a Path,
    /// Absolute and normalized
    pub output_root: &'a Path,
    pub config: &'a Config,
    /// Base directory for relative references in the global configuration
    pub config_dir: &'a Path,
}

/// Discover the documents and static files of the input.
///
/// Discovery happens before any file is read, so the single-document shortcut
/// is known before effective configurations are computed against the destination.
pub fn scan(context: ScanContext<'_>, resolver: &mut AssetResolver) -> Result<ScanResult> {
    let input = context.input;

    if input.is_file() {
        if !utils::is_markdown_file(input) {
            return Err(SlidesError::ValidationError(format!(
                "Input file {:?} is not a Markdown file",
                input
            )));
        }
        warn!(
            "Using the single file {:?} as input, no static files are copied. Use a directory to include images or other files.",
            input
        );
        let destination = context.output_root.join(SINGLE_DOCUMENT_DESTINATION);
        let document = load_document(input, destination, context, resolver)?;
        return Ok(ScanResult {
            documents: vec![document],
            static_files: Vec::new(),
            single_document: true,
        });
    }

    if !input.is_dir() {
        return Err(SlidesError::PathNotFoundError(input.to_path_buf()));
    }

    let (markdown_files, other_files) = discover(input, context.output_root)?;
    info!(
        "Found {} Markdown files and {} static files in {:?}",
        markdown_files.len(),
        other_files.len(),
        input
    );

    // A nested file keeps its place next to its static neighbours
    let single_document = matches!(
        markdown_files.as_slice(),
        [only] if only.parent() == Some(input)
    );
    let mut documents = Vec::with_capacity(markdown_files.len());
    for source in &markdown_files {
        let destination = if single_document {
            context.output_root.join(SINGLE_DOCUMENT_DESTINATION)
        } else {
            destination_for(input, context.output_root, source)?
        };
        documents.push(load_document(source, destination, context, resolver)?);
    }

    let static_files = other_files
        .into_iter()
        .map(|source| {
            let relative = relative_to(input, &source)?;
            Ok(StaticFile {
                destination_path: context.output_root.join(relative),
                source_path: source,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ScanResult {
        documents,
        static_files,
        single_document,
    })
}

/// Sorted walk of the input directory, split into Markdown and other files.
///
/// An output directory nested inside the input is skipped.
fn discover(input: &Path, output_root: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut markdown_files = Vec::new();
    let mut other_files = Vec::new();

    let walker = WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.path() != output_root);

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if utils::is_markdown_file(&path) {
            markdown_files.push(path);
        } else {
            other_files.push(path);
        }
    }

    Ok((markdown_files, other_files))
}

/// Directory that source paths are reported relative to
fn input_root(input: &Path) -> &Path {
    if input.is_file() {
        input.parent().unwrap_or(input)
    } else {
        input
    }
}

fn relative_to<'a>(root: &Path, path: &'a Path) -> Result<&'a Path> {
    path.strip_prefix(root).map_err(|_| {
        SlidesError::ValidationError(format!("{:?} is not inside {:?}", path, root))
    })
}

/// `<output>/<relative source>` with the Markdown suffix replaced
fn destination_for(input_root: &Path, output_root: &Path, source: &Path) -> Result<PathBuf> {
    let relative = relative_to(input_root, source)?;
    Ok(output_root
        .join(relative)
        .with_extension(utils::OUTPUT_EXTENSION))
}

fn load_document(
    source: &Path,
    destination: PathBuf,
    context: ScanContext<'_>,
    resolver: &mut AssetResolver,
) -> Result<Document> {
    read_document(source, destination, context, resolver).map_err(|e| e.in_document(source))
}

fn read_document(
    source: &Path,
    destination: PathBuf,
    context: ScanContext<'_>,
    resolver: &mut AssetResolver,
) -> Result<Document> {
    let content = fs::read_to_string(source)?;
    let parsed = parse_source(source, &content)?;
    let document_dir = source.parent().unwrap_or(context.input);

    let config = build_effective_config(
        context.config,
        &parsed.frontmatter,
        CascadeContext {
            config_dir: context.config_dir,
            document_dir,
            destination: &destination,
        },
        resolver,
    )?;

    let mut body = emojize(&parsed.body);
    if let Some(script) = config.preprocess_script.as_ref().and_then(|s| s.source.as_ref()) {
        body = run_preprocess_script(script, &body)?;
        debug!("Applied preprocess script {:?} to {:?}", script, source);
    }

    let relative_source = match relative_to(input_root(context.input), source) {
        Ok(relative) => utils::path_to_slash(relative),
        Err(_) => source.to_string_lossy().into_owned(),
    };
    let relative_destination =
        utils::path_to_slash(relative_to(context.output_root, &destination)?);
    debug!("Scanned {:?} -> {}", source, relative_destination);

    Ok(Document {
        source_path: source.to_path_buf(),
        relative_source,
        destination_path: destination,
        relative_destination,
        frontmatter: parsed.frontmatter,
        config,
        body,
    })
}

/// Copy static files into the output, preserving their relative position.
///
/// Copies go through the resolver so a static file never silently replaces an
/// asset written to the same place.
pub fn copy_static_files(static_files: &[StaticFile], resolver: &mut AssetResolver) -> Result<()> {
    for file in static_files {
        resolver.copy_once(&file.source_path, &file.destination_path)?;
    }
    if !static_files.is_empty() {
        info!("Copied {} static files", static_files.len());
    }
    Ok(())
}
