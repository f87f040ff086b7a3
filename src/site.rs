// ABOUTME: Site build pipeline for the mdslides application
// ABOUTME: Runs scanning, link resolution, navigation and rendering in order for one full build

use crate::cascade::resolve_index_config;
use crate::config::{default_assets_dir, Config};
use crate::errors::{Result, SlidesError};
use crate::html::{write_html_to_file, SlideRenderer};
use crate::links::resolve_links;
use crate::navtree::NavTree;
use crate::resources::{AssetResolver, BundledAssets};
use crate::scanner::{self, ScanContext, SINGLE_DOCUMENT_DESTINATION};
use crate::utils;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

/// Settings for one build
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Markdown file or directory
    pub input_path: PathBuf,
    /// Deleted and recreated by every build
    pub output_path: PathBuf,
    pub config_path: Option<PathBuf>,
    /// Bundle with reveal.js and the built-in themes
    pub assets_dir: PathBuf,
    /// Turn broken links and dangling nav references into errors
    pub strict: bool,
}

impl SiteConfig {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            config_path: None,
            assets_dir: default_assets_dir(),
            strict: false,
        }
    }
}

/// Non-fatal findings of a successful build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Rendered slideshows, relative to the output root
    pub pages: Vec<String>,
    pub static_files: usize,
    /// Whether `index.html` is a navigation index rather than the only slideshow
    pub index_generated: bool,
    /// Broken relative links per document source
    pub broken_links: BTreeMap<String, Vec<String>>,
    pub orphaned_pages: Vec<String>,
    pub dangling_references: Vec<String>,
}

/// Build the whole site.
pub fn build_site(site: &SiteConfig) -> Result<BuildReport> {
    let input = utils::absolute_path(&site.input_path)?;
    if !input.exists() {
        return Err(SlidesError::PathNotFoundError(site.input_path.clone()));
    }
    let output_root = utils::absolute_path(&site.output_path)?;
    if input.starts_with(&output_root) {
        return Err(SlidesError::ValidationError(format!(
            "Output directory {:?} contains the input {:?} and would delete it",
            output_root, input
        )));
    }

    let config = Config::load(site.config_path.as_deref())?;
    let config_dir = config_dir(site.config_path.as_deref())?;

    info!("Building slides from {:?} into {:?}", input, output_root);
    utils::recreate_directory(&output_root)?;

    let bundle = BundledAssets::discover(&site.assets_dir)?;
    let mut resolver = AssetResolver::new(bundle, &output_root);
    resolver.copy_framework()?;

    let mut scan = scanner::scan(
        ScanContext {
            input: &input,
            output_root: &output_root,
            config: &config,
            config_dir: &config_dir,
        },
        &mut resolver,
    )?;
    scanner::copy_static_files(&scan.static_files, &mut resolver)?;

    let mut report = BuildReport {
        static_files: scan.static_files.len(),
        ..BuildReport::default()
    };

    for document in &mut scan.documents {
        let links = resolve_links(document, site.strict)?;
        if !links.broken.is_empty() {
            report
                .broken_links
                .insert(document.relative_source.clone(), links.broken);
        }
    }

    let mut renderer = SlideRenderer::new(&resolver.output_revealjs_dir())?;

    if !scan.single_document {
        let tree = match config.index.navigation()? {
            Some(entries) => {
                debug!("Generating navigation tree from config");
                let tree = NavTree::from_declaration(&entries)?;
                let validation = tree.validate(&scan.documents, site.strict)?;
                report.orphaned_pages = validation.orphaned_pages;
                report.dangling_references = validation.dangling_references;
                tree
            }
            None => {
                debug!("Generating navigation tree from Markdown files");
                NavTree::from_documents(&scan.documents)?
            }
        };

        let index_destination = output_root.join(SINGLE_DOCUMENT_DESTINATION);
        let settings = resolve_index_config(&config, &config_dir, &index_destination, &mut resolver)?;
        let markup = renderer.render_index(&settings, &tree)?;
        write_html_to_file(&markup, &index_destination)?;
        report.index_generated = true;

        if let Some(document) = scan
            .documents
            .iter()
            .find(|document| document.relative_destination == SINGLE_DOCUMENT_DESTINATION)
        {
            warn!(
                "{} is rendered to {}, replacing the generated index",
                document.relative_source, SINGLE_DOCUMENT_DESTINATION
            );
        }
    }

    for document in &scan.documents {
        let markup = renderer.render_slideshow(document)?;
        write_html_to_file(&markup, &document.destination_path)?;
        report.pages.push(document.relative_destination.clone());
    }

    info!(
        "Built {} slideshows and copied {} static files to {:?}",
        report.pages.len(),
        report.static_files,
        output_root
    );
    Ok(report)
}

/// Base directory for relative references in the global configuration
fn config_dir(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => {
            let path = utils::absolute_path(path)?;
            Ok(path.parent().map(Path::to_path_buf).unwrap_or(path))
        }
        None => Ok(env::current_dir()?),
    }
}
