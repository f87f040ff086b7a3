// ABOUTME: HTML generation module for the mdslides application
// ABOUTME: Renders slideshow and index pages through tera templates and writes them to disk

use crate::cascade::{EffectiveConfig, IndexSettings};
use crate::document::Document;
use crate::errors::{Result, SlidesError};
use crate::navtree::NavTree;
use crate::resources::ResolvedAsset;
use crate::utils;
use chrono::Utc;
use log::debug;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

pub const SLIDESHOW_TEMPLATE_NAME: &str = "mdslides/slideshow.html";
pub const INDEX_TEMPLATE_NAME: &str = "mdslides/index.html";
/// Importable from custom templates with `{% import "mdslides/macros.html" as macros %}`
pub const MACROS_TEMPLATE_NAME: &str = "mdslides/macros.html";

const SLIDESHOW_TEMPLATE: &str = include_str!("templates/slideshow.html.tera");
const INDEX_TEMPLATE: &str = include_str!("templates/index.html.tera");
const MACROS_TEMPLATE: &str = include_str!("templates/macros.html.tera");

/// A `data-*` attribute on the Markdown section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataOption {
    pub name: &'static str,
    pub value: String,
}

/// A reveal.js option as a JavaScript object entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevealOption {
    pub key: String,
    pub value: String,
}

/// Renders the pages of one build.
///
/// Custom templates are read from disk the first time they are used.
pub struct SlideRenderer {
    tera: Tera,
    revealjs_dir: PathBuf,
    custom_templates: HashMap<PathBuf, String>,
}

impl SlideRenderer {
    /// `revealjs_dir` is the framework directory inside the output tree.
    pub fn new(revealjs_dir: &Path) -> Result<Self> {
        let mut tera = Tera::default();
        // Values are escaped explicitly; the Markdown is escaped before rendering
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(vec![
            (MACROS_TEMPLATE_NAME, MACROS_TEMPLATE),
            (SLIDESHOW_TEMPLATE_NAME, SLIDESHOW_TEMPLATE),
            (INDEX_TEMPLATE_NAME, INDEX_TEMPLATE),
        ])?;

        Ok(Self {
            tera,
            revealjs_dir: revealjs_dir.to_path_buf(),
            custom_templates: HashMap::new(),
        })
    }

    /// Name of the template to use, loading a custom one if configured.
    fn template_name(&mut self, template: Option<&ResolvedAsset>, default: &str) -> Result<String> {
        let Some(source) = template.and_then(|t| t.source.as_ref()) else {
            return Ok(default.to_string());
        };

        if let Some(name) = self.custom_templates.get(source) {
            return Ok(name.clone());
        }

        let name = format!("custom/{}", self.custom_templates.len());
        self.tera.add_template_file(source, Some(&name))?;
        debug!("Loaded custom template {:?}", source);
        self.custom_templates.insert(source.clone(), name.clone());
        Ok(name)
    }

    /// Render a document as a reveal.js slideshow.
    pub fn render_slideshow(&mut self, document: &Document) -> Result<String> {
        let config = &document.config;
        let template = self.template_name(config.template.as_ref(), SLIDESHOW_TEMPLATE_NAME)?;

        let page_dir = document
            .destination_path
            .parent()
            .unwrap_or(Path::new("."));
        let revealjs_path = utils::relative_href(page_dir, &self.revealjs_dir);

        let mut context = Context::new();
        context.insert("title", &document.title());
        context.insert("favicon", &href(&config.favicon));
        context.insert("theme", &href(&config.theme));
        context.insert("highlight_theme", &href(&config.highlight_theme));
        context.insert("revealjs_path", &revealjs_path);
        context.insert("markdown_data_options", &markdown_data_options(config));
        context.insert("markdown", &escape_markdown(&document.body));
        context.insert("revealjs_options", &revealjs_options(&config.revealjs)?);
        context.insert("plugins", &config.plugins);

        self.tera.render(&template, &context).map_err(|e| {
            SlidesError::from(e).in_document(document.source_path.clone())
        })
    }

    /// Render the navigation index written to the output root.
    pub fn render_index(&mut self, settings: &IndexSettings, tree: &NavTree) -> Result<String> {
        let template = self.template_name(settings.template.as_ref(), INDEX_TEMPLATE_NAME)?;

        let mut context = Context::new();
        context.insert("title", &settings.title);
        context.insert("favicon", &href(&settings.favicon));
        context.insert("theme", &href(&settings.theme));
        context.insert("nav_items", &tree.items());
        context.insert(
            "build_datetime",
            &Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        context.insert("enable_footer", &settings.enable_footer);
        context.insert("version", env!("CARGO_PKG_VERSION"));

        Ok(self.tera.render(&template, &context)?)
    }
}

fn href(asset: &Option<ResolvedAsset>) -> Option<&str> {
    asset.as_ref().map(|asset| asset.href.as_str())
}

/// The reveal.js markdown plugin options that are set
fn markdown_data_options(config: &EffectiveConfig) -> Vec<DataOption> {
    [
        ("data-separator", &config.separator),
        ("data-separator-vertical", &config.separator_vertical),
        ("data-separator-notes", &config.separator_notes),
        ("data-charset", &config.charset),
    ]
    .into_iter()
    .filter_map(|(name, value)| {
        value
            .as_ref()
            .filter(|value| !value.is_empty())
            .map(|value| DataOption {
                name,
                value: escape_attribute(value),
            })
    })
    .collect()
}

/// Serialize reveal.js options to JavaScript object entries.
pub fn revealjs_options(options: &Mapping) -> Result<Vec<RevealOption>> {
    options
        .iter()
        .map(|(key, value)| {
            let key = match key {
                Value::String(key) => key.clone(),
                other => serde_yaml::to_string(other)?.trim().to_string(),
            };
            let value = serde_json::to_string(value).map_err(|e| {
                SlidesError::ConfigError(format!("Invalid reveal.js option '{}': {}", key, e))
            })?;
            let key = serde_json::to_string(&key).map_err(|e| {
                SlidesError::ConfigError(format!("Invalid reveal.js option '{}': {}", key, e))
            })?;
            Ok(RevealOption {
                key: escape_script(&key),
                value: escape_script(&value),
            })
        })
        .collect()
}

/// Escape Markdown for a `<textarea>`, whose content the browser decodes before reveal.js reads it.
pub fn escape_markdown(markdown: &str) -> String {
    markdown
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Keep JSON from closing the surrounding `<script>` element
fn escape_script(json: &str) -> String {
    json.replace("</", "<\\/")
}

/// Write HTML content to a file
pub fn write_html_to_file(html_content: &str, output_path: &Path) -> Result<()> {
    debug!("Writing HTML to file: {:?}", output_path);
    utils::create_or_overwrite_file(output_path, html_content)
}
