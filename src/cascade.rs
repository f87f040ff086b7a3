// ABOUTME: Configuration cascade for the mdslides application
// ABOUTME: Layers frontmatter overrides over the global configuration and resolves asset fields

use crate::config::{merge_yaml, Config, Plugin};
use crate::errors::Result;
use crate::resources::{AssetKind, AssetResolver, AssetValue, Provenance, ResolvedAsset};
use log::debug;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// Top-level frontmatter keys that may override the global configuration
pub const FRONTMATTER_ALLOWED_KEYS: [&str; 3] = ["slides", "revealjs", "plugins"];

/// The `slides` section as it may appear in frontmatter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SlidesOverrides {
    title: Option<String>,
    theme: Option<String>,
    highlight_theme: Option<String>,
    favicon: Option<String>,
    template: Option<String>,
    separator: Option<String>,
    separator_vertical: Option<String>,
    separator_notes: Option<String>,
    charset: Option<String>,
    preprocess_script: Option<String>,
}

/// Per-document configuration after merging, before asset resolution.
///
/// Each asset value carries the provenance that decides its base directory.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    pub title: Option<String>,
    pub theme: Option<AssetValue>,
    pub highlight_theme: Option<AssetValue>,
    pub favicon: Option<AssetValue>,
    pub template: Option<AssetValue>,
    pub separator: Option<String>,
    pub separator_vertical: Option<String>,
    pub separator_notes: Option<String>,
    pub charset: Option<String>,
    pub preprocess_script: Option<AssetValue>,
    pub revealjs: Mapping,
    pub plugins: Vec<Plugin>,
}

/// Per-document configuration with every asset resolved for the document's output location
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub title: Option<String>,
    pub theme: Option<ResolvedAsset>,
    pub highlight_theme: Option<ResolvedAsset>,
    pub favicon: Option<ResolvedAsset>,
    pub template: Option<ResolvedAsset>,
    pub separator: Option<String>,
    pub separator_vertical: Option<String>,
    pub separator_notes: Option<String>,
    pub charset: Option<String>,
    pub preprocess_script: Option<ResolvedAsset>,
    pub revealjs: Mapping,
    pub plugins: Vec<Plugin>,
}

/// Where the cascade is applied
#[derive(Debug, Clone, Copy)]
pub struct CascadeContext<'a> {
    /// Directory of the global config file (or the working directory without one)
    pub config_dir: &'a Path,
    /// Directory of the Markdown source
    pub document_dir: &'a Path,
    /// Output path of the rendered page
    pub destination: &'a Path,
}

/// Index page settings with resolved assets
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSettings {
    pub title: String,
    pub theme: Option<ResolvedAsset>,
    pub favicon: Option<ResolvedAsset>,
    pub template: Option<ResolvedAsset>,
    pub enable_footer: bool,
}

/// Merge the allow-listed frontmatter keys over the global configuration.
///
/// Produces a new value; `global` is never modified.
pub fn merge_config(
    global: &Config,
    frontmatter: &Mapping,
    config_dir: &Path,
    document_dir: &Path,
) -> Result<MergedConfig> {
    let from_global = |value: &Option<String>| {
        value
            .as_ref()
            .map(|v| AssetValue::new(v.clone(), Provenance::FromGlobal(config_dir.to_path_buf())))
    };

    let slides = &global.slides;
    let mut merged = MergedConfig {
        title: slides.title.clone(),
        theme: from_global(&slides.theme),
        highlight_theme: from_global(&slides.highlight_theme),
        favicon: from_global(&slides.favicon),
        template: from_global(&slides.template),
        separator: slides.separator.clone(),
        separator_vertical: slides.separator_vertical.clone(),
        separator_notes: slides.separator_notes.clone(),
        charset: slides.charset.clone(),
        preprocess_script: from_global(&slides.preprocess_script),
        revealjs: global.revealjs.clone(),
        plugins: global.plugins.clone(),
    };

    for key in FRONTMATTER_ALLOWED_KEYS {
        let Some(value) = frontmatter.get(key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        match key {
            "slides" => {
                let overrides: SlidesOverrides = serde_yaml::from_value(value.clone())?;
                apply_slides_overrides(&mut merged, overrides, document_dir);
            }
            "revealjs" => {
                let mut revealjs = Value::Mapping(merged.revealjs);
                merge_yaml(&mut revealjs, value.clone());
                merged.revealjs = match revealjs {
                    Value::Mapping(mapping) => mapping,
                    _ => serde_yaml::from_value(revealjs)?,
                };
            }
            "plugins" => {
                merged.plugins = serde_yaml::from_value(value.clone())?;
            }
            _ => {}
        }
    }

    Ok(merged)
}

fn apply_slides_overrides(merged: &mut MergedConfig, overrides: SlidesOverrides, document_dir: &Path) {
    let from_frontmatter = |value: String| {
        Some(AssetValue::new(
            value,
            Provenance::FromFrontmatter(document_dir.to_path_buf()),
        ))
    };

    if let Some(theme) = overrides.theme {
        merged.theme = from_frontmatter(theme);
    }
    if let Some(highlight_theme) = overrides.highlight_theme {
        merged.highlight_theme = from_frontmatter(highlight_theme);
    }
    if let Some(favicon) = overrides.favicon {
        merged.favicon = from_frontmatter(favicon);
    }
    if let Some(template) = overrides.template {
        merged.template = from_frontmatter(template);
    }
    if let Some(script) = overrides.preprocess_script {
        merged.preprocess_script = from_frontmatter(script);
    }

    if overrides.title.is_some() {
        merged.title = overrides.title;
    }
    if overrides.separator.is_some() {
        merged.separator = overrides.separator;
    }
    if overrides.separator_vertical.is_some() {
        merged.separator_vertical = overrides.separator_vertical;
    }
    if overrides.separator_notes.is_some() {
        merged.separator_notes = overrides.separator_notes;
    }
    if overrides.charset.is_some() {
        merged.charset = overrides.charset;
    }
}

/// Compute the effective configuration of one document.
pub fn build_effective_config(
    global: &Config,
    frontmatter: &Mapping,
    context: CascadeContext<'_>,
    resolver: &mut AssetResolver,
) -> Result<EffectiveConfig> {
    let merged = merge_config(global, frontmatter, context.config_dir, context.document_dir)?;

    let mut resolve = |kind: AssetKind, value: &Option<AssetValue>| -> Result<Option<ResolvedAsset>> {
        value
            .as_ref()
            .map(|value| resolver.resolve(kind, value, context.destination))
            .transpose()
    };

    let theme = resolve(AssetKind::Theme, &merged.theme)?;
    let highlight_theme = resolve(AssetKind::HighlightTheme, &merged.highlight_theme)?;
    let favicon = resolve(AssetKind::Favicon, &merged.favicon)?;
    let template = resolve(AssetKind::Template, &merged.template)?;
    let preprocess_script = resolve(AssetKind::PreprocessScript, &merged.preprocess_script)?;

    debug!("Effective config for {:?} computed", context.destination);

    Ok(EffectiveConfig {
        title: merged.title,
        theme,
        highlight_theme,
        favicon,
        template,
        separator: merged.separator,
        separator_vertical: merged.separator_vertical,
        separator_notes: merged.separator_notes,
        charset: merged.charset,
        preprocess_script,
        revealjs: merged.revealjs,
        plugins: merged.plugins,
    })
}

/// Resolve the index section of the global configuration for `<output>/index.html`.
pub fn resolve_index_config(
    global: &Config,
    config_dir: &Path,
    index_destination: &Path,
    resolver: &mut AssetResolver,
) -> Result<IndexSettings> {
    let index = &global.index;
    let mut resolve = |kind: AssetKind, value: &Option<String>| -> Result<Option<ResolvedAsset>> {
        value
            .as_ref()
            .map(|reference| {
                let value = AssetValue::new(
                    reference.clone(),
                    Provenance::FromGlobal(config_dir.to_path_buf()),
                );
                resolver.resolve(kind, &value, index_destination)
            })
            .transpose()
    };

    Ok(IndexSettings {
        title: index.title.clone(),
        theme: resolve(AssetKind::Theme, &index.theme)?,
        favicon: resolve(AssetKind::Favicon, &index.favicon)?,
        template: resolve(AssetKind::Template, &index.template)?,
        enable_footer: index.enable_footer,
    })
}
