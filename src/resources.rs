// ABOUTME: Asset resolution for the mdslides application
// ABOUTME: Classifies theme/favicon/template references and copies them into the output tree

use crate::errors::{Result, SlidesError};
use crate::utils;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the directory holding framework files and built-in themes in the output
pub const OUTPUT_ASSETS_DIRNAME: &str = "mdslides-assets";

/// Framework directory inside the bundle and inside the output assets directory
const BUNDLED_REVEALJS_DIR: &str = "reveal.js";
const OUTPUT_REVEALJS_DIR: &str = "reveal-js";

/// Built-in theme locations relative to the bundle root
const BUNDLED_THEMES_DIR: &str = "reveal.js/dist/theme";
const BUNDLED_HIGHLIGHT_THEMES_DIR: &str = "highlight.js/build/styles";

/// Built-in highlight themes inside the output assets directory
const OUTPUT_HIGHLIGHT_THEMES_DIR: &str = "highlight-js-themes";

/// How a configured reference is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlType {
    /// Fragment inside the current page, e.g. `#intro`
    Anchor,
    /// URL with a scheme, or a path starting at the filesystem/site root
    Absolute,
    /// Filesystem path relative to some base directory
    Relative,
}

/// Classify a link target or asset reference.
pub fn url_type(reference: &str) -> UrlType {
    if reference.starts_with('#') {
        return UrlType::Anchor;
    }

    if reference.starts_with('/') {
        return UrlType::Absolute;
    }

    if let Ok(parsed) = url::Url::parse(reference) {
        if parsed.scheme() != "file" {
            return UrlType::Absolute;
        }
    }

    if Path::new(reference).is_absolute() {
        return UrlType::Absolute;
    }

    UrlType::Relative
}

/// Where a configured value came from, and therefore which directory a relative
/// reference is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Set in the global configuration file located in this directory
    FromGlobal(PathBuf),
    /// Set in the frontmatter of a document located in this directory
    FromFrontmatter(PathBuf),
}

impl Provenance {
    pub fn base_dir(&self) -> &Path {
        match self {
            Provenance::FromGlobal(dir) | Provenance::FromFrontmatter(dir) => dir,
        }
    }
}

/// A configured asset reference together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetValue {
    pub reference: String,
    pub provenance: Provenance,
}

impl AssetValue {
    pub fn new(reference: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            reference: reference.into(),
            provenance,
        }
    }
}

/// The asset fields that go through resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Theme,
    HighlightTheme,
    Favicon,
    Template,
    PreprocessScript,
}

impl AssetKind {
    pub fn label(self) -> &'static str {
        match self {
            AssetKind::Theme => "theme",
            AssetKind::HighlightTheme => "highlight theme",
            AssetKind::Favicon => "favicon",
            AssetKind::Template => "template",
            AssetKind::PreprocessScript => "preprocess script",
        }
    }
}

/// Outcome of resolving an asset reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// Value to put in the rendered page (unchanged for anchors and absolute URLs)
    pub href: String,
    /// Local file backing the asset, if any
    pub source: Option<PathBuf>,
}

/// The bundled presentation framework and its built-in theme catalogs.
#[derive(Debug, Clone)]
pub struct BundledAssets {
    root: PathBuf,
    themes: BTreeSet<String>,
    highlight_themes: BTreeSet<String>,
}

impl BundledAssets {
    /// Gather the theme catalogs from a bundle directory.
    ///
    /// A missing bundle is not an error; the catalogs are simply empty and every
    /// theme reference is treated as a filesystem path.
    pub fn discover(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            warn!("Bundled assets directory {:?} not found", root);
        }

        let themes = gather_themes(&root.join(BUNDLED_THEMES_DIR))?;
        let highlight_themes = gather_themes(&root.join(BUNDLED_HIGHLIGHT_THEMES_DIR))?;

        debug!(
            "Bundled assets at {:?}: {} themes, {} highlight themes",
            root,
            themes.len(),
            highlight_themes.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            themes,
            highlight_themes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn themes(&self) -> &BTreeSet<String> {
        &self.themes
    }

    pub fn highlight_themes(&self) -> &BTreeSet<String> {
        &self.highlight_themes
    }

    pub fn revealjs_dir(&self) -> PathBuf {
        self.root.join(BUNDLED_REVEALJS_DIR)
    }

    /// Look up a built-in name for the given kind, returning the bundled file.
    pub fn builtin(&self, kind: AssetKind, reference: &str) -> Option<(String, PathBuf)> {
        let name = builtin_name(reference)?;
        let (catalog, dir) = match kind {
            AssetKind::Theme => (&self.themes, BUNDLED_THEMES_DIR),
            AssetKind::HighlightTheme => (&self.highlight_themes, BUNDLED_HIGHLIGHT_THEMES_DIR),
            AssetKind::Favicon | AssetKind::Template | AssetKind::PreprocessScript => {
                return None
            }
        };
        catalog
            .contains(name)
            .then(|| (name.to_string(), self.root.join(dir).join(format!("{}.css", name))))
    }

    /// Whether a reference names a built-in theme of any kind.
    pub fn is_builtin(&self, reference: &str) -> bool {
        self.builtin(AssetKind::Theme, reference).is_some()
            || self.builtin(AssetKind::HighlightTheme, reference).is_some()
    }
}

/// A bare name, optionally with a `.css` extension, that may denote a built-in.
fn builtin_name(reference: &str) -> Option<&str> {
    if reference.contains('/') || reference.contains('\\') {
        return None;
    }
    let name = reference.strip_suffix(".css").unwrap_or(reference);
    (!name.is_empty()).then_some(name)
}

fn gather_themes(dir: &Path) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    if !dir.is_dir() {
        return Ok(names);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "css") {
            if let Some(stem) = path.file_stem() {
                names.insert(stem.to_string_lossy().into_owned());
            }
        }
    }
    Ok(names)
}

/// Resolves asset references for one build and copies them into the output tree.
///
/// Every destination is written at most once per build. Requesting it again
/// from the same source is a no-op, from another source an error.
#[derive(Debug)]
pub struct AssetResolver {
    bundle: BundledAssets,
    output_root: PathBuf,
    /// Destination -> source
    copied: HashMap<PathBuf, PathBuf>,
}

impl AssetResolver {
    /// `output_root` must be absolute and normalized.
    pub fn new(bundle: BundledAssets, output_root: &Path) -> Self {
        Self {
            bundle,
            output_root: output_root.to_path_buf(),
            copied: HashMap::new(),
        }
    }

    pub fn bundle(&self) -> &BundledAssets {
        &self.bundle
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn output_assets_dir(&self) -> PathBuf {
        self.output_root.join(OUTPUT_ASSETS_DIRNAME)
    }

    pub fn output_revealjs_dir(&self) -> PathBuf {
        self.output_assets_dir().join(OUTPUT_REVEALJS_DIR)
    }

    /// Copy the bundled reveal.js framework into the output assets directory.
    ///
    /// Theme stylesheets are left out; they are copied on demand when a page uses them.
    pub fn copy_framework(&mut self) -> Result<()> {
        let source = self.bundle.revealjs_dir();
        if !source.is_dir() {
            warn!(
                "reveal.js not found in bundled assets {:?}, slideshows will not load the framework",
                self.bundle.root()
            );
            return Ok(());
        }

        let destination = self.output_revealjs_dir();
        let theme_dir = Path::new("dist").join("theme");
        let count = utils::copy_directory(&source, &destination, |relative| {
            relative.parent() == Some(theme_dir.as_path())
                && relative.extension().is_some_and(|ext| ext == "css")
        })?;
        info!("Copied reveal.js framework ({} files)", count);
        Ok(())
    }

    /// Copy `source` to `destination` unless that destination was already written in this build.
    ///
    /// Returns whether a copy happened. A destination already written from a
    /// different source is an `OutputConflict`.
    pub fn copy_once(&mut self, source: &Path, destination: &Path) -> Result<bool> {
        if let Some(first) = self.copied.get(destination) {
            if first != source {
                return Err(SlidesError::OutputConflict {
                    destination: destination.to_path_buf(),
                    first: first.clone(),
                    second: source.to_path_buf(),
                });
            }
            debug!("Skipping already copied {:?}", destination);
            return Ok(false);
        }
        utils::copy_file(source, destination)?;
        self.copied
            .insert(destination.to_path_buf(), source.to_path_buf());
        Ok(true)
    }

    /// Resolve an asset reference for the page that will be written to `referencing_output`.
    pub fn resolve(
        &mut self,
        kind: AssetKind,
        value: &AssetValue,
        referencing_output: &Path,
    ) -> Result<ResolvedAsset> {
        let reference = value.reference.as_str();

        if matches!(kind, AssetKind::Template | AssetKind::PreprocessScript) {
            return resolve_local_file(kind, value);
        }

        if url_type(reference) != UrlType::Relative {
            return Ok(ResolvedAsset {
                href: reference.to_string(),
                source: None,
            });
        }

        let referencing_dir = referencing_output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.output_root.clone());

        if let Some((name, bundled)) = self.bundle.builtin(kind, reference) {
            let destination = match kind {
                AssetKind::HighlightTheme => self
                    .output_assets_dir()
                    .join(OUTPUT_HIGHLIGHT_THEMES_DIR)
                    .join(format!("{}.css", name)),
                _ => self
                    .output_revealjs_dir()
                    .join("dist")
                    .join("theme")
                    .join(format!("{}.css", name)),
            };
            self.copy_once(&bundled, &destination)?;
            return Ok(ResolvedAsset {
                href: utils::relative_href(&referencing_dir, &destination),
                source: Some(bundled),
            });
        }

        let source = resolve_existing(value)?;

        // Keep the asset at the same position relative to whatever declared it
        let anchor_dir = match &value.provenance {
            Provenance::FromGlobal(_) => self.output_root.clone(),
            Provenance::FromFrontmatter(_) => referencing_dir.clone(),
        };
        let destination = utils::normalize_path(&anchor_dir.join(reference));
        if !destination.starts_with(&self.output_root) || destination == self.output_root {
            return Err(SlidesError::ResourceOutsideOutput {
                reference: reference.to_string(),
            });
        }

        self.copy_once(&source, &destination)?;
        debug!("Resolved {} '{}' to {:?}", kind.label(), reference, destination);

        Ok(ResolvedAsset {
            href: utils::relative_href(&referencing_dir, &destination),
            source: Some(source),
        })
    }
}

/// Templates and preprocess scripts are used at build time, so they are located but never copied.
fn resolve_local_file(kind: AssetKind, value: &AssetValue) -> Result<ResolvedAsset> {
    let reference = value.reference.as_str();
    let source = match url_type(reference) {
        UrlType::Relative => resolve_existing(value)?,
        UrlType::Absolute if Path::new(reference).is_absolute() => {
            let path = PathBuf::from(reference);
            if !path.is_file() {
                return Err(SlidesError::ResourceNotFound {
                    reference: reference.to_string(),
                    path,
                });
            }
            path
        }
        _ => {
            return Err(SlidesError::ConfigError(format!(
                "The {} '{}' must be a local file",
                kind.label(),
                reference
            )));
        }
    };
    Ok(ResolvedAsset {
        href: reference.to_string(),
        source: Some(source),
    })
}

/// Resolve a relative reference against its provenance directory, requiring the file to exist.
fn resolve_existing(value: &AssetValue) -> Result<PathBuf> {
    let path = utils::normalize_path(&value.provenance.base_dir().join(&value.reference));
    if !path.is_file() {
        return Err(SlidesError::ResourceNotFound {
            reference: value.reference.clone(),
            path,
        });
    }
    Ok(path)
}
