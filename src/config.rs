// ABOUTME: Configuration module for the mdslides application
// ABOUTME: Loads the global YAML configuration and provides environment-based settings

use crate::errors::{Result, SlidesError};
use crate::navtree::NavEntry;
use crate::resources::{url_type, BundledAssets, UrlType};
use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_LOCATION: &str = "mdslides.yml";

/// Input directories tried in order when no input path is given
pub const DEFAULT_INPUT_DIRS: [&str; 2] = ["slides", "docs"];

/// Output directory of the `build` command
pub const DEFAULT_OUTPUT_DIR: &str = "site";

/// Environment variable overriding the bundled assets directory
pub const ASSETS_DIR_ENV: &str = "MDSLIDES_ASSETS_DIR";

/// Settings of the generated index page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    pub title: String,
    pub theme: Option<String>,
    pub favicon: Option<String>,
    pub template: Option<String>,
    /// Explicit navigation declaration, validated by [`IndexConfig::navigation`]
    pub nav: Option<Value>,
    pub enable_footer: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            title: "Index".to_string(),
            theme: None,
            favicon: None,
            template: None,
            nav: None,
            enable_footer: true,
        }
    }
}

impl IndexConfig {
    /// Parse the `nav` declaration into typed entries.
    pub fn navigation(&self) -> Result<Option<Vec<NavEntry>>> {
        match &self.nav {
            None | Some(Value::Null) => Ok(None),
            Some(value) => NavEntry::parse_declaration(value).map(Some),
        }
    }
}

/// Settings applied to every slideshow unless overridden in frontmatter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlidesConfig {
    pub title: Option<String>,
    pub theme: Option<String>,
    pub highlight_theme: Option<String>,
    pub favicon: Option<String>,
    pub template: Option<String>,
    pub separator: Option<String>,
    pub separator_vertical: Option<String>,
    pub separator_notes: Option<String>,
    pub charset: Option<String>,
    /// Command the Markdown body is piped through before rendering
    pub preprocess_script: Option<String>,
}

impl Default for SlidesConfig {
    fn default() -> Self {
        Self {
            title: None,
            theme: Some("black".to_string()),
            highlight_theme: Some("monokai".to_string()),
            favicon: None,
            template: None,
            separator: None,
            separator_vertical: None,
            separator_notes: None,
            charset: None,
            preprocess_script: None,
        }
    }
}

/// A reveal.js plugin loaded by every slideshow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Plugin {
    /// Global JavaScript name registered in `Reveal.initialize({ plugins: [...] })`
    pub name: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub extra_javascript: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub extra_css: Vec<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

/// Global configuration for the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub index: IndexConfig,
    pub slides: SlidesConfig,
    /// Options passed verbatim to `Reveal.initialize`
    pub revealjs: Mapping,
    pub plugins: Vec<Plugin>,
}

impl Default for Config {
    fn default() -> Self {
        let mut revealjs = Mapping::new();
        // history is needed for back/forward buttons and reloads
        revealjs.insert(Value::from("history"), Value::from(true));
        revealjs.insert(Value::from("slideNumber"), Value::from("c/t"));

        Self {
            index: IndexConfig::default(),
            slides: SlidesConfig::default(),
            revealjs,
            plugins: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new configuration instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document and merge it over the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let overlay: Value = serde_yaml::from_str(content)?;
        let mut merged = serde_yaml::to_value(Self::default())?;
        if !overlay.is_null() {
            merge_yaml(&mut merged, overlay);
        }

        let config: Config = serde_yaml::from_value(merged)?;
        config.index.navigation()?;
        Ok(config)
    }

    /// Load the configuration file, falling back to defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No config file, using defaults");
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .map_err(|_| SlidesError::PathNotFoundError(path.to_path_buf()))?;
        let config = Self::from_yaml(&content).map_err(|e| match e {
            SlidesError::YamlError(inner) => {
                SlidesError::ConfigError(format!("Failed to load config from {:?}: {}", path, inner))
            }
            other => other,
        })?;

        info!("Loaded config from {:?}", path);
        debug!("Used config: {:?}", config);
        Ok(config)
    }

    /// Local files referenced by the global configuration.
    ///
    /// Used to decide what to watch in serve mode; built-in names, URLs and
    /// missing files are skipped.
    pub fn local_asset_paths(&self, base_dir: &Path, bundle: &BundledAssets) -> Vec<PathBuf> {
        [
            &self.index.theme,
            &self.index.favicon,
            &self.index.template,
            &self.slides.theme,
            &self.slides.highlight_theme,
            &self.slides.favicon,
            &self.slides.template,
            &self.slides.preprocess_script,
        ]
        .into_iter()
        .flatten()
        .filter(|reference| url_type(reference) == UrlType::Relative)
        .filter(|reference| !bundle.is_builtin(reference))
        .map(|reference| base_dir.join(reference))
        .filter(|path| path.is_file())
        .collect()
    }
}

/// Recursively merge `overlay` into `base`: mappings merge key by key, anything
/// else in the overlay replaces the base value.
pub fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Bundled assets directory, overridable through the environment
pub fn default_assets_dir() -> PathBuf {
    env::var(ASSETS_DIR_ENV)
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("assets"))
}

/// The config file to use: the explicit one, or the default location if it exists.
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_LOCATION);
            default.is_file().then_some(default)
        }
    }
}

/// The input path to use: the explicit one, or the first default directory that exists.
pub fn find_input_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    DEFAULT_INPUT_DIRS
        .iter()
        .map(PathBuf::from)
        .find(|dir| dir.is_dir())
        .ok_or_else(|| {
            SlidesError::ValidationError(format!(
                "No input path given and none of {:?} exist",
                DEFAULT_INPUT_DIRS
            ))
        })
}
