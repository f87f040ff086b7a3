// ABOUTME: Library module for the mdslides program.
// ABOUTME: Turns a directory of Markdown files into reveal.js slideshows with a navigation index.

// Reexport modules
pub mod cascade;
pub mod config;
pub mod document;
pub mod errors;
pub mod html;
pub mod links;
pub mod navtree;
pub mod preprocess;
pub mod resources;
pub mod scanner;
pub mod site;
pub mod utils;
pub mod watch;

// Reexport common types and functions
pub use cascade::{build_effective_config, EffectiveConfig};
pub use config::Config;
pub use document::Document;
pub use errors::{Result, SlidesError};
pub use links::{resolve_links, LinkReport};
pub use navtree::{NavEntry, NavTree};
pub use resources::{AssetResolver, BundledAssets};
pub use scanner::{scan, ScanResult};
pub use site::{build_site, BuildReport, SiteConfig};
pub use watch::{serve, ServeConfig};

#[cfg(test)]
mod tests;
