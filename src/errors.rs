// ABOUTME: Error types for the mdslides application
// ABOUTME: Provides structured error handling for each stage of the build pipeline

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlidesError {
    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Failed to walk directory: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Resource '{reference}' not found at {path:?}")]
    ResourceNotFound { reference: String, path: PathBuf },

    #[error("Resource '{reference}' would be copied outside of the output directory")]
    ResourceOutsideOutput { reference: String },

    #[error("Output file {destination:?} would be written from both {first:?} and {second:?}")]
    OutputConflict {
        destination: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("File '{document}' contains a link '{link}', but the target is not found among slide files")]
    BrokenLink { document: String, link: String },

    #[error("A reference to '{0}' is included in the 'nav' configuration, which is not found in the slideshow files")]
    DanglingNavReference(String),

    #[error("Invalid navigation declaration: {0}")]
    InvalidNavigationSpec(String),

    #[error("Failed to parse frontmatter in {path:?}: {message}")]
    FrontmatterError { path: PathBuf, message: String },

    #[error("Preprocess script {script:?} failed: {message}")]
    PreprocessError { script: PathBuf, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Template error: {message}")]
    TemplateError {
        message: String,
        #[source]
        source: Option<tera::Error>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Input validation error: {0}")]
    ValidationError(String),

    #[error("Path not found: {0}")]
    PathNotFoundError(PathBuf),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("In document {document:?}: {source}")]
    DocumentError {
        document: PathBuf,
        #[source]
        source: Box<SlidesError>,
    },
}

impl SlidesError {
    /// Attach the document being processed to an error.
    pub fn in_document(self, document: impl Into<PathBuf>) -> Self {
        match self {
            // Already attributed errors keep their innermost document
            err @ SlidesError::DocumentError { .. } => err,
            err => SlidesError::DocumentError {
                document: document.into(),
                source: Box::new(err),
            },
        }
    }
}

impl From<tera::Error> for SlidesError {
    fn from(err: tera::Error) -> Self {
        // tera hides the useful part of the message in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        SlidesError::TemplateError {
            message,
            source: Some(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, SlidesError>;
