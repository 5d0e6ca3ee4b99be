//! Error types for fetching, compilation, and module emission

use thiserror::Error;

/// Errors from the resource-fetch layer
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL (must start with http:// or https://): {url}")]
    InvalidUrl { url: String },

    #[error("HTTP error {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },
}

impl FetchError {
    /// Check if this is a missing-resource error
    pub fn is_not_found(&self) -> bool {
        match self {
            FetchError::NotFound { .. } => true,
            FetchError::Status { status, .. } => *status == 404,
            FetchError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Errors from the templating engine wrapper
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Template syntax error: {0}")]
    Syntax(#[from] handlebars::TemplateError),

    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("Template not registered: {name}")]
    NotRegistered { name: String },

    #[error("Envelope error: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("Unsupported envelope version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Checksum mismatch for {module}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        module: String,
        expected: String,
        actual: String,
    },
}

impl EngineError {
    /// Check if reconstruction failed because the envelope cannot be trusted
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            EngineError::ChecksumMismatch { .. } | EngineError::UnsupportedVersion { .. }
        )
    }
}

/// Everything `load` can fail with
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Everything `write` can fail with
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Invalid plugin name: {name:?}")]
    InvalidPluginName { name: String },

    #[error("Invalid module path: {path:?}")]
    InvalidModulePath { path: String },

    #[error("Malformed {what} fragment: {reason}")]
    MalformedFragment { what: &'static str, reason: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
