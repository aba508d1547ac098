//! Error types for the rendering pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving templates or rendering them
#[derive(Error, Debug)]
pub enum Error {
    /// The template name is not listed in the manifest
    #[error("Template not found in manifest: {0}")]
    TemplateNotFound(String),

    /// A referenced local asset does not exist
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// The root element was absent from the settled document
    #[error("Target element #{0} not found in rendered document")]
    TargetElementMissing(String),

    /// A browser interaction step failed
    #[error("Rendering failed: {0}")]
    RenderFailure(String),

    /// Failed to launch or attach to the browser
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load the assembled document into a page
    #[error("Failed to load document: {0}")]
    LoadError(String),

    /// The content did not settle in time
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration or request parameters
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error came from the browser side of the pipeline
    /// rather than from template resolution or configuration.
    pub fn is_render_failure(&self) -> bool {
        match self {
            Error::TargetElementMissing(_)
            | Error::RenderFailure(_)
            | Error::InitializationError(_)
            | Error::LoadError(_)
            | Error::Timeout(_) => true,
            #[cfg(feature = "cdp")]
            Error::CdpError(_) => true,
            _ => false,
        }
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}
