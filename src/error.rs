//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing, packing or emitting a report
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to initialize the engine
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load a URL
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// Failed to render content
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to execute JavaScript
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The root element holding the dashboard is missing
    #[error("Dashboard content not found")]
    ContentNotFound,

    /// The root exists but has no section container
    #[error("Dashboard container not found")]
    ContainerNotFound,

    /// The container holds nothing with a rendered height
    #[error("No report pages found")]
    NoSections,

    /// The report preview container is missing
    #[error("Report preview not found.")]
    PreviewNotFound,

    /// The report preview container is empty
    #[error("No report pages found.")]
    NoReportPages,

    /// A snapshot could not be mounted, measured or rasterized
    #[error("Capture failed: {0}")]
    Capture(String),

    /// A document container could not be assembled
    #[error("Document serialization failed: {0}")]
    Emit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_errors_keep_user_facing_messages() {
        assert_eq!(Error::ContentNotFound.to_string(), "Dashboard content not found");
        assert_eq!(Error::ContainerNotFound.to_string(), "Dashboard container not found");
        assert_eq!(Error::NoSections.to_string(), "No report pages found");
        assert_eq!(Error::PreviewNotFound.to_string(), "Report preview not found.");
    }
}
