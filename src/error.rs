use thiserror::Error;

/// Errors surfaced by the geopdf library and CLI.
///
/// Invalid GeoDicts and out-of-range crop-mark settings are not errors; they
/// are dropped or clamped. Everything here comes from a collaborator.
#[derive(Debug, Error)]
pub enum GeoPdfError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("unsupported override value for {key}: {reason}")]
    InvalidOverride { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, GeoPdfError>;
