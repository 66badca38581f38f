use thiserror::Error;

use crate::dialect::DialectKind;

/// Failures reported by a typesetting engine or while fetching one.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("typesetting engine unavailable: {0}")]
    Unavailable(String),
    #[error("{dialect} conversion failed: {message}")]
    Conversion { dialect: DialectKind, message: String },
    #[error("malformed engine output: {0}")]
    MalformedOutput(String),
}

/// Failures on the size/paint path of a math box.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("typesetting provider is not loaded")]
    ProviderNotLoaded,
    #[error(transparent)]
    Conversion(#[from] EngineError),
    #[error("invalid vector graphic: {0}")]
    InvalidGraphic(String),
    #[error("compositor failed: {0}")]
    Compositor(String),
}
