//! Error types for highlight extraction.

/// Result type alias for highlight extraction.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A non-identity `cm` matrix was seen inside a highlighter stroke.
    #[error("Unsupported transformation matrix in highlighter stroke: [{0}]")]
    UnsupportedTransform(String),

    /// A stroke was finished without everything needed to draw it.
    #[error("Malformed highlighter stroke: {0}")]
    MalformedStroke(String),

    #[error("Unknown word selection method: {0}")]
    UnknownSelectionMethod(String),

    /// The union of the highlight shapes was neither a polygon nor a multi-polygon.
    #[error("Unexpected geometry kind from highlight union: {0}")]
    UnexpectedGeometryKind(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Page {0} not found")]
    MissingPage(u32),

    #[error("Page {0} has neither a CropBox nor a MediaBox")]
    MissingPageBox(u32),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
