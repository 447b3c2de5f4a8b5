/// Errors from the file writers.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid mesh: {reason}")]
    InvalidMesh { reason: String },

    #[error("mesh for {part} has no triangles")]
    EmptyMesh { part: String },

    #[error("invalid view: {reason}")]
    InvalidView { reason: String },

    #[error("metadata prefix {prefix:?} has no declared namespace")]
    UndeclaredNamespace { prefix: String },

    #[error("package has no parts")]
    EmptyPackage,
}
