use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Catalog file not found: {}", .0.display())]
    CatalogNotFound(PathBuf),
    #[error("Catalog parse error in {}: {source}", path.display())]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Duplicate field '{field}' in document type '{document}'")]
    DuplicateField { document: String, field: String },
    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),
    #[error("PDF generation error (lopdf): {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Print error: {0}")]
    Print(String),
    #[error("QR code error: {0}")]
    Qr(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Server error: {0}")]
    Server(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
