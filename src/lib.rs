//! Form catalog, document renderer, print dispatcher and browser form server
//! for visa and power-of-attorney applications.

pub mod app;
pub mod catalog;
pub mod config;
pub mod error;
pub mod form;
pub mod print;
pub mod qr;
pub mod render;
pub mod server;

pub use catalog::{Catalog, DocumentType, FieldKind, FieldSpec};
pub use error::{AppError, Result};
pub use form::SubmissionValues;
pub use render::{Block, RenderedDocument, render_document};
