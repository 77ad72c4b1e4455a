//! Error types for conversion and validation operations.

use thiserror::Error;

use crate::cover::CoverError;
use crate::metadata::FieldError;

/// Errors that can occur while converting a document or writing the archive.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Document exceeds the size bound that keeps conversion synchronous.
    #[error("document too large: {size} bytes (limit {limit})")]
    DocumentTooLarge { size: usize, limit: usize },

    /// One or more metadata fields failed validation. All violations are
    /// collected before this is returned, not just the first.
    #[error("invalid metadata: {}", format_field_errors(.0))]
    Metadata(Vec<FieldError>),

    /// The supplied cover image cannot be used.
    #[error("invalid cover image: {0}")]
    Cover(#[from] CoverError),

    /// An assembled package violated one of its own invariants (duplicate
    /// manifest id, empty spine). Indicates an upstream defect, not user
    /// input.
    #[error("package invariant violated: {0}")]
    Package(String),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
