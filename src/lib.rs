//! # bindery
//!
//! A library for converting heading-structured Markdown or plain-text
//! manuscripts into Kindle-compatible EPUB packages, and for validating the
//! structure of the packages it produces.
//!
//! ## Features
//!
//! - Splits manuscripts into chapters on `## ` headings (with `# ` as the
//!   book title and `### ` as sections), falling back to a single chapter
//!   for unstructured text
//! - Renders chapter bodies to sanitized, strictly well-formed XHTML
//! - Validates and canonicalizes book metadata (ISBN or generated UUID
//!   identifier, ISO 639-1 language, ISO-8601 dates)
//! - Normalizes cover images to Kindle-safe RGB JPEG/PNG
//! - Assembles the OCF archive with OPF package document, legacy NCX, and
//!   EPUB 3 NAV navigation
//! - Re-opens the finished archive and reports errors, warnings, and
//!   package facts in a structured [`ValidationReport`]
//!
//! ## Quick Start
//!
//! ```
//! use bindery::{RawMetadata, convert, safe_filename};
//!
//! let metadata = RawMetadata {
//!     title: "Wind and Sand".into(),
//!     author: "A. Writer".into(),
//!     language: "en".into(),
//!     ..Default::default()
//! };
//!
//! let document = b"# Wind and Sand\n## Dunes\nFirst chapter.\n## Storms\nSecond chapter.\n";
//! let result = convert(document, &metadata, None).unwrap();
//!
//! assert!(result.report.kindle_compatible);
//! assert_eq!(result.report.info.chapter_count, 2);
//! assert_eq!(safe_filename(&metadata.title), "Wind and Sand.epub");
//! // result.epub holds the archive bytes.
//! ```

pub mod convert;
pub mod cover;
pub mod epub;
pub mod error;
pub mod markdown;
pub mod metadata;
pub mod outline;
pub(crate) mod util;

pub use convert::{
    Conversion, MAX_DOCUMENT_BYTES, SourceDocument, convert, convert_source, safe_filename,
    write_epub_file,
};
pub use cover::{CoverAsset, CoverError, process_cover};
pub use epub::{Chapter, OpfLocation, ValidationReport, assemble_package, validate_package};
pub use error::{Error, Result};
pub use metadata::{
    BookMetadata, ContentType, FieldError, Identifier, RawMetadata, validate_metadata,
};
pub use outline::{HeadingLevel, HeadingNode, Outline, parse_outline};
