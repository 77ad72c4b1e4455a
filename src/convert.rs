//! The conversion pipeline.
//!
//! One synchronous pass per request: size gate → metadata validation →
//! cover processing → heading parse → chapter rendering → package assembly →
//! structural validation of the produced bytes. Stages are pure functions
//! composed here; each fully consumes its predecessor's output, and nothing
//! is shared between requests. Input-validation failures stop the pipeline
//! before any chapter or package work happens.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::cover::process_cover;
use crate::epub::{Chapter, ValidationReport, assemble_package, validate_package};
use crate::error::{Error, Result};
use crate::markdown::{FilenameAllocator, render_chapter};
use crate::metadata::{BookMetadata, RawMetadata, validate_metadata};
use crate::outline::parse_outline;
use crate::util::decode_text;

/// Maximum accepted manuscript size. Keeps the synchronous pipeline bounded.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Raw manuscript bytes plus the encoding the uploader claimed, if any.
/// Consumed once by the heading parser.
#[derive(Debug, Clone, Copy)]
pub struct SourceDocument<'a> {
    pub bytes: &'a [u8],
    pub declared_encoding: Option<&'a str>,
}

impl<'a> SourceDocument<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            declared_encoding: None,
        }
    }

    pub fn with_encoding(bytes: &'a [u8], encoding: &'a str) -> Self {
        Self {
            bytes,
            declared_encoding: Some(encoding),
        }
    }
}

/// A completed conversion: the archive bytes and the validation report that
/// was produced by re-reading them.
#[derive(Debug)]
pub struct Conversion {
    pub epub: Vec<u8>,
    pub report: ValidationReport,
}

/// Convert a manuscript, metadata, and optional cover image into an EPUB
/// archive plus its validation report.
///
/// # Examples
///
/// ```
/// use bindery::{RawMetadata, convert};
///
/// let metadata = RawMetadata {
///     title: "My Book".into(),
///     author: "An Author".into(),
///     language: "en".into(),
///     ..Default::default()
/// };
/// let result = convert(b"# My Book\n## One\nBody\n", &metadata, None).unwrap();
/// assert!(result.report.kindle_compatible);
/// ```
pub fn convert(
    document: &[u8],
    metadata: &RawMetadata,
    cover: Option<&[u8]>,
) -> Result<Conversion> {
    convert_source(SourceDocument::new(document), metadata, cover)
}

/// [`convert`] with an explicit declared encoding for the manuscript bytes.
pub fn convert_source(
    document: SourceDocument<'_>,
    metadata: &RawMetadata,
    cover: Option<&[u8]>,
) -> Result<Conversion> {
    if document.bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(Error::DocumentTooLarge {
            size: document.bytes.len(),
            limit: MAX_DOCUMENT_BYTES,
        });
    }

    // Input validation happens up front; no chapter or package work runs on
    // bad metadata or a bad cover.
    let book = validate_metadata(metadata).map_err(Error::Metadata)?;
    let cover = match cover {
        Some(bytes) if !bytes.is_empty() => Some(process_cover(bytes)?),
        _ => None,
    };

    let text = decode_text(document.bytes, document.declared_encoding);
    let outline = parse_outline(&text);
    debug!(chapters = outline.chapters().len(), "parsed heading outline");

    let chapters = render_chapters(&outline, &book);
    let epub = assemble_package(&chapters, cover.as_ref(), &book)?;

    let report = validate_package(&epub);
    debug!(
        kindle_compatible = report.kindle_compatible,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validated package"
    );

    Ok(Conversion { epub, report })
}

fn render_chapters(outline: &crate::outline::Outline, book: &BookMetadata) -> Vec<Chapter> {
    let mut filenames = FilenameAllocator::new();
    outline
        .chapters()
        .iter()
        .enumerate()
        .map(|(index, node)| Chapter {
            order_index: index,
            title: node.title.clone(),
            filename: filenames.allocate(&node.title, index + 1),
            xhtml: render_chapter(&node.title, &node.chapter_markdown(), book.content_type),
        })
        .collect()
}

/// Write archive bytes to disk atomically: the bytes land in a temp file in
/// the destination directory and are renamed into place only once fully
/// written, so a failed write never leaves a partial archive visible.
pub fn write_epub_file(epub: &[u8], path: &Path) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    tmp.write_all(epub)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Derive a download filename from the book title: filesystem-hostile
/// characters become `_`, accents survive, and the stem is capped at 50
/// characters.
pub fn safe_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(50)
        .collect();
    let stem = cleaned.trim();
    if stem.is_empty() {
        "book.epub".to_string()
    } else {
        format!("{stem}.epub")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename_preserves_accents_and_symbols() {
        assert_eq!(safe_filename("My Book Title"), "My Book Title.epub");
        assert_eq!(
            safe_filename("Book with áccénts & symbols!"),
            "Book with áccénts & symbols!.epub"
        );
        assert_eq!(safe_filename("Book with dots...."), "Book with dots.....epub");
    }

    #[test]
    fn test_safe_filename_replaces_hostile_characters() {
        assert_eq!(
            safe_filename("Book with <bad> chars"),
            "Book with _bad_ chars.epub"
        );
        assert_eq!(safe_filename("a/b\\c:d"), "a_b_c_d.epub");
    }

    #[test]
    fn test_safe_filename_truncates_long_titles() {
        let result = safe_filename(&"A".repeat(100));
        assert_eq!(result.len(), 55);
        assert!(result.ends_with(".epub"));
    }

    #[test]
    fn test_safe_filename_empty_fallback() {
        assert_eq!(safe_filename("   "), "book.epub");
    }

    #[test]
    fn test_document_size_gate() {
        let metadata = RawMetadata {
            title: "Test Book".into(),
            author: "Author".into(),
            language: "en".into(),
            ..Default::default()
        };
        let oversized = vec![b'x'; MAX_DOCUMENT_BYTES + 1];
        let err = convert(&oversized, &metadata, None).unwrap_err();
        assert!(matches!(err, Error::DocumentTooLarge { .. }));
    }
}
