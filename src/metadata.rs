//! Book metadata validation and canonicalization.
//!
//! Takes the caller-supplied [`RawMetadata`] record and either produces the
//! canonical [`BookMetadata`] the package needs, or a list of [`FieldError`]s
//! covering *every* violated field — callers get the complete picture in one
//! pass, not one complaint at a time.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use thiserror::Error;

/// How soft line breaks in the manuscript should be treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentType {
    /// Soft breaks join into paragraphs.
    #[default]
    Prose,
    /// Soft breaks are preserved as line breaks.
    Poetry,
}

/// Caller-supplied metadata, as received (untrimmed, unvalidated).
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub title: String,
    pub author: String,
    /// ISO 639-1 code, matched case-insensitively.
    pub language: String,
    pub publisher: Option<String>,
    /// ISO-8601 date (`YYYY-MM-DD`).
    pub pub_date: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    /// Comma- or semicolon-delimited keyword list.
    pub keywords: Option<String>,
    pub content_type: ContentType,
}

/// One failed metadata field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// The package identifier: exactly one of a normalized ISBN or a generated
/// UUID, never both, never neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Normalized ISBN: 10 digits (last possibly `X`) or 13 digits.
    Isbn(String),
    /// Hyphenated UUID v4, generated when no ISBN was supplied.
    Uuid(String),
}

impl Identifier {
    /// The value to place in the package's `dc:identifier` element. UUIDs
    /// use the `urn:uuid:` form per package-identifier conventions.
    pub fn package_value(&self) -> String {
        match self {
            Identifier::Isbn(isbn) => isbn.clone(),
            Identifier::Uuid(uuid) => format!("urn:uuid:{uuid}"),
        }
    }
}

/// Validated, canonical book metadata.
#[derive(Debug, Clone)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    /// Lowercase ISO 639-1 code.
    pub language: String,
    pub identifier: Identifier,
    pub publisher: Option<String>,
    pub pub_date: Option<NaiveDate>,
    pub description: Option<String>,
    /// Deduplicated, order-insignificant keyword set.
    pub keywords: BTreeSet<String>,
    pub content_type: ContentType,
}

/// Validate and canonicalize a raw metadata record.
///
/// All field violations are collected; the `Err` list is never empty.
///
/// # Examples
///
/// ```
/// use bindery::metadata::{RawMetadata, validate_metadata};
///
/// let raw = RawMetadata {
///     title: "The Crossing".into(),
///     author: "C. McCarthy".into(),
///     language: "EN".into(),
///     ..Default::default()
/// };
/// let book = validate_metadata(&raw).unwrap();
/// assert_eq!(book.language, "en");
/// ```
pub fn validate_metadata(raw: &RawMetadata) -> Result<BookMetadata, Vec<FieldError>> {
    let mut errors = Vec::new();

    let title = raw.title.trim();
    let title_len = title.chars().count();
    if !(2..=200).contains(&title_len) {
        errors.push(FieldError::new(
            "title",
            format!("must be 2-200 characters, got {title_len}"),
        ));
    }

    let author = raw.author.trim();
    let author_len = author.chars().count();
    if !(2..=100).contains(&author_len) {
        errors.push(FieldError::new(
            "author",
            format!("must be 2-100 characters, got {author_len}"),
        ));
    }

    let language = raw.language.trim().to_ascii_lowercase();
    if !is_iso_639_1(&language) {
        errors.push(FieldError::new(
            "language",
            format!("'{}' is not an ISO 639-1 code", raw.language.trim()),
        ));
    }

    let publisher = match raw.publisher.as_deref().map(str::trim) {
        Some(p) if p.chars().count() > 100 => {
            errors.push(FieldError::new("publisher", "must be at most 100 characters"));
            None
        }
        Some(p) if !p.is_empty() => Some(p.to_string()),
        _ => None,
    };

    let description = match raw.description.as_deref().map(str::trim) {
        Some(d) if d.chars().count() > 1000 => {
            errors.push(FieldError::new(
                "description",
                "must be at most 1000 characters",
            ));
            None
        }
        Some(d) if !d.is_empty() => Some(d.to_string()),
        _ => None,
    };

    let pub_date = match raw.pub_date.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => match NaiveDate::parse_from_str(d, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push(FieldError::new(
                    "pub_date",
                    format!("'{d}' is not an ISO-8601 date (YYYY-MM-DD)"),
                ));
                None
            }
        },
        _ => None,
    };

    let identifier = match raw.isbn.as_deref().map(str::trim) {
        Some(isbn) if !isbn.is_empty() => match normalize_isbn(isbn) {
            Some(normalized) => Some(Identifier::Isbn(normalized)),
            None => {
                errors.push(FieldError::new(
                    "isbn",
                    format!("'{isbn}' is not a valid ISBN-10 or ISBN-13"),
                ));
                None
            }
        },
        _ => None,
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(BookMetadata {
        title: title.to_string(),
        author: author.to_string(),
        language,
        identifier: identifier
            .unwrap_or_else(|| Identifier::Uuid(uuid::Uuid::new_v4().to_string())),
        publisher,
        pub_date,
        description,
        keywords: parse_keywords(raw.keywords.as_deref().unwrap_or("")),
        content_type: raw.content_type,
    })
}

/// Strip hyphens/spaces and check the ISBN shape: 10 digits with an optional
/// trailing `X`, or 13 digits. Returns the normalized form (uppercase `X`).
pub fn normalize_isbn(isbn: &str) -> Option<String> {
    let stripped: String = isbn.chars().filter(|c| *c != '-' && *c != ' ').collect();
    match stripped.len() {
        10 => {
            let (head, last) = stripped.split_at(9);
            if head.chars().all(|c| c.is_ascii_digit())
                && (last.chars().all(|c| c.is_ascii_digit()) || last.eq_ignore_ascii_case("x"))
            {
                Some(stripped.to_ascii_uppercase())
            } else {
                None
            }
        }
        13 if stripped.chars().all(|c| c.is_ascii_digit()) => Some(stripped),
        _ => None,
    }
}

/// Split a delimited keyword string into a deduplicated set.
fn parse_keywords(raw: &str) -> BTreeSet<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// All two-letter ISO 639-1 codes, sorted for binary search.
const ISO_639_1: &[&str] = &[
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg",
    "bh", "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv",
    "cy", "da", "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi",
    "fj", "fo", "fr", "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr",
    "ht", "hu", "hy", "hz", "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja",
    "jv", "ka", "kg", "ki", "kj", "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw",
    "ky", "la", "lb", "lg", "li", "ln", "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml",
    "mn", "mr", "ms", "mt", "my", "na", "nb", "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv",
    "ny", "oc", "oj", "om", "or", "os", "pa", "pi", "pl", "ps", "pt", "qu", "rm", "rn", "ro",
    "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk", "sl", "sm", "sn", "so", "sq", "sr",
    "ss", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti", "tk", "tl", "tn", "to", "tr",
    "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo", "wa", "wo", "xh", "yi",
    "yo", "za", "zh", "zu",
];

fn is_iso_639_1(code: &str) -> bool {
    ISO_639_1.binary_search(&code).is_ok()
}
