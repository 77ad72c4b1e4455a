//! EPUB package assembly and structural validation.
//!
//! [`writer`] composes rendered chapters, the optional cover, and canonical
//! metadata into an OCF archive. [`validator`] then re-opens the produced
//! bytes — deliberately not the assembler's in-memory state — and checks
//! them against the Kindle-compatibility rule set. The redundancy is the
//! point: the validator exists to catch assembler bugs, not to assert them
//! away.

pub mod validator;
pub mod writer;

pub use validator::{OpfLocation, ValidationReport, validate_package};
pub use writer::{Chapter, assemble_package, write_package};

/// Content directory inside the archive; the package document lives at
/// `OEBPS/content.opf`.
pub const CONTENT_DIR: &str = "OEBPS";
