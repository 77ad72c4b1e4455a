//! Chapter content rendering.
//!
//! - [`xhtml`]: pure XHTML generation over the pulldown-cmark event stream,
//!   with the Kindle-safety sanitization pass for embedded raw HTML
//! - [`slugify`]: content-filename derivation and collision handling
//!
//! Both halves are pure string transformations; the package assembler
//! ([`crate::epub`]) handles all I/O.

mod slugify;
mod xhtml;

pub use slugify::{FilenameAllocator, slugify};
pub use xhtml::{STYLESHEET_HREF, render_chapter};
