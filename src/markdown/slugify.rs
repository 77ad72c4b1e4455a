//! Slug generation for chapter content filenames.
//!
//! Chapter titles become URL-safe ASCII slugs: Latin diacritics are
//! transliterated (so "Capítulo" stays readable as "capitulo" instead of
//! vanishing), everything else non-alphanumeric collapses to hyphens.
//! [`FilenameAllocator`] layers collision handling on top, since two chapters
//! may share a title — including a real "Chapter 1" colliding with the
//! parser's synthetic fallback chapter.

use std::collections::HashSet;

/// Generate a filesystem- and URL-safe slug from heading text.
///
/// # Examples
///
/// ```
/// use bindery::markdown::slugify;
///
/// assert_eq!(slugify("Chapter One"), "chapter-one");
/// assert_eq!(slugify("Capítulo Añejo"), "capitulo-anejo");
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("  ¡¿!?  "), "");
/// ```
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            out.push('-');
        } else if let Some(ascii) = transliterate(c) {
            out.push_str(ascii);
        }
        // Everything else is dropped.
    }

    out.split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// ASCII transliteration for the Latin-1 supplement plus a few common
/// extended-Latin letters. Unknown characters return `None` and are skipped.
fn transliterate(c: char) -> Option<&'static str> {
    let ascii = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'ā' | 'ă' => "a",
        'æ' | 'Æ' => "ae",
        'ç' | 'Ç' | 'ć' | 'č' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' | 'ē' | 'ė' | 'ę' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' | 'ī' => "i",
        'ð' | 'Ð' => "d",
        'ñ' | 'Ñ' | 'ń' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'ō' => "o",
        'œ' | 'Œ' => "oe",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' | 'ū' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'þ' | 'Þ' => "th",
        'ß' => "ss",
        'ł' | 'Ł' => "l",
        'š' | 'Š' => "s",
        'ž' | 'Ž' => "z",
        _ => return None,
    };
    Some(ascii)
}

/// Allocates unique chapter filenames within one package.
///
/// Collisions are resolved with a numeric suffix: `one.xhtml`, `one-2.xhtml`,
/// `one-3.xhtml`. Titles that slug down to nothing fall back to
/// `chapter-<index>`.
#[derive(Debug, Default)]
pub struct FilenameAllocator {
    used: HashSet<String>,
}

impl FilenameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a unique `.xhtml` filename for a chapter title.
    ///
    /// `index` is the 1-based chapter position, used for the empty-slug
    /// fallback.
    pub fn allocate(&mut self, title: &str, index: usize) -> String {
        let mut slug = slugify(title);
        if slug.is_empty() {
            slug = format!("chapter-{index}");
        }

        let mut candidate = format!("{slug}.xhtml");
        let mut counter = 2;
        while self.used.contains(&candidate) {
            candidate = format!("{slug}-{counter}.xhtml");
            counter += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_simple() {
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn test_slugify_punctuation_and_spacing() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
        assert_eq!(slugify("hello--world"), "hello-world");
    }

    #[test]
    fn test_slugify_transliterates_diacritics() {
        assert_eq!(slugify("Capítulo Añejo"), "capitulo-anejo");
        assert_eq!(slugify("Über Straße"), "uber-strasse");
        assert_eq!(slugify("Cœur Déjà"), "coeur-deja");
    }

    #[test]
    fn test_slugify_drops_unknown_characters() {
        assert_eq!(slugify("第一章"), "");
        assert_eq!(slugify("第一章 one"), "one");
    }

    #[test]
    fn test_allocator_unique_names() {
        let mut alloc = FilenameAllocator::new();
        assert_eq!(alloc.allocate("Chapter 1", 1), "chapter-1.xhtml");
        assert_eq!(alloc.allocate("Chapter 1", 2), "chapter-1-2.xhtml");
        assert_eq!(alloc.allocate("Chapter 1", 3), "chapter-1-3.xhtml");
    }

    #[test]
    fn test_allocator_empty_slug_fallback() {
        let mut alloc = FilenameAllocator::new();
        assert_eq!(alloc.allocate("!!!", 1), "chapter-1.xhtml");
        assert_eq!(alloc.allocate("", 2), "chapter-2.xhtml");
    }

    #[test]
    fn test_allocator_fallback_collides_with_real_title() {
        // A chapter literally titled "chapter 2" vs the index fallback.
        let mut alloc = FilenameAllocator::new();
        assert_eq!(alloc.allocate("chapter 2", 1), "chapter-2.xhtml");
        assert_eq!(alloc.allocate("?", 2), "chapter-2-2.xhtml");
    }
}
