//! Heading-structure parsing.
//!
//! Scans manuscript text line by line and folds it into a shallow tree of
//! [`HeadingNode`]s: one optional `Title` root (`# `), `Chapter` children
//! (`## `), and `Section` grandchildren (`### `). The scan is a two-state
//! machine (`BeforeFirstChapter` / `InChapter`) rather than a recursive
//! descent — the hierarchy is fixed and three levels deep, so a single pass
//! with a current-chapter accumulator is all that's needed.
//!
//! Parsing is total: any input, including empty text, malformed markers, and
//! a `### ` with no preceding `## `, produces at least one chapter. Content
//! appearing before the first chapter marker lands in an implicit leading
//! chapter instead of being discarded.

/// Depth of a heading node in the manuscript tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    /// `# ` — the book title. At most one, always the root.
    Title,
    /// `## ` — the unit of chapter splitting.
    Chapter,
    /// `### ` — a subsection nested under a chapter.
    Section,
}

/// A node in the parsed heading tree.
///
/// `body_lines` holds the raw Markdown lines (blank lines included, so
/// paragraph breaks survive) that follow this heading up to the next heading
/// at the same or shallower level. For a `Chapter` node, lines that follow
/// one of its sections live in that section's node, not in the chapter's own
/// `body_lines`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingNode {
    pub level: HeadingLevel,
    pub title: String,
    pub body_lines: Vec<String>,
    pub children: Vec<HeadingNode>,
}

impl HeadingNode {
    fn new(level: HeadingLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body_lines: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Reassemble the full Markdown body of a chapter, section headings
    /// included, in document order.
    pub fn chapter_markdown(&self) -> String {
        let mut out = String::new();
        for line in &self.body_lines {
            out.push_str(line);
            out.push('\n');
        }
        for section in &self.children {
            out.push_str("### ");
            out.push_str(&section.title);
            out.push('\n');
            for line in &section.body_lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

/// The parsed manuscript: a `Title` root whose children are the chapters.
///
/// # Examples
///
/// ```
/// use bindery::outline::parse_outline;
///
/// let outline = parse_outline("# My Book\n## One\nfirst\n## Two\nsecond\n");
/// assert_eq!(outline.title(), Some("My Book"));
/// assert_eq!(outline.chapters().len(), 2);
/// assert_eq!(outline.chapters()[1].title, "Two");
/// ```
#[derive(Debug, Clone)]
pub struct Outline {
    root: HeadingNode,
}

impl Outline {
    /// The book title, when the manuscript carried a `# ` line.
    pub fn title(&self) -> Option<&str> {
        if self.root.title.is_empty() {
            None
        } else {
            Some(&self.root.title)
        }
    }

    /// Chapters in manuscript order. Never empty.
    pub fn chapters(&self) -> &[HeadingNode] {
        &self.root.children
    }
}

/// Title used when content exists without any chapter marker above it.
pub const FALLBACK_CHAPTER_TITLE: &str = "Chapter 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeFirstChapter,
    InChapter,
}

enum LineEvent<'a> {
    Title(&'a str),
    Chapter(&'a str),
    Section(&'a str),
    Body(&'a str),
}

/// Classify one line. A marker only counts when followed by whitespace and a
/// non-empty title; anything else (deeper headings, `##foo`, bare `##`) is a
/// body line.
fn classify(line: &str) -> LineEvent<'_> {
    if let Some(title) = heading_title(line, "###") {
        LineEvent::Section(title)
    } else if let Some(title) = heading_title(line, "##") {
        LineEvent::Chapter(title)
    } else if let Some(title) = heading_title(line, "#") {
        LineEvent::Title(title)
    } else {
        LineEvent::Body(line)
    }
}

fn heading_title<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(marker)?;
    if rest.starts_with('#') || !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let title = rest.trim();
    if title.is_empty() { None } else { Some(title) }
}

/// Parse manuscript text into an [`Outline`].
///
/// Deterministic and total: never fails, and always yields at least one
/// chapter (the synthetic [`FALLBACK_CHAPTER_TITLE`] when the text has no
/// `## ` markers at all).
pub fn parse_outline(text: &str) -> Outline {
    let mut root = HeadingNode::new(HeadingLevel::Title, "");
    let mut state = State::BeforeFirstChapter;
    // Blank lines seen before any chapter exists; flushed into the implicit
    // chapter if one gets created, discarded at an explicit chapter marker.
    let mut pending: Vec<String> = Vec::new();

    for line in text.lines() {
        match classify(line) {
            LineEvent::Title(title) => {
                if state == State::BeforeFirstChapter && root.title.is_empty() {
                    root.title = title.to_string();
                } else {
                    // A second title line is body content, kept verbatim.
                    push_body(&mut root, state, &mut pending, line);
                    state = State::InChapter;
                }
            }
            LineEvent::Chapter(title) => {
                pending.clear();
                root.children
                    .push(HeadingNode::new(HeadingLevel::Chapter, title));
                state = State::InChapter;
            }
            LineEvent::Section(title) => {
                if state == State::BeforeFirstChapter {
                    open_implicit_chapter(&mut root, &mut pending);
                    state = State::InChapter;
                }
                let chapter = root.children.last_mut().expect("chapter exists in state");
                chapter
                    .children
                    .push(HeadingNode::new(HeadingLevel::Section, title));
            }
            LineEvent::Body(line) => {
                if state == State::BeforeFirstChapter && line.trim().is_empty() {
                    pending.push(line.to_string());
                } else {
                    push_body(&mut root, state, &mut pending, line);
                    state = State::InChapter;
                }
            }
        }
    }

    // A manuscript with no chapters at all (possibly empty, possibly only
    // blank lines) still collapses into exactly one chapter.
    if root.children.is_empty() {
        let mut chapter = HeadingNode::new(HeadingLevel::Chapter, FALLBACK_CHAPTER_TITLE);
        chapter.body_lines = std::mem::take(&mut pending);
        root.children.push(chapter);
    }

    Outline { root }
}

fn push_body(root: &mut HeadingNode, state: State, pending: &mut Vec<String>, line: &str) {
    if state == State::BeforeFirstChapter {
        open_implicit_chapter(root, pending);
    }
    let chapter = root.children.last_mut().expect("chapter exists in state");
    let sink = match chapter.children.last_mut() {
        Some(section) => &mut section.body_lines,
        None => &mut chapter.body_lines,
    };
    sink.push(line.to_string());
}

fn open_implicit_chapter(root: &mut HeadingNode, pending: &mut Vec<String>) {
    let mut chapter = HeadingNode::new(HeadingLevel::Chapter, FALLBACK_CHAPTER_TITLE);
    chapter.body_lines = std::mem::take(pending);
    root.children.push(chapter);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_chapters_in_marker_order() {
        let outline = parse_outline("# T\n## Chapter 1\nBody A\n## Chapter 2\nBody B\n");
        assert_eq!(outline.title(), Some("T"));
        let chapters = outline.chapters();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Chapter 1");
        assert_eq!(chapters[0].body_lines, vec!["Body A"]);
        assert_eq!(chapters[1].title, "Chapter 2");
        assert_eq!(chapters[1].body_lines, vec!["Body B"]);
    }

    #[test]
    fn test_no_markers_collapses_to_single_chapter() {
        let text = "just some prose\n\nover two paragraphs\n";
        let outline = parse_outline(text);
        let chapters = outline.chapters();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, FALLBACK_CHAPTER_TITLE);
        assert_eq!(
            chapters[0].body_lines.join("\n"),
            "just some prose\n\nover two paragraphs"
        );
    }

    #[test]
    fn test_empty_input_still_yields_one_chapter() {
        let outline = parse_outline("");
        assert_eq!(outline.chapters().len(), 1);
        assert!(outline.chapters()[0].body_lines.is_empty());
    }

    #[test]
    fn test_content_before_first_chapter_marker() {
        let outline = parse_outline("intro paragraph\n## Real Chapter\nbody\n");
        let chapters = outline.chapters();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, FALLBACK_CHAPTER_TITLE);
        assert_eq!(chapters[0].body_lines, vec!["intro paragraph"]);
        assert_eq!(chapters[1].title, "Real Chapter");
    }

    #[test]
    fn test_blank_lines_alone_do_not_open_implicit_chapter() {
        let outline = parse_outline("# T\n\n\n## One\nbody\n");
        assert_eq!(outline.chapters().len(), 1);
        assert_eq!(outline.chapters()[0].title, "One");
    }

    #[test]
    fn test_section_without_chapter_is_not_an_error() {
        let outline = parse_outline("### Lonely Section\nsection body\n");
        let chapters = outline.chapters();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, FALLBACK_CHAPTER_TITLE);
        assert_eq!(chapters[0].children.len(), 1);
        assert_eq!(chapters[0].children[0].title, "Lonely Section");
        assert_eq!(chapters[0].children[0].body_lines, vec!["section body"]);
    }

    #[test]
    fn test_sections_nest_and_collect_following_lines() {
        let outline = parse_outline("## C\nlead\n### S1\none\n### S2\ntwo\n");
        let chapter = &outline.chapters()[0];
        assert_eq!(chapter.body_lines, vec!["lead"]);
        assert_eq!(chapter.children.len(), 2);
        assert_eq!(chapter.children[0].body_lines, vec!["one"]);
        assert_eq!(chapter.children[1].body_lines, vec!["two"]);
    }

    #[test]
    fn test_second_title_line_becomes_body() {
        let outline = parse_outline("# First\n# Second\n## One\nbody\n");
        let chapters = outline.chapters();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].body_lines, vec!["# Second"]);
    }

    #[test]
    fn test_deep_and_malformed_markers_are_body() {
        let outline = parse_outline("## C\n#### deep\n##nospace\n##\n");
        let chapter = &outline.chapters()[0];
        assert_eq!(chapter.body_lines, vec!["#### deep", "##nospace", "##"]);
    }

    #[test]
    fn test_chapter_markdown_reassembly() {
        let outline = parse_outline("## C\nlead\n\n### S\ninner\n");
        let md = outline.chapters()[0].chapter_markdown();
        assert_eq!(md, "lead\n\n### S\ninner\n");
    }
}
