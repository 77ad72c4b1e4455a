//! Heading Parser properties: totality, fallback behavior, and marker-order
//! fidelity over generated manuscripts.

use bindery::outline::{FALLBACK_CHAPTER_TITLE, parse_outline};
use proptest::prelude::*;

proptest! {
    /// Zero chapter markers: exactly one chapter whose body is the full
    /// input.
    #[test]
    fn prop_no_markers_single_chapter(
        lines in prop::collection::vec("[a-zA-Z0-9 .,:;!?'()-]{0,40}", 0..30)
    ) {
        let text = lines.join("\n");
        let outline = parse_outline(&text);

        prop_assert_eq!(outline.chapters().len(), 1);
        prop_assert_eq!(outline.chapters()[0].title.as_str(), FALLBACK_CHAPTER_TITLE);
        prop_assert_eq!(
            outline.chapters()[0].body_lines.join("\n"),
            text.lines().collect::<Vec<_>>().join("\n")
        );
    }

    /// N well-formed markers: N chapters, in marker order.
    #[test]
    fn prop_marker_count_and_order(
        titles in prop::collection::vec("[a-zA-Z][a-zA-Z0-9 ]{0,20}", 1..12),
        body in "[a-zA-Z0-9 ]{0,40}"
    ) {
        let mut text = String::new();
        for title in &titles {
            text.push_str("## ");
            text.push_str(title);
            text.push('\n');
            text.push_str(&body);
            text.push('\n');
        }

        let outline = parse_outline(&text);
        prop_assert_eq!(outline.chapters().len(), titles.len());
        for (chapter, title) in outline.chapters().iter().zip(&titles) {
            prop_assert_eq!(&chapter.title, &title.trim().to_string());
        }
    }

    /// Parsing is total and deterministic over arbitrary text.
    #[test]
    fn prop_total_and_deterministic(text in "\\PC{0,500}") {
        let first = parse_outline(&text);
        let second = parse_outline(&text);
        prop_assert!(!first.chapters().is_empty());
        prop_assert_eq!(first.chapters(), second.chapters());
    }

    /// Every line of input ends up somewhere: no content is discarded.
    #[test]
    fn prop_nonblank_lines_preserved(
        lines in prop::collection::vec("[a-zA-Z0-9 #]{1,40}", 1..30)
    ) {
        let text = lines.join("\n");
        let outline = parse_outline(&text);

        let mut kept = 0usize;
        for chapter in outline.chapters() {
            kept += 1; // chapter heading line or synthetic title
            kept += chapter.body_lines.len();
            for section in &chapter.children {
                kept += 1;
                kept += section.body_lines.len();
            }
        }
        // Title line may be consumed into the root, chapters may be
        // synthetic; the counts can differ by at most one in either
        // direction.
        let total = text.lines().count();
        prop_assert!(kept + 1 >= total, "kept {kept} of {total} lines");
    }
}

#[test]
fn test_marker_order_scenario() {
    let outline = parse_outline("# T\n## Chapter 1\nBody A\n## Chapter 2\nBody B\n");
    let titles: Vec<_> = outline.chapters().iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Chapter 1", "Chapter 2"]);
}

#[test]
fn test_crlf_manuscripts() {
    let outline = parse_outline("## One\r\nbody line\r\n## Two\r\nmore\r\n");
    assert_eq!(outline.chapters().len(), 2);
    assert_eq!(outline.chapters()[0].title, "One");
}
