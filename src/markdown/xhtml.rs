//! Markdown → XHTML chapter rendering.
//!
//! Markdown parsing is delegated to pulldown-cmark; this module is a pure
//! writer over its event stream that emits strict, well-formed XHTML (EPUB
//! readers reject HTML-isms like unclosed `<br>`). Raw HTML embedded in the
//! Markdown goes through a sanitizer: allowlisted tags are re-emitted in
//! normalized XML form with filtered attributes, scripting containers are
//! dropped along with their contents, unclosed tags are closed at the end of
//! the fragment, and stray closing tags are discarded.

use std::fmt::Write as _;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::metadata::ContentType;
use crate::util::{escape_xml, escape_xml_attr};

/// Stylesheet href linked from every chapter document.
pub const STYLESHEET_HREF: &str = "style.css";

/// Render one chapter's Markdown body into a complete XHTML content
/// document.
///
/// The chapter title is emitted as an `<h2>` ahead of the rendered body,
/// mirroring its `## ` origin in the manuscript.
pub fn render_chapter(title: &str, markdown: &str, content_type: ContentType) -> String {
    let mut out = String::with_capacity(markdown.len() * 2 + 512);
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n");
    let _ = writeln!(out, "  <title>{}</title>", escape_xml(title));
    let _ = writeln!(
        out,
        "  <link rel=\"stylesheet\" type=\"text/css\" href=\"{STYLESHEET_HREF}\"/>"
    );
    out.push_str("</head>\n<body>\n");
    let _ = writeln!(out, "<h2>{}</h2>", escape_xml(title));

    let mut writer = XhtmlWriter::new(out, content_type);
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    for event in Parser::new_ext(markdown, options) {
        writer.event(event);
    }
    let mut out = writer.finish();

    out.push_str("</body>\n</html>\n");
    out
}

/// Pure event-stream writer. Owns the output buffer; [`finish`] closes any
/// raw HTML tags the manuscript left open.
///
/// [`finish`]: XhtmlWriter::finish
struct XhtmlWriter {
    out: String,
    content_type: ContentType,
    /// Alt-text accumulator while inside an image tag.
    image_alt: Option<String>,
    /// Nesting depth of links whose URL failed the scheme policy; their
    /// inner content is still emitted, the anchor itself is not.
    bad_link_depth: usize,
    /// Column alignments for the table currently being written.
    table_alignments: Vec<pulldown_cmark::Alignment>,
    table_cell_index: usize,
    in_table_head: bool,
    /// Open raw-HTML tags awaiting their closing tag.
    raw_open: Vec<&'static str>,
    /// When set, raw content is being skipped until this container closes.
    raw_skip_until: Option<&'static str>,
}

impl XhtmlWriter {
    fn new(out: String, content_type: ContentType) -> Self {
        Self {
            out,
            content_type,
            image_alt: None,
            bad_link_depth: 0,
            table_alignments: Vec::new(),
            table_cell_index: 0,
            in_table_head: false,
            raw_open: Vec::new(),
            raw_skip_until: None,
        }
    }

    fn finish(mut self) -> String {
        while let Some(tag) = self.raw_open.pop() {
            let _ = write!(self.out, "</{tag}>");
        }
        self.out
    }

    fn event(&mut self, event: Event<'_>) {
        // Inside an image, inner events only contribute alt text.
        if let Some(alt) = self.image_alt.as_mut() {
            match event {
                Event::End(TagEnd::Image) => self.end_image(),
                Event::Text(text) | Event::Code(text) => alt.push_str(&text),
                Event::SoftBreak | Event::HardBreak => alt.push(' '),
                _ => {}
            }
            return;
        }

        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.out.push_str(&escape_xml(&text)),
            Event::Code(code) => {
                let _ = write!(self.out, "<code>{}</code>", escape_xml(&code));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.raw_html(&html),
            Event::SoftBreak => match self.content_type {
                // Poetry keeps the manuscript's line breaks.
                ContentType::Poetry => self.out.push_str("<br/>\n"),
                ContentType::Prose => self.out.push('\n'),
            },
            Event::HardBreak => self.out.push_str("<br/>\n"),
            Event::Rule => self.out.push_str("<hr/>\n"),
            Event::FootnoteReference(name) => {
                let slug = footnote_id(&name);
                let _ = write!(
                    self.out,
                    "<sup class=\"footnote-ref\"><a href=\"#{slug}\">{}</a></sup>",
                    escape_xml(&name)
                );
            }
            // Task lists, math, etc. are not enabled.
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.out.push_str("<p>"),
            Tag::Heading { level, .. } => {
                let _ = write!(self.out, "<{}>", heading_name(level));
            }
            Tag::BlockQuote(_) => self.out.push_str("<blockquote>\n"),
            Tag::CodeBlock(kind) => match kind {
                CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                    let _ = write!(
                        self.out,
                        "<pre><code class=\"language-{}\">",
                        escape_xml_attr(&lang)
                    );
                }
                _ => self.out.push_str("<pre><code>"),
            },
            Tag::List(Some(1)) => self.out.push_str("<ol>\n"),
            Tag::List(Some(start)) => {
                let _ = writeln!(self.out, "<ol start=\"{start}\">");
            }
            Tag::List(None) => self.out.push_str("<ul>\n"),
            Tag::Item => self.out.push_str("<li>"),
            Tag::FootnoteDefinition(name) => {
                let _ = write!(
                    self.out,
                    "<div class=\"footnote\" id=\"{}\">",
                    footnote_id(&name)
                );
            }
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                self.out.push_str("<table>\n");
            }
            Tag::TableHead => {
                self.in_table_head = true;
                self.out.push_str("<thead>\n<tr>");
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                self.out.push_str("<tr>");
            }
            Tag::TableCell => {
                let tag = if self.in_table_head { "th" } else { "td" };
                match alignment_style(self.table_alignments.get(self.table_cell_index)) {
                    Some(style) => {
                        let _ = write!(self.out, "<{tag} style=\"{style}\">");
                    }
                    None => {
                        let _ = write!(self.out, "<{tag}>");
                    }
                }
            }
            Tag::Emphasis => self.out.push_str("<em>"),
            Tag::Strong => self.out.push_str("<strong>"),
            Tag::Strikethrough => self.out.push_str("<s>"),
            Tag::Link {
                dest_url, title, ..
            } => {
                if let Some(url) = safe_url(&dest_url) {
                    let _ = write!(self.out, "<a href=\"{}\"", escape_xml_attr(url));
                    if !title.is_empty() {
                        let _ = write!(self.out, " title=\"{}\"", escape_xml_attr(&title));
                    }
                    self.out.push('>');
                } else {
                    // Disallowed scheme: keep the link text, drop the anchor.
                    self.bad_link_depth += 1;
                }
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                match safe_url(&dest_url) {
                    Some(url) => {
                        let _ = write!(self.out, "<img src=\"{}\"", escape_xml_attr(url));
                        if !title.is_empty() {
                            let _ = write!(self.out, " title=\"{}\"", escape_xml_attr(&title));
                        }
                    }
                    None => self.out.push_str("<img"),
                }
                self.image_alt = Some(String::new());
            }
            Tag::HtmlBlock => {}
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.out.push_str("</p>\n"),
            TagEnd::Heading(level) => {
                let _ = writeln!(self.out, "</{}>", heading_name(level));
            }
            TagEnd::BlockQuote(_) => self.out.push_str("</blockquote>\n"),
            TagEnd::CodeBlock => self.out.push_str("</code></pre>\n"),
            TagEnd::List(true) => self.out.push_str("</ol>\n"),
            TagEnd::List(false) => self.out.push_str("</ul>\n"),
            TagEnd::Item => self.out.push_str("</li>\n"),
            TagEnd::FootnoteDefinition => self.out.push_str("</div>\n"),
            TagEnd::Table => self.out.push_str("</tbody>\n</table>\n"),
            TagEnd::TableHead => {
                self.in_table_head = false;
                self.out.push_str("</tr>\n</thead>\n<tbody>\n");
            }
            TagEnd::TableRow => self.out.push_str("</tr>\n"),
            TagEnd::TableCell => {
                let tag = if self.in_table_head { "th" } else { "td" };
                self.table_cell_index += 1;
                let _ = write!(self.out, "</{tag}>");
            }
            TagEnd::Emphasis => self.out.push_str("</em>"),
            TagEnd::Strong => self.out.push_str("</strong>"),
            TagEnd::Strikethrough => self.out.push_str("</s>"),
            TagEnd::Link => {
                if self.bad_link_depth > 0 {
                    self.bad_link_depth -= 1;
                } else {
                    self.out.push_str("</a>");
                }
            }
            TagEnd::Image => self.end_image(),
            TagEnd::HtmlBlock => {}
            _ => {}
        }
    }

    fn end_image(&mut self) {
        if let Some(alt) = self.image_alt.take() {
            let _ = write!(self.out, " alt=\"{}\"/>", escape_xml_attr(&alt));
        }
    }

    // ------------------------------------------------------------------
    // Raw HTML sanitization
    // ------------------------------------------------------------------

    fn raw_html(&mut self, chunk: &str) {
        let mut rest = chunk;
        loop {
            let Some(lt) = rest.find('<') else {
                self.raw_text(rest);
                return;
            };
            self.raw_text(&rest[..lt]);
            rest = &rest[lt..];

            if rest.starts_with("<!--") {
                // Comment: drop through the terminator (or everything, when
                // unterminated).
                match rest.find("-->") {
                    Some(end) => rest = &rest[end + 3..],
                    None => return,
                }
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                match rest.find('>') {
                    Some(end) => rest = &rest[end + 1..],
                    None => return,
                }
                continue;
            }

            let Some(gt) = rest.find('>') else {
                // Unterminated tag: nothing well-formed can be salvaged.
                return;
            };
            let tag_src = &rest[1..gt];
            rest = &rest[gt + 1..];
            self.raw_tag(tag_src);
        }
    }

    /// Text between raw tags: escaped and emitted, unless a scripting
    /// container is being skipped.
    fn raw_text(&mut self, text: &str) {
        if self.raw_skip_until.is_none() && !text.is_empty() {
            self.out.push_str(&escape_xml(text));
        }
    }

    /// Handle the inside of one `<...>` (without the angle brackets).
    fn raw_tag(&mut self, src: &str) {
        let closing = src.starts_with('/');
        let src = src.strip_prefix('/').unwrap_or(src);
        let self_closing = src.ends_with('/');
        let src = src.strip_suffix('/').unwrap_or(src);

        let name_end = src
            .find(|c: char| c.is_whitespace())
            .unwrap_or(src.len());
        let name = src[..name_end].to_ascii_lowercase();
        let attr_src = &src[name_end..];

        // Leaving a skipped container?
        if let Some(skip) = self.raw_skip_until {
            if closing && name == skip {
                self.raw_skip_until = None;
            }
            return;
        }

        let Some(name) = allowed_tag(&name) else {
            // Scripting containers are dropped with their contents; other
            // unknown tags are dropped alone.
            if !closing && !self_closing && matches!(name.as_str(), "script" | "style" | "iframe")
            {
                self.raw_skip_until = Some(match name.as_str() {
                    "script" => "script",
                    "style" => "style",
                    _ => "iframe",
                });
            }
            return;
        };

        if closing {
            // Close any inner tags left open, then this one; drop stray
            // closers entirely.
            if let Some(pos) = self.raw_open.iter().rposition(|&open| open == name) {
                while self.raw_open.len() > pos {
                    let tag = self.raw_open.pop().expect("stack non-empty");
                    let _ = write!(self.out, "</{tag}>");
                }
            }
            return;
        }

        let void = matches!(name, "br" | "hr" | "img");
        let _ = write!(self.out, "<{name}");
        self.raw_attributes(attr_src);
        if void || self_closing {
            self.out.push_str("/>");
        } else {
            self.out.push('>');
            self.raw_open.push(name);
        }
    }

    fn raw_attributes(&mut self, mut src: &str) {
        loop {
            src = src.trim_start();
            if src.is_empty() {
                return;
            }
            let name_end = src
                .find(|c: char| c.is_whitespace() || c == '=')
                .unwrap_or(src.len());
            let name = src[..name_end].to_ascii_lowercase();
            src = src[name_end..].trim_start();

            let value = if let Some(after_eq) = src.strip_prefix('=') {
                let after_eq = after_eq.trim_start();
                if let Some(quoted) = after_eq.strip_prefix('"') {
                    let end = quoted.find('"').unwrap_or(quoted.len());
                    src = &quoted[(end + 1).min(quoted.len())..];
                    Some(&quoted[..end])
                } else if let Some(quoted) = after_eq.strip_prefix('\'') {
                    let end = quoted.find('\'').unwrap_or(quoted.len());
                    src = &quoted[(end + 1).min(quoted.len())..];
                    Some(&quoted[..end])
                } else {
                    let end = after_eq
                        .find(|c: char| c.is_whitespace())
                        .unwrap_or(after_eq.len());
                    src = &after_eq[end..];
                    Some(&after_eq[..end])
                }
            } else {
                None
            };

            let Some(value) = value else { continue };
            if !ALLOWED_ATTRIBUTES.contains(&name.as_str()) {
                continue;
            }
            if (name == "href" || name == "src") && safe_url(value).is_none() {
                continue;
            }
            let _ = write!(self.out, " {name}=\"{}\"", escape_xml_attr(value));
        }
    }
}

const ALLOWED_ATTRIBUTES: &[&str] = &[
    "href", "src", "alt", "title", "id", "class", "colspan", "rowspan",
];

/// Map a raw tag name onto its canonical allowlisted form, or `None`.
fn allowed_tag(name: &str) -> Option<&'static str> {
    const ALLOWED: &[&str] = &[
        "p", "br", "hr", "em", "strong", "i", "b", "u", "s", "sub", "sup", "span", "div",
        "blockquote", "pre", "code", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li",
        "table", "thead", "tbody", "tr", "th", "td", "img", "a",
    ];
    ALLOWED.iter().find(|&&t| t == name).copied()
}

/// URL scheme policy for links and image sources: http(s), mailto, and
/// scheme-less (relative paths, fragments) pass; everything else is
/// rejected.
fn safe_url(url: &str) -> Option<&str> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    match url.split_once(':') {
        None => Some(url),
        Some((scheme, _)) => {
            // A ':' after '/', '?', or '#' is not a scheme separator.
            if scheme.contains(['/', '?', '#']) {
                return Some(url);
            }
            let scheme = scheme.to_ascii_lowercase();
            if matches!(scheme.as_str(), "http" | "https" | "mailto") {
                Some(url)
            } else {
                None
            }
        }
    }
}

fn heading_name(level: pulldown_cmark::HeadingLevel) -> &'static str {
    use pulldown_cmark::HeadingLevel::*;
    match level {
        H1 => "h1",
        H2 => "h2",
        H3 => "h3",
        H4 => "h4",
        H5 => "h5",
        H6 => "h6",
    }
}

fn footnote_id(name: &str) -> String {
    format!("fn-{}", super::slugify(name))
}

fn alignment_style(alignment: Option<&pulldown_cmark::Alignment>) -> Option<&'static str> {
    match alignment {
        Some(pulldown_cmark::Alignment::Left) => Some("text-align: left"),
        Some(pulldown_cmark::Alignment::Center) => Some("text-align: center"),
        Some(pulldown_cmark::Alignment::Right) => Some("text-align: right"),
        _ => None,
    }
}
