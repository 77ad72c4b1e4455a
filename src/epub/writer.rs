//! OCF package assembly.
//!
//! Writes the archive in the fixed order OCF wants: stored `mimetype` entry
//! first, then `META-INF/container.xml`, the package document, navigation
//! documents (both legacy NCX and EPUB 3 NAV — Kindle-class readers may rely
//! on either), stylesheet, chapter content files, and the cover image.

use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};

use tracing::debug;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::cover::CoverAsset;
use crate::error::{Error, Result};
use crate::metadata::BookMetadata;
use crate::util::escape_xml;

use super::CONTENT_DIR;

/// One rendered chapter, ready for packaging. Immutable once rendered;
/// `order_index` fixes its spine position.
#[derive(Debug, Clone)]
pub struct Chapter {
    pub order_index: usize,
    pub title: String,
    /// Unique content filename within the package (e.g. `chapter-one.xhtml`).
    pub filename: String,
    /// Complete XHTML content document.
    pub xhtml: String,
}

impl Chapter {
    fn manifest_id(&self) -> String {
        let stem = self.filename.trim_end_matches(".xhtml");
        let id: String = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("chap_{id}")
    }
}

/// Assemble the package in memory and return the archive bytes.
pub fn assemble_package(
    chapters: &[Chapter],
    cover: Option<&CoverAsset>,
    metadata: &BookMetadata,
) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    write_package(chapters, cover, metadata, &mut buf)?;
    Ok(buf.into_inner())
}

/// Write the package to any [`Write`] + [`Seek`] destination.
///
/// Fails only on I/O trouble or an internal invariant violation (empty
/// chapter list, duplicate manifest id) — the latter means an upstream stage
/// misbehaved and the conversion attempt is unrecoverable.
pub fn write_package<W: Write + Seek>(
    chapters: &[Chapter],
    cover: Option<&CoverAsset>,
    metadata: &BookMetadata,
    writer: W,
) -> Result<()> {
    if chapters.is_empty() {
        return Err(Error::Package(
            "no chapters to package (parser fallback failed)".into(),
        ));
    }

    let mut seen = HashSet::new();
    for chapter in chapters {
        if !seen.insert(chapter.manifest_id()) {
            return Err(Error::Package(format!(
                "duplicate manifest id '{}' for file '{}'",
                chapter.manifest_id(),
                chapter.filename
            )));
        }
    }

    debug!(
        chapters = chapters.len(),
        has_cover = cover.is_some(),
        "assembling package"
    );

    let mut zip = ZipWriter::new(writer);
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflated =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    // mimetype must be the first entry and must not be compressed.
    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    let opf = generate_opf(chapters, cover, metadata);
    zip.start_file(format!("{CONTENT_DIR}/content.opf"), deflated)?;
    zip.write_all(opf.as_bytes())?;

    let ncx = generate_ncx(chapters, metadata);
    zip.start_file(format!("{CONTENT_DIR}/toc.ncx"), deflated)?;
    zip.write_all(ncx.as_bytes())?;

    let nav = generate_nav(chapters, metadata);
    zip.start_file(format!("{CONTENT_DIR}/nav.xhtml"), deflated)?;
    zip.write_all(nav.as_bytes())?;

    zip.start_file(format!("{CONTENT_DIR}/style.css"), deflated)?;
    zip.write_all(STYLESHEET.as_bytes())?;

    for chapter in chapters {
        zip.start_file(format!("{CONTENT_DIR}/{}", chapter.filename), deflated)?;
        zip.write_all(chapter.xhtml.as_bytes())?;
    }

    if let Some(cover) = cover {
        zip.start_file(format!("{CONTENT_DIR}/{}", cover.filename()), deflated)?;
        zip.write_all(&cover.data)?;
    }

    zip.finish()?;
    Ok(())
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

fn generate_opf(
    chapters: &[Chapter],
    cover: Option<&CoverAsset>,
    metadata: &BookMetadata,
) -> String {
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
    );

    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        escape_xml(&metadata.identifier.package_value())
    ));
    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        escape_xml(&metadata.title)
    ));
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        escape_xml(&metadata.language)
    ));
    opf.push_str(&format!(
        "    <dc:creator>{}</dc:creator>\n",
        escape_xml(&metadata.author)
    ));

    if let Some(ref publisher) = metadata.publisher {
        opf.push_str(&format!(
            "    <dc:publisher>{}</dc:publisher>\n",
            escape_xml(publisher)
        ));
    }

    if let Some(date) = metadata.pub_date {
        opf.push_str(&format!(
            "    <dc:date>{}</dc:date>\n",
            date.format("%Y-%m-%d")
        ));
    }

    if let Some(ref description) = metadata.description {
        opf.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            escape_xml(description)
        ));
    }

    for keyword in &metadata.keywords {
        opf.push_str(&format!(
            "    <dc:subject>{}</dc:subject>\n",
            escape_xml(keyword)
        ));
    }

    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
    ));

    // EPUB 2 style cover meta; older Kindle tooling looks for it.
    if cover.is_some() {
        opf.push_str("    <meta name=\"cover\" content=\"cover-image\"/>\n");
    }

    opf.push_str("  </metadata>\n  <manifest>\n");
    opf.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
    );
    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    opf.push_str("    <item id=\"style\" href=\"style.css\" media-type=\"text/css\"/>\n");

    for chapter in chapters {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            chapter.manifest_id(),
            escape_xml(&chapter.filename)
        ));
    }

    if let Some(cover) = cover {
        opf.push_str(&format!(
            "    <item id=\"cover-image\" href=\"{}\" media-type=\"{}\" properties=\"cover-image\"/>\n",
            cover.filename(),
            cover.media_type
        ));
    }

    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
    opf.push_str("    <itemref idref=\"nav\"/>\n");
    for chapter in chapters {
        opf.push_str(&format!(
            "    <itemref idref=\"{}\"/>\n",
            chapter.manifest_id()
        ));
    }
    opf.push_str("  </spine>\n</package>\n");

    opf
}

fn generate_ncx(chapters: &[Chapter], metadata: &BookMetadata) -> String {
    let mut ncx = String::new();

    ncx.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content=""#,
    );
    ncx.push_str(&escape_xml(&metadata.identifier.package_value()));
    ncx.push_str(
        r#""/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>"#,
    );
    ncx.push_str(&escape_xml(&metadata.title));
    ncx.push_str("</text>\n  </docTitle>\n  <navMap>\n");

    for (play_order, chapter) in chapters.iter().enumerate() {
        let play_order = play_order + 1;
        ncx.push_str(&format!(
            "    <navPoint id=\"navpoint-{play_order}\" playOrder=\"{play_order}\">\n"
        ));
        ncx.push_str(&format!(
            "      <navLabel>\n        <text>{}</text>\n      </navLabel>\n",
            escape_xml(&chapter.title)
        ));
        ncx.push_str(&format!(
            "      <content src=\"{}\"/>\n    </navPoint>\n",
            escape_xml(&chapter.filename)
        ));
    }

    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

fn generate_nav(chapters: &[Chapter], metadata: &BookMetadata) -> String {
    let mut nav = String::new();

    nav.push_str(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head>
  <title>"#,
    );
    nav.push_str(&escape_xml(&metadata.title));
    nav.push_str(
        r#"</title>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>Table of Contents</h1>
    <ol>
"#,
    );

    for chapter in chapters {
        nav.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            escape_xml(&chapter.filename),
            escape_xml(&chapter.title)
        ));
    }

    nav.push_str("    </ol>\n  </nav>\n</body>\n</html>\n");
    nav
}

/// Default stylesheet linked from every chapter.
const STYLESHEET: &str = r#"body { font-family: serif; line-height: 1.6; margin: 2em; }
h1, h2 { color: #2c3e50; }
h3 { color: #7f8c8d; }
code { background-color: #f8f9fa; padding: 0.2em 0.4em; border-radius: 3px; }
pre { background-color: #f8f9fa; padding: 1em; border-radius: 5px; overflow-x: auto; }
blockquote { border-left: 4px solid #3498db; margin: 0; padding-left: 1em; }
"#;
