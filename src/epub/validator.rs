//! Kindle-compatibility validation of an assembled archive.
//!
//! The validator re-opens the archive bytes from scratch and inspects them
//! the way a reader application would. Every check runs independently — a
//! failed check never short-circuits the rest — so the caller sees the
//! complete list of problems in one pass. Warnings (missing cover, missing
//! one navigation form, odd spine order) never block the archive; only
//! errors make a package Kindle-incompatible.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;
use zip::ZipArchive;

use crate::util::image_dimensions;

/// Where the package document was found inside the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub enum OpfLocation {
    Root,
    Oebps,
    Epub,
}

impl std::fmt::Display for OpfLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpfLocation::Root => write!(f, "root"),
            OpfLocation::Oebps => write!(f, "OEBPS/"),
            OpfLocation::Epub => write!(f, "EPUB/"),
        }
    }
}

/// Informational facts recorded alongside the pass/fail checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct ValidationInfo {
    pub file_count: usize,
    pub size_bytes: usize,
    pub chapter_count: usize,
    pub has_cover: bool,
    pub has_ncx: bool,
    pub has_nav: bool,
}

/// The structured result of one validation run. Produced fresh per run,
/// never mutated afterward.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct ValidationReport {
    /// Container descriptor and package document are both in place.
    pub structure_ok: bool,
    /// True iff there are zero errors (warnings permitted).
    pub kindle_compatible: bool,
    pub opf_location: Option<OpfLocation>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: ValidationInfo,
}

/// Accepted package-document paths, in probe order, when the container
/// descriptor is missing or unhelpful.
const OPF_CANDIDATES: &[(&str, OpfLocation)] = &[
    ("content.opf", OpfLocation::Root),
    ("OEBPS/content.opf", OpfLocation::Oebps),
    ("EPUB/content.opf", OpfLocation::Epub),
];

/// Validate archive bytes against the Kindle-compatibility rule set.
pub fn validate_package(bytes: &[u8]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut info = ValidationInfo {
        size_bytes: bytes.len(),
        ..Default::default()
    };

    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => {
            errors.push(format!("not a readable ZIP/OCF container: {e}"));
            return ValidationReport {
                structure_ok: false,
                kindle_compatible: false,
                opf_location: None,
                errors,
                warnings,
                info,
            };
        }
    };
    info.file_count = archive.len();

    // Mandatory container descriptor at the fixed path.
    let container = read_file(&mut archive, "META-INF/container.xml");
    let container_ok = container.is_some();
    if !container_ok {
        errors.push("missing META-INF/container.xml".into());
    }

    // Supplementary: the stored mimetype entry.
    match read_file(&mut archive, "mimetype") {
        Some(content) if content.trim() == "application/epub+zip" => {}
        Some(_) => warnings.push("mimetype entry is not 'application/epub+zip'".into()),
        None => warnings.push("missing mimetype entry".into()),
    }

    // Package document at a declared or conventional location.
    let declared = container.as_deref().and_then(container_rootfile);
    let located = locate_opf(&mut archive, declared.as_deref());
    let opf_location = located.as_ref().map(|(_, loc, _)| *loc);
    if located.is_none() {
        errors.push(
            "no package document at content.opf, OEBPS/content.opf, or EPUB/content.opf".into(),
        );
    }

    if let Some((opf_path, location, opf_content)) = located {
        debug!(%opf_path, %location, "validating package document");
        let opf = parse_opf(&opf_content);
        let opf_dir = opf_path
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();

        for id in &opf.duplicate_ids {
            errors.push(format!("duplicate manifest id '{id}'"));
        }

        // Both navigation forms present.
        let ncx_item = opf
            .manifest
            .values()
            .find(|item| item.media_type == "application/x-dtbncx+xml");
        let nav_item = opf.manifest.values().find(|item| item.has_property("nav"));
        info.has_ncx =
            ncx_item.is_some_and(|item| file_exists(&mut archive, &opf_dir, &item.href));
        info.has_nav =
            nav_item.is_some_and(|item| file_exists(&mut archive, &opf_dir, &item.href));
        if !info.has_ncx {
            warnings.push("missing legacy NCX navigation document".into());
        }
        if !info.has_nav {
            warnings.push("missing EPUB 3 NAV navigation document".into());
        }

        // Spine starts with the navigation document.
        match opf.spine.first() {
            Some(first)
                if opf
                    .manifest
                    .get(first)
                    .is_some_and(|item| item.has_property("nav")) => {}
            _ => warnings.push("spine does not list the navigation document first".into()),
        }

        // Manifest hrefs all present, spine idrefs all resolve.
        for (id, item) in sorted_manifest(&opf.manifest) {
            if !file_exists(&mut archive, &opf_dir, &item.href) {
                errors.push(format!(
                    "manifest item '{id}' references missing file '{}'",
                    item.href
                ));
            }
        }
        for idref in &opf.spine {
            if !opf.manifest.contains_key(idref) {
                errors.push(format!(
                    "spine idref '{idref}' does not resolve to a manifest item"
                ));
            }
        }

        // Cover presence and (when present) plausible aspect ratio.
        let cover_item = opf
            .manifest
            .values()
            .find(|item| item.has_property("cover-image"))
            .or_else(|| {
                opf.cover_meta_id
                    .as_ref()
                    .and_then(|id| opf.manifest.get(id))
            });
        match cover_item {
            Some(item) => {
                let path = resolve_path(&opf_dir, &item.href);
                match read_file_bytes(&mut archive, &path) {
                    Some(data) => {
                        info.has_cover = true;
                        if let Some((width, height)) = image_dimensions(&data)
                            && !aspect_ratio_ok(width, height)
                        {
                            warnings.push(format!(
                                "cover aspect ratio {width}x{height} is far from the conventional 2:3"
                            ));
                        }
                    }
                    None => errors.push(format!(
                        "cover image '{}' missing from archive",
                        item.href
                    )),
                }
            }
            None => warnings.push("no cover image".into()),
        }

        // Chapter count (spine content documents, nav excluded).
        info.chapter_count = opf
            .spine
            .iter()
            .filter_map(|id| opf.manifest.get(id))
            .filter(|item| {
                item.media_type == "application/xhtml+xml" && !item.has_property("nav")
            })
            .count();
    }

    let structure_ok = container_ok && opf_location.is_some();
    ValidationReport {
        structure_ok,
        kindle_compatible: errors.is_empty(),
        opf_location,
        errors,
        warnings,
        info,
    }
}

struct ManifestItem {
    href: String,
    media_type: String,
    properties: Option<String>,
}

impl ManifestItem {
    fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_ref()
            .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == property))
    }
}

struct OpfData {
    manifest: HashMap<String, ManifestItem>,
    duplicate_ids: Vec<String>,
    spine: Vec<String>,
    /// EPUB 2 `<meta name="cover" content="..."/>` manifest id.
    cover_meta_id: Option<String>,
}

/// Extract the rootfile path from container.xml. Returns `None` on malformed
/// XML — the conventional locations are probed regardless.
fn container_rootfile(container: &str) -> Option<String> {
    let mut reader = Reader::from_str(container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return String::from_utf8(attr.value.to_vec()).ok();
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

fn locate_opf<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    declared: Option<&str>,
) -> Option<(String, OpfLocation, String)> {
    if let Some(path) = declared
        && let Some(content) = read_file(archive, path)
    {
        let location = if !path.contains('/') {
            OpfLocation::Root
        } else if path.starts_with("OEBPS/") {
            OpfLocation::Oebps
        } else if path.starts_with("EPUB/") {
            OpfLocation::Epub
        } else {
            // Unconventional but resolvable; closest to a rooted layout.
            OpfLocation::Root
        };
        return Some((path.to_string(), location, content));
    }

    for (path, location) in OPF_CANDIDATES {
        if let Some(content) = read_file(archive, path) {
            return Some((path.to_string(), *location, content));
        }
    }
    None
}

/// Parse the parts of the package document the checks need: manifest items,
/// spine order, and the EPUB 2 cover meta. Tolerant of malformed XML — it
/// extracts what it can.
fn parse_opf(content: &str) -> OpfData {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut data = OpfData {
        manifest: HashMap::new(),
        duplicate_ids: Vec::new(),
        spine: Vec::new(),
        cover_meta_id: None,
    };

    loop {
        let event = match reader.read_event() {
            Ok(Event::Eof) | Err(_) => break,
            Ok(event) => event,
        };
        let (Event::Empty(e) | Event::Start(e)) = event else {
            continue;
        };

        match local_name(e.name().as_ref()) {
            b"item" => {
                let mut id = None;
                let mut href = String::new();
                let mut media_type = String::new();
                let mut properties = None;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"id" => id = Some(value),
                        b"href" => href = value,
                        b"media-type" => media_type = value,
                        b"properties" => properties = Some(value),
                        _ => {}
                    }
                }
                if let Some(id) = id {
                    let item = ManifestItem {
                        href,
                        media_type,
                        properties,
                    };
                    if data.manifest.insert(id.clone(), item).is_some() {
                        data.duplicate_ids.push(id);
                    }
                }
            }
            b"itemref" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"idref" {
                        data.spine
                            .push(String::from_utf8_lossy(&attr.value).into_owned());
                    }
                }
            }
            b"meta" => {
                let mut is_cover = false;
                let mut content_id = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" if attr.value.as_ref() == b"cover" => is_cover = true,
                        b"content" => {
                            content_id = Some(String::from_utf8_lossy(&attr.value).into_owned());
                        }
                        _ => {}
                    }
                }
                if is_cover && data.cover_meta_id.is_none() {
                    data.cover_meta_id = content_id;
                }
            }
            _ => {}
        }
    }

    data
}

fn sorted_manifest(manifest: &HashMap<String, ManifestItem>) -> Vec<(&String, &ManifestItem)> {
    let mut items: Vec<_> = manifest.iter().collect();
    items.sort_by_key(|(id, _)| id.as_str());
    items
}

fn file_exists<R: Read + Seek>(archive: &mut ZipArchive<R>, opf_dir: &str, href: &str) -> bool {
    read_file_bytes(archive, &resolve_path(opf_dir, href)).is_some()
}

fn read_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<String> {
    let bytes = read_file_bytes(archive, path)?;
    let bytes = strip_bom(&bytes);
    String::from_utf8(bytes.to_vec()).ok()
}

fn read_file_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<Vec<u8>> {
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents).ok()?;
            return Some(contents);
        }
        Err(zip::result::ZipError::FileNotFound) => {}
        Err(_) => return None,
    }

    // Percent-decoded fallback for hrefs written in URL form.
    let decoded = percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .ok()?;
    let mut file = archive.by_name(&decoded).ok()?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).ok()?;
    Some(contents)
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

fn resolve_path(base: &str, href: &str) -> String {
    if base.is_empty() {
        href.to_string()
    } else {
        format!("{base}/{href}")
    }
}

/// Extract the local name from a potentially namespaced XML name.
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Conventional book covers sit near 2:3; ±15% is tolerated before warning.
fn aspect_ratio_ok(width: u32, height: u32) -> bool {
    if height == 0 {
        return false;
    }
    let ratio = width as f64 / height as f64;
    let ideal = 2.0 / 3.0;
    (ratio - ideal).abs() <= ideal * 0.15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"opf:item"), b"item");
        assert_eq!(local_name(b"item"), b"item");
    }

    #[test]
    fn test_aspect_ratio_tolerance() {
        assert!(aspect_ratio_ok(800, 1200));
        assert!(aspect_ratio_ok(700, 1200));
        assert!(!aspect_ratio_ok(1200, 1200));
        assert!(!aspect_ratio_ok(400, 1200));
        assert!(!aspect_ratio_ok(10, 0));
    }

    #[test]
    fn test_container_rootfile_extraction() {
        let container = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="EPUB/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;
        assert_eq!(
            container_rootfile(container).as_deref(),
            Some("EPUB/content.opf")
        );
        assert_eq!(container_rootfile("<not-xml"), None);
    }

    #[test]
    fn test_garbage_bytes_fail_with_error() {
        let report = validate_package(b"not a zip archive");
        assert!(!report.structure_ok);
        assert!(!report.kindle_compatible);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_parse_opf_duplicates_and_spine() {
        let opf = r#"<package><manifest>
            <item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
            <item id="a" href="b.xhtml" media-type="application/xhtml+xml"/>
        </manifest><spine><itemref idref="a"/><itemref idref="ghost"/></spine></package>"#;
        let data = parse_opf(opf);
        assert_eq!(data.duplicate_ids, vec!["a"]);
        assert_eq!(data.spine, vec!["a", "ghost"]);
    }
}
