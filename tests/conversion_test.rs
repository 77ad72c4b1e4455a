//! End-to-end conversion scenarios: manuscript + metadata in, validated
//! archive out.

use bindery::{ContentType, Error, RawMetadata, convert, write_epub_file};

fn metadata() -> RawMetadata {
    RawMetadata {
        title: "Tome".into(),
        author: "Anon Writer".into(),
        language: "en".into(),
        ..Default::default()
    }
}

fn jpeg_cover(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 40, 120]));
    let mut buf = std::io::Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 85);
    img.write_with_encoder(encoder).unwrap();
    buf.into_inner()
}

#[test]
fn test_two_chapter_manuscript_round_trip() {
    let document = b"# T\n## Chapter 1\nBody A\n## Chapter 2\nBody B\n";
    let result = convert(document, &metadata(), None).expect("conversion should succeed");

    let report = &result.report;
    assert!(report.structure_ok);
    assert!(report.kindle_compatible);
    assert!(report.errors.is_empty());
    assert_eq!(report.info.chapter_count, 2);
    assert!(!report.info.has_cover);
    assert!(report.info.has_ncx);
    assert!(report.info.has_nav);
    assert!(
        report.warnings.iter().any(|w| w.contains("cover")),
        "expected a missing-cover warning, got {:?}",
        report.warnings
    );
}

#[test]
fn test_chapter_order_mirrors_marker_order() {
    let document = b"## Zebra\nlast alphabetically\n## Apple\nfirst alphabetically\n";
    let result = convert(document, &metadata(), None).unwrap();

    // The NCX mirrors spine order; Zebra must come first.
    let archive = result.epub;
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(&archive)).unwrap();
    let mut ncx = String::new();
    std::io::Read::read_to_string(&mut zip.by_name("OEBPS/toc.ncx").unwrap(), &mut ncx).unwrap();
    assert!(ncx.find("Zebra").unwrap() < ncx.find("Apple").unwrap());
}

#[test]
fn test_no_cover_yields_exactly_one_cover_warning_and_no_errors() {
    let result = convert(b"## One\nbody\n", &metadata(), None).unwrap();
    assert!(result.report.errors.is_empty());
    let cover_warnings = result
        .report
        .warnings
        .iter()
        .filter(|w| w.contains("cover"))
        .count();
    assert_eq!(cover_warnings, 1);
}

#[test]
fn test_empty_cover_input_treated_as_absent() {
    let result = convert(b"## One\nbody\n", &metadata(), Some(&[])).unwrap();
    assert!(!result.report.info.has_cover);
    assert!(result.report.errors.is_empty());
}

#[test]
fn test_with_cover_no_warning_and_cover_packaged() {
    let cover = jpeg_cover(800, 1200);
    let result = convert(b"## One\nbody\n", &metadata(), Some(&cover)).unwrap();
    assert!(result.report.kindle_compatible);
    assert!(result.report.info.has_cover);
    assert!(!result.report.warnings.iter().any(|w| w.contains("no cover")));

    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(&result.epub)).unwrap();
    assert!(zip.by_name("OEBPS/cover.jpg").is_ok());
}

#[test]
fn test_square_cover_gets_aspect_warning() {
    let cover = jpeg_cover(1200, 1200);
    let result = convert(b"## One\nbody\n", &metadata(), Some(&cover)).unwrap();
    assert!(result.report.kindle_compatible);
    assert!(
        result
            .report
            .warnings
            .iter()
            .any(|w| w.contains("aspect ratio"))
    );
}

#[test]
fn test_one_char_title_rejected_before_any_package_work() {
    let mut raw = metadata();
    raw.title = "A".into();
    let err = convert(b"## One\nbody\n", &raw, None).unwrap_err();
    match err {
        Error::Metadata(fields) => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "title");
        }
        other => panic!("expected metadata error, got {other}"),
    }
}

#[test]
fn test_invalid_cover_aborts_conversion() {
    let err = convert(b"## One\nbody\n", &metadata(), Some(b"GIF89a not allowed")).unwrap_err();
    assert!(matches!(err, Error::Cover(_)));
}

#[test]
fn test_identifier_is_isbn_when_supplied_uuid_otherwise() {
    let document = b"## One\nbody\n";

    let mut with_isbn = metadata();
    with_isbn.isbn = Some("978-0-13-468599-1".into());
    let result = convert(document, &with_isbn, None).unwrap();
    let opf = read_entry(&result.epub, "OEBPS/content.opf");
    assert!(opf.contains(">9780134685991</dc:identifier>"));
    assert!(!opf.contains("urn:uuid:"));

    let result = convert(document, &metadata(), None).unwrap();
    let opf = read_entry(&result.epub, "OEBPS/content.opf");
    assert!(opf.contains("urn:uuid:"));
    assert!(!opf.contains(">9780134685991<"));
}

#[test]
fn test_plain_text_manuscript_converts_as_single_chapter() {
    let document = b"Just a plain text file.\nNo headings anywhere.\n";
    let result = convert(document, &metadata(), None).unwrap();
    assert!(result.report.kindle_compatible);
    assert_eq!(result.report.info.chapter_count, 1);
}

#[test]
fn test_duplicate_chapter_titles_get_distinct_files() {
    let document = b"intro before any marker\n## Chapter 1\nthe real chapter 1\n";
    let result = convert(document, &metadata(), None).unwrap();
    assert!(result.report.kindle_compatible);
    assert_eq!(result.report.info.chapter_count, 2);

    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(&result.epub)).unwrap();
    assert!(zip.by_name("OEBPS/chapter-1.xhtml").is_ok());
    assert!(zip.by_name("OEBPS/chapter-1-2.xhtml").is_ok());
}

#[test]
fn test_windows_1252_manuscript_decodes() {
    // "## Caf\xe9\n..." with a Latin-1 e-acute.
    let document = b"## Caf\xe9\nun caf\xe9 por favor\n";
    let result = convert(document, &metadata(), None).unwrap();
    assert!(result.report.kindle_compatible);

    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(&result.epub)).unwrap();
    let name = zip
        .file_names()
        .find(|n| n.starts_with("OEBPS/cafe"))
        .map(str::to_string);
    assert_eq!(name.as_deref(), Some("OEBPS/cafe.xhtml"));
}

#[test]
fn test_poetry_mode_preserves_line_breaks() {
    let document = b"## Verse\nroses are red\nviolets are blue\n";

    let mut poetry = metadata();
    poetry.content_type = ContentType::Poetry;
    let result = convert(document, &poetry, None).unwrap();
    let chapter = read_entry(&result.epub, "OEBPS/verse.xhtml");
    assert!(chapter.contains("roses are red<br/>"));

    let result = convert(document, &metadata(), None).unwrap();
    let chapter = read_entry(&result.epub, "OEBPS/verse.xhtml");
    assert!(!chapter.contains("roses are red<br/>"));
}

#[test]
fn test_write_epub_file_persists_atomically() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("out.epub");

    let result = convert(b"## One\nbody\n", &metadata(), None).unwrap();
    write_epub_file(&result.epub, &path).unwrap();

    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, result.epub);
    // No leftover temp files.
    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

fn read_entry(epub: &[u8], name: &str) -> String {
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(epub)).unwrap();
    let mut content = String::new();
    std::io::Read::read_to_string(&mut zip.by_name(name).unwrap(), &mut content).unwrap();
    content
}
