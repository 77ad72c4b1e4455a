//! Shared helpers: text decoding, XML escaping, image header sniffing.

use std::borrow::Cow;

/// Decode manuscript bytes to a string, handling various encodings.
///
/// 1. Tries UTF-8 first (BOM handled automatically by encoding_rs)
/// 2. If malformed, tries the declared encoding, when one was supplied
/// 3. Falls back to Windows-1252 (common for plain-text manuscripts)
///
/// Returns `Cow<str>` to avoid allocation when the input is already valid
/// UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], declared_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return result;
    }

    if let Some(name) = declared_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Escape text content for XML/XHTML output.
///
/// Uses a memchr fast path: input without `&`, `<`, or `>` is returned
/// without allocating.
pub fn escape_xml(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let Some(first) = memchr::memchr3(b'&', b'<', b'>', bytes) else {
        return Cow::Borrowed(text);
    };

    let mut out = String::with_capacity(text.len() + 8);
    out.push_str(&text[..first]);
    for c in text[first..].chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Escape an XML attribute value (quotes included, for double-quoted
/// attributes).
pub fn escape_xml_attr(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    if memchr::memchr3(b'&', b'<', b'>', bytes).is_none()
        && memchr::memchr2(b'"', b'\'', bytes).is_none()
    {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Extract pixel dimensions from raw image bytes without decoding pixels.
///
/// Supports the two formats this crate packages (PNG and JPEG). Returns
/// `(width, height)` or `None` if the header is unrecognized.
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    // PNG: width/height at bytes 16-23 of the IHDR chunk
    if data.len() >= 24 && data.starts_with(&[0x89, b'P', b'N', b'G']) {
        let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
        let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
        return Some((width, height));
    }

    // JPEG: scan for an SOF marker
    if data.len() >= 4 && data[0] == 0xFF && data[1] == 0xD8 {
        return jpeg_dimensions(data);
    }

    None
}

fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 4 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }

        let marker = data[i + 1];

        // SOF0..SOF15 excluding DHT/JPG/DAC (C4, C8, CC)
        if matches!(
            marker,
            0xC0 | 0xC1 | 0xC2 | 0xC3 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE
                | 0xCF
        ) && i + 9 < data.len()
        {
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
            return Some((width, height));
        }

        if i + 3 < data.len() {
            let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            i += 2 + length;
        } else {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_passthrough() {
        let text = "Capítulo uno: ¡hola!";
        assert_eq!(decode_text(text.as_bytes(), None), text);
    }

    #[test]
    fn test_decode_windows_1252_fallback() {
        // 0xE9 is 'é' in Windows-1252 but malformed UTF-8
        let bytes = b"caf\xe9";
        assert_eq!(decode_text(bytes, None), "café");
    }

    #[test]
    fn test_decode_with_declared_encoding() {
        let bytes = b"caf\xe9";
        assert_eq!(decode_text(bytes, Some("iso-8859-1")), "café");
    }

    #[test]
    fn test_escape_xml_borrowed_when_clean() {
        assert!(matches!(escape_xml("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_xml_entities() {
        assert_eq!(escape_xml("a < b & c > d"), "a &lt; b &amp; c &gt; d");
        assert_eq!(escape_xml_attr(r#"say "hi""#), "say &quot;hi&quot;");
    }

    #[test]
    fn test_png_dimensions() {
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.extend_from_slice(&[0, 0, 0, 13]);
        png.extend_from_slice(b"IHDR");
        png.extend_from_slice(&800u32.to_be_bytes());
        png.extend_from_slice(&1200u32.to_be_bytes());
        assert_eq!(image_dimensions(&png), Some((800, 1200)));
    }

    #[test]
    fn test_unrecognized_header() {
        assert_eq!(image_dimensions(b"not an image at all, sorry"), None);
    }
}
