use std::sync::OnceLock;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, GBK, REPLACEMENT, WINDOWS_1252};
use regex::Regex;

pub const DEFAULT_META_SCAN_LIMIT: usize = 64 * 1024;

/// What to use when neither a BOM, the header nor a meta tag names a charset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackEncoding {
    Fixed(&'static Encoding),
    /// Statistical detection over the whole body.
    Sniff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeSettings {
    pub fallback: FallbackEncoding,
    /// How many leading bytes are scanned for a `<meta>` charset declaration.
    pub meta_scan_limit: usize,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            fallback: FallbackEncoding::Fixed(GBK),
            meta_scan_limit: DEFAULT_META_SCAN_LIMIT,
        }
    }
}

/// Which resolution step picked the charset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetSource {
    Bom,
    ContentType,
    Meta,
    Fallback,
    Sniffed,
    /// Already text when it arrived, from the render fallback.
    Rendered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDocument {
    pub text: String,
    pub encoding: &'static Encoding,
    pub source: CharsetSource,
    /// Invalid sequences were replaced with U+FFFD.
    pub had_replacements: bool,
}

impl DecodedDocument {
    pub fn charset(&self) -> &'static str {
        self.encoding.name()
    }
}

/// Decode raw bytes using: BOM -> Content-Type charset -> meta charset -> fallback.
///
/// Never fails; malformed input is decoded with replacement characters.
pub fn decode(bytes: &[u8], content_type: Option<&str>, settings: &DecodeSettings) -> DecodedDocument {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(&bytes[bom_len..], encoding, CharsetSource::Bom);
    }

    if let Some(encoding) = content_type
        .and_then(charset_param)
        .and_then(|label| supported(&label))
    {
        return decode_with(bytes, encoding, CharsetSource::ContentType);
    }

    if let Some(encoding) = meta_charset(bytes, settings.meta_scan_limit) {
        return decode_with(bytes, encoding, CharsetSource::Meta);
    }

    match settings.fallback {
        FallbackEncoding::Fixed(encoding) => decode_with(bytes, encoding, CharsetSource::Fallback),
        FallbackEncoding::Sniff => {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            let encoding = detector.guess(None, true);
            decode_with(bytes, encoding, CharsetSource::Sniffed)
        }
    }
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding, source: CharsetSource) -> DecodedDocument {
    let (text, had_replacements) = encoding.decode_without_bom_handling(bytes);
    forum_logging::forum_trace!(
        "decoded {} bytes as {} via {:?}",
        bytes.len(),
        encoding.name(),
        source
    );
    DecodedDocument {
        text: text.into_owned(),
        encoding,
        source,
        had_replacements,
    }
}

/// Resolve a label through WHATWG folding; the replacement encoding counts as unsupported.
fn supported(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).filter(|encoding| *encoding != REPLACEMENT)
}

pub(crate) fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (name, value) = part.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(['"', '\'']).trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn meta_charset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<meta\b[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:\-]+)"#)
            .expect("valid meta charset pattern")
    })
}

fn meta_charset(bytes: &[u8], limit: usize) -> Option<&'static Encoding> {
    let prefix = &bytes[..bytes.len().min(limit)];
    // Every byte maps to one char, so the ASCII markup survives whatever the real charset is.
    let (latin, _) = WINDOWS_1252.decode_without_bom_handling(prefix);
    meta_charset_pattern()
        .captures_iter(&latin)
        .filter_map(|caps| caps.get(1))
        .find_map(|label| supported(label.as_str()))
        // A UTF-16 declaration in ASCII-compatible bytes means UTF-8.
        .map(Encoding::output_encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_param_is_case_insensitive_and_unquoted() {
        assert_eq!(
            charset_param("text/html; Charset=\"GB2312\"").as_deref(),
            Some("GB2312")
        );
        assert_eq!(charset_param("text/html;charset='utf-8'").as_deref(), Some("utf-8"));
        assert_eq!(charset_param("text/html"), None);
        assert_eq!(charset_param("text/html; charset="), None);
    }

    #[test]
    fn meta_declarations_in_both_forms() {
        let short = b"<html><head><meta charset=\"gbk\"></head>";
        assert_eq!(meta_charset(short, 1024), Some(GBK));

        let long = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=gb2312\" />";
        assert_eq!(meta_charset(long, 1024), Some(GBK));
    }

    #[test]
    fn meta_utf16_means_utf8() {
        let html = b"<meta charset=\"utf-16\">";
        assert_eq!(meta_charset(html, 1024), Some(encoding_rs::UTF_8));
    }

    #[test]
    fn meta_scan_stops_at_limit() {
        let mut html = vec![b' '; 100];
        html.extend_from_slice(b"<meta charset=\"gbk\">");
        assert_eq!(meta_charset(&html, 50), None);
    }

    #[test]
    fn unknown_labels_fall_through() {
        assert_eq!(supported("no-such-charset"), None);
        assert_eq!(supported("iso-2022-kr"), None);
        assert_eq!(supported("utf8"), Some(encoding_rs::UTF_8));
    }
}
