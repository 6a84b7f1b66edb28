//! Content type detection for bodies served unmodified.
//!
//! Checks run in a fixed order and stop at the first hit, so a document that
//! starts with `<` is classified as markup even when it also contains `=` and `&`.

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml; charset=utf-8";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

const XML_MARKERS: [&str; 2] = ["<soap:", "<rss"];
const HTML_MARKERS: [&str; 4] = ["<html", "<!doctype html", "<head>", "<body>"];

/// Best-guess MIME type for raw body bytes.
pub fn detect_content_type(body: &[u8]) -> &'static str {
    let trimmed = body.trim_ascii();

    let (Some(&first), Some(&last)) = (trimmed.first(), trimmed.last()) else {
        return TEXT_PLAIN;
    };

    if matches!((first, last), (b'{', b'}') | (b'[', b']'))
        && serde_json::from_slice::<serde::de::IgnoredAny>(trimmed).is_ok()
    {
        return APPLICATION_JSON;
    }

    if first == b'<' {
        return classify_markup(trimmed);
    }

    if trimmed.starts_with(b"data:") {
        return TEXT_PLAIN;
    }

    if trimmed.contains(&b'=') && trimmed.contains(&b'&') {
        return FORM_URLENCODED;
    }

    TEXT_PLAIN
}

fn classify_markup(trimmed: &[u8]) -> &'static str {
    let lower = String::from_utf8_lossy(trimmed).to_lowercase();

    if lower.starts_with("<?xml") || XML_MARKERS.iter().any(|m| lower.contains(m)) {
        return APPLICATION_XML;
    }
    if HTML_MARKERS.iter().any(|m| lower.contains(m)) {
        return TEXT_HTML;
    }
    APPLICATION_XML
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(detect_content_type(b""), TEXT_PLAIN);
        assert_eq!(detect_content_type(b" \r\n\t "), TEXT_PLAIN);
    }

    #[test]
    fn test_json_objects_and_arrays() {
        assert_eq!(detect_content_type(b"{\"a\":1}"), APPLICATION_JSON);
        assert_eq!(detect_content_type(b"  [1, 2, {\"b\": null}]\n"), APPLICATION_JSON);
    }

    #[test]
    fn test_json_lookalike_falls_through() {
        // Braces match but the content is not JSON.
        assert_eq!(detect_content_type(b"{not json}"), TEXT_PLAIN);
        assert_eq!(detect_content_type(b"{a=1&b=2}"), FORM_URLENCODED);
    }

    #[test]
    fn test_xml_variants() {
        assert_eq!(detect_content_type(b"<?xml version=\"1.0\"?><a/>"), APPLICATION_XML);
        assert_eq!(detect_content_type(b"<?XML version=\"1.0\"?><a/>"), APPLICATION_XML);
        assert_eq!(detect_content_type(b"<soap:Envelope></soap:Envelope>"), APPLICATION_XML);
        assert_eq!(detect_content_type(b"<rss version=\"2.0\"></rss>"), APPLICATION_XML);
        assert_eq!(detect_content_type(b"<result>x</result>"), APPLICATION_XML);
    }

    #[test]
    fn test_html_variants() {
        assert_eq!(detect_content_type(b"<!DOCTYPE html><html></html>"), TEXT_HTML);
        assert_eq!(detect_content_type(b"<HTML><BODY>hi</BODY></HTML>"), TEXT_HTML);
        assert_eq!(detect_content_type(b"<div><head></head></div>"), TEXT_HTML);
    }

    #[test]
    fn test_xml_wins_over_html_markers() {
        assert_eq!(
            detect_content_type(b"<?xml version=\"1.0\"?><html></html>"),
            APPLICATION_XML
        );
    }

    #[test]
    fn test_markup_wins_over_form_encoding() {
        assert_eq!(detect_content_type(b"<item a=\"1&amp;2\"/>"), APPLICATION_XML);
        assert_eq!(detect_content_type(b"<?xml version=\"1.0\"?><q>a=1&b=2</q>"), APPLICATION_XML);
    }

    #[test]
    fn test_data_prefix() {
        assert_eq!(detect_content_type(b"data: {\"x\":1}&y=2"), TEXT_PLAIN);
    }

    #[test]
    fn test_form_urlencoded() {
        assert_eq!(detect_content_type(b"a=1&b=2"), FORM_URLENCODED);
        assert_eq!(detect_content_type(b"a=1"), TEXT_PLAIN);
    }

    #[test]
    fn test_plain_text_default() {
        assert_eq!(detect_content_type(b"hello world"), TEXT_PLAIN);
    }
}
