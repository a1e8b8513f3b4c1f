//! MIME content type handling.

use std::fmt;

/// MIME content type. Parameters are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg"). Empty when the header omits it.
    pub sub_type: String,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
        }
    }

    /// Checks if this is a `text/*` content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type == "text"
    }

    /// Checks if this is exactly `text/html`.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.is_text() && self.sub_type == "html"
    }

    /// Parses a content type header value.
    ///
    /// Format: `type/subtype; param1=value1; param2=value2`
    ///
    /// Type and subtype are lowercased and everything after the first `;`
    /// is ignored. Returns `None` for a blank value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let type_str = s.split(';').next()?.trim();
        let (main_type, sub_type) = type_str.split_once('/').unwrap_or((type_str, ""));
        let main_type = main_type.trim().to_lowercase();
        if main_type.is_empty() {
            return None;
        }

        Some(Self::new(main_type, sub_type.trim().to_lowercase()))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("text/plain; charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert!(ct.is_text());
        assert!(!ct.is_html());
    }

    #[test]
    fn test_content_type_parse_ignores_parameters() {
        let ct = ContentType::parse("Multipart/Mixed; boundary=\"----=_Part_123\"").unwrap();
        assert_eq!(ct, ContentType::new("multipart", "mixed"));
    }

    #[test]
    fn test_content_type_html() {
        assert!(ContentType::parse("TEXT/HTML").unwrap().is_html());
    }

    #[test]
    fn test_content_type_missing_subtype() {
        let ct = ContentType::parse("text").unwrap();
        assert!(ct.is_text());
        assert_eq!(ct.sub_type, "");
    }

    #[test]
    fn test_content_type_blank() {
        assert!(ContentType::parse("").is_none());
        assert!(ContentType::parse("  ; charset=utf-8").is_none());
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::parse("image/png; name=a.png").unwrap();
        assert_eq!(ct.to_string(), "image/png");
    }
}
