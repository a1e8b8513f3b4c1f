//! MIME header handling.

use std::collections::HashMap;

/// Collection of email headers.
///
/// Names are case-insensitive. Each name maps to every value it was given,
/// in the order the values appeared in the source document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        let value = value.into();
        self.headers.entry(name).or_default().push(value);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns true if the header is present with a non-blank value.
    #[must_use]
    pub fn has_value(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.trim().is_empty())
    }

    /// Parses a raw header block.
    ///
    /// Headers are in the format:
    /// ```text
    /// Header-Name: value
    ///  continuation line
    /// ```
    ///
    /// Folded lines are joined with a single space. Parsing stops at the
    /// first empty line. Lines that are neither a field nor a continuation
    /// are skipped.
    #[must_use]
    pub fn parse(block: &[u8]) -> Self {
        let text = String::from_utf8_lossy(block);
        let mut headers = Self::new();
        let mut current_name: Option<String> = None;
        let mut current_value = String::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            // Continuation line (starts with space or tab)
            if line.starts_with(' ') || line.starts_with('\t') {
                if current_name.is_some() {
                    current_value.push(' ');
                    current_value.push_str(line.trim());
                }
                continue;
            }

            if let Some(name) = current_name.take() {
                headers.add(name, current_value.trim().to_string());
                current_value.clear();
            }

            if let Some((name, value)) = line.split_once(':') {
                current_name = Some(name.trim().to_string());
                current_value = value.trim().to_string();
            }
        }

        if let Some(name) = current_name {
            headers.add(name, current_value.trim().to_string());
        }

        headers
    }

    /// Builds a header collection holding only the named headers.
    ///
    /// Values stay undecoded. Encoded words are decoded per field once the
    /// value has been split, so an encoded comma or bracket never acts as a
    /// separator.
    #[must_use]
    pub fn select<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut selected = Self::new();
        for name in names {
            for value in self.get_all(name) {
                selected.add(name, value);
            }
        }
        selected
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert_eq!(headers.get("subject"), None);
        assert!(headers.get_all("to").is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_multi_value_order() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("to", "bob@example.com");
        assert_eq!(
            headers.get_all("TO"),
            vec!["alice@example.com", "bob@example.com"]
        );
    }

    #[test]
    fn test_has_value() {
        let mut headers = Headers::new();
        headers.add("Content-Disposition", "  ");
        headers.add("Content-Id", "<abc>");
        assert!(!headers.has_value("content-disposition"));
        assert!(headers.has_value("content-id"));
        assert!(!headers.has_value("subject"));
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text.as_bytes());
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("To"), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(headers.get("Body"), None);
    }

    #[test]
    fn test_headers_parse_without_trailing_blank_line() {
        let headers = Headers::parse(b"Subject: Hi");
        assert_eq!(headers.get("subject"), Some("Hi"));
    }

    #[test]
    fn test_select_subset_keeps_raw_values() {
        let mut headers = Headers::new();
        headers.add("Subject", "=?utf-8?B?SMOpbGxv?=");
        headers.add("To", "a@example.com");
        headers.add("to", "b@example.com");
        headers.add("X-Mailer", "something");

        let selected = headers.select(["Subject", "To", "Cc"]);
        assert_eq!(selected.get("subject"), Some("=?utf-8?B?SMOpbGxv?="));
        assert_eq!(selected.get_all("to"), vec!["a@example.com", "b@example.com"]);
        assert_eq!(selected.get("x-mailer"), None);
        assert!(selected.get_all("cc").is_empty());
    }
}
