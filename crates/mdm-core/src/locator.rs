//! Source locators: raw text as typed, library-escaped form, and the
//! destination file name derived from the last path segment.

use std::fmt;

use thiserror::Error;

/// Schemes curl understands without being told; anything else gets `http://`.
const DEFAULT_SCHEME_PREFIX: &str = "http://";

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    /// Nothing usable was typed.
    #[error("empty locator")]
    Empty,
    /// The text does not parse as a URL.
    #[error("unparseable locator: {0}")]
    Unparseable(String),
}

/// A parsed source locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    raw: String,
    escaped: String,
    file_name: Option<String>,
}

impl Locator {
    /// Parses `raw` as typed by the user. Locators without a scheme are
    /// treated as `http://`. The file name is the percent-decoded, sanitized
    /// last path segment, or `None` when the path has no usable segment.
    pub fn parse(raw: &str) -> Result<Self, LocatorError> {
        let trimmed = raw.trim();
        if trimmed.len() <= 1 {
            return Err(LocatorError::Empty);
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("{}{}", DEFAULT_SCHEME_PREFIX, trimmed)
        };
        let url = url::Url::parse(&with_scheme)
            .map_err(|e| LocatorError::Unparseable(e.to_string()))?;

        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|last| {
                let decoded = urlencoding::decode(last)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| last.to_string());
                let name = sanitize_file_name(&decoded);
                if name.is_empty() {
                    None
                } else {
                    Some(name)
                }
            });

        Ok(Self {
            raw: trimmed.to_string(),
            escaped: url.to_string(),
            file_name,
        })
    }

    /// Text as entered; the identity used for duplicate detection.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Form handed to the transfer library.
    pub fn escaped(&self) -> &str {
        &self.escaped
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Makes `name` safe to use as a single path component on Linux.
///
/// Separators, NUL, and control characters become `_`; surrounding
/// whitespace is trimmed; `.` and `..` collapse to the empty string.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim();
    if trimmed == "." || trimmed == ".." {
        return String::new();
    }
    if trimmed.len() <= NAME_MAX {
        return trimmed.to_string();
    }
    let mut take = NAME_MAX;
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_from_last_segment() {
        let loc = Locator::parse("http://h/dir/a.bin").unwrap();
        assert_eq!(loc.raw(), "http://h/dir/a.bin");
        assert_eq!(loc.file_name(), Some("a.bin"));
        assert_eq!(loc.escaped(), "http://h/dir/a.bin");
    }

    #[test]
    fn escapes_for_library_and_decodes_for_disk() {
        let loc = Locator::parse("http://h/my file.iso").unwrap();
        assert_eq!(loc.escaped(), "http://h/my%20file.iso");
        assert_eq!(loc.file_name(), Some("my file.iso"));

        let pre = Locator::parse("http://h/my%20file.iso").unwrap();
        assert_eq!(pre.escaped(), "http://h/my%20file.iso");
        assert_eq!(pre.file_name(), Some("my file.iso"));
    }

    #[test]
    fn missing_scheme_defaults_to_http() {
        let loc = Locator::parse("example.com/pkg.deb").unwrap();
        assert_eq!(loc.escaped(), "http://example.com/pkg.deb");
        assert_eq!(loc.raw(), "example.com/pkg.deb");
        assert_eq!(loc.file_name(), Some("pkg.deb"));
    }

    #[test]
    fn no_path_segment_has_no_file_name() {
        assert_eq!(Locator::parse("http://h/").unwrap().file_name(), None);
        assert_eq!(Locator::parse("http://h").unwrap().file_name(), None);
        assert_eq!(Locator::parse("http://h/a/..").unwrap().file_name(), None);
    }

    #[test]
    fn query_is_not_part_of_file_name() {
        let loc = Locator::parse("https://h/file.zip?token=abc").unwrap();
        assert_eq!(loc.file_name(), Some("file.zip"));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!(Locator::parse(""), Err(LocatorError::Empty));
        assert_eq!(Locator::parse(" x "), Err(LocatorError::Empty));
        assert!(matches!(
            Locator::parse("http://[::1"),
            Err(LocatorError::Unparseable(_))
        ));
    }

    #[test]
    fn error_messages() {
        assert_eq!(LocatorError::Empty.to_string(), "empty locator");
        let e = LocatorError::Unparseable("invalid port number".into());
        assert_eq!(e.to_string(), "unparseable locator: invalid port number");
        let boxed: Box<dyn std::error::Error> = Box::new(e);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_file_name("a\\b\0c"), "a_b_c");
        assert_eq!(sanitize_file_name("  x.bin "), "x.bin");
        assert_eq!(sanitize_file_name(".."), "");
        assert_eq!(sanitize_file_name(&"y".repeat(300)).len(), NAME_MAX);
    }
}
