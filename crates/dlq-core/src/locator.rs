//! Resource identity used as the coalescing key.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Locator could not be parsed as an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid locator {input:?}: {reason}")]
pub struct LocatorError {
    pub input: String,
    pub reason: String,
}

/// Identity of a requested resource.
///
/// Two requests coalesce onto one download when their locators are equal.
/// Equality is on the normalized URL (`url` lowercases scheme and host and
/// adds a trailing `/` to an empty path), so `HTTP://Example.com` and
/// `http://example.com/` are the same resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator(String);

impl Locator {
    pub fn parse(input: &str) -> Result<Self, LocatorError> {
        let url = Url::parse(input.trim()).map_err(|e| LocatorError {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(LocatorError {
                input: input.to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }
        Ok(Self(url.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last non-empty path segment, if any (used for log lines and CLI output).
    pub fn file_name(&self) -> Option<&str> {
        let path = self.0.split(['?', '#']).next().unwrap_or("");
        let after_scheme = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
        let (_, path) = after_scheme.split_once('/')?;
        path.rsplit('/').find(|s| !s.is_empty())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Locator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scheme_host_and_empty_path() {
        let a = Locator::parse("HTTP://Example.COM").unwrap();
        let b = Locator::parse("http://example.com/").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "http://example.com/");
    }

    #[test]
    fn distinct_paths_are_distinct_locators() {
        let a = Locator::parse("https://cdn.test/a.png").unwrap();
        let b = Locator::parse("https://cdn.test/b.png").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_relative_and_opaque_inputs() {
        assert!(Locator::parse("images/a.png").is_err());
        assert!(Locator::parse("mailto:someone@example.com").is_err());
        let err = Locator::parse("").unwrap_err();
        assert_eq!(err.input, "");
    }

    #[test]
    fn file_name_is_last_path_segment() {
        let loc = Locator::parse("https://cdn.test/albums/7/cover.jpg?size=large").unwrap();
        assert_eq!(loc.file_name(), Some("cover.jpg"));
        let root = Locator::parse("https://cdn.test/").unwrap();
        assert_eq!(root.file_name(), None);
    }
}
