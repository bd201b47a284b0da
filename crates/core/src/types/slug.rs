//! URL slugs for products and categories.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// No usable characters remain.
    #[error("slug cannot be empty")]
    Empty,
    /// The slug is longer than [`Slug::MAX_LENGTH`].
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The slug contains characters outside `[a-z0-9-]` or malformed dashes.
    #[error("slug may only contain lowercase letters, digits and single dashes")]
    InvalidCharacters,
}

/// A URL-safe identifier: lowercase ASCII alphanumerics separated by single
/// dashes, no leading or trailing dash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length.
    pub const MAX_LENGTH: usize = 120;

    /// Derive a slug from a human title.
    ///
    /// Non-alphanumeric runs collapse into a single dash and the result is
    /// truncated to [`Slug::MAX_LENGTH`] on a dash boundary where possible.
    ///
    /// ```
    /// use emporium_core::Slug;
    ///
    /// let slug = Slug::from_title("  Organic Cotton T-Shirt (Blue) ").unwrap();
    /// assert_eq!(slug.as_str(), "organic-cotton-t-shirt-blue");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the title has no ASCII alphanumerics.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(title.len());
        let mut pending_dash = false;

        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        if out.is_empty() {
            return Err(SlugError::Empty);
        }

        if out.len() > Self::MAX_LENGTH {
            out.truncate(Self::MAX_LENGTH);
            if let Some(pos) = out.rfind('-') {
                out.truncate(pos);
            }
        }

        Ok(Self(out))
    }

    /// Validate an existing slug without transforming it.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] if the input is not already a valid slug.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let valid_chars = s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_chars || s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::InvalidCharacters);
        }
        Ok(Self(s.to_owned()))
    }

    /// Append a numeric suffix, used when the base slug is already taken.
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_title_collapses_separators() {
        let slug = Slug::from_title("Hello,   World!! -- 2024").unwrap();
        assert_eq!(slug.as_str(), "hello-world-2024");
    }

    #[test]
    fn test_from_title_strips_non_ascii() {
        let slug = Slug::from_title("Café Crème").unwrap();
        assert_eq!(slug.as_str(), "caf-cr-me");
    }

    #[test]
    fn test_from_title_empty() {
        assert_eq!(Slug::from_title("!!!"), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_title_truncates_on_dash() {
        let title = "word ".repeat(40);
        let slug = Slug::from_title(&title).unwrap();
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
        assert!(Slug::parse(slug.as_str()).is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Slug::parse("valid-slug-1").is_ok());
        assert_eq!(Slug::parse("Upper"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("-lead"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("trail-"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("dou--ble"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
    }

    #[test]
    fn test_with_suffix() {
        let slug = Slug::parse("desk-lamp").unwrap();
        assert_eq!(slug.with_suffix(2).as_str(), "desk-lamp-2");
    }
}
