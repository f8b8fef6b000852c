//! Dotted property paths.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Synthetic property naming the primary key of the class it is applied to.
pub const PRIMARY_KEY: &str = "__PrimaryKey";

/// A `.`-separated property path such as `Department.Manager.Name`.
///
/// Every non-final segment must name a master or detail property; the final
/// segment names a leaf property or [`PRIMARY_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    /// Parse a dotted path, rejecting empty paths and empty segments.
    pub fn parse(path: &str) -> Result<Self, Error> {
        if path.is_empty() {
            return Err(Error::InvalidPathSyntax {
                path: path.to_string(),
                reason: "path is empty",
            });
        }

        let mut segments = Vec::new();
        for segment in path.split('.') {
            if segment.is_empty() {
                return Err(Error::InvalidPathSyntax {
                    path: path.to_string(),
                    reason: "empty segment",
                });
            }
            if segment.chars().any(char::is_whitespace) {
                return Err(Error::InvalidPathSyntax {
                    path: path.to_string(),
                    reason: "whitespace in segment",
                });
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    /// Path consisting of a single property.
    pub fn single(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        Self::parse(&name)
    }

    /// The path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; a parsed path has at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Check if the path has no master prefix.
    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }

    /// The leaf segment.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// The first segment.
    pub fn head(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }

    /// The master prefix (`Department.Manager` for `Department.Manager.Name`).
    pub fn parent(&self) -> Option<PropertyPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Dotted text of the first `count` segments.
    pub fn prefix(&self, count: usize) -> String {
        self.segments[..count.min(self.segments.len())].join(".")
    }

    /// Split off the first segment, returning the remainder if any.
    pub fn split_first(&self) -> (&str, Option<PropertyPath>) {
        let rest = if self.segments.len() > 1 {
            Some(Self {
                segments: self.segments[1..].to_vec(),
            })
        } else {
            None
        };
        (self.head(), rest)
    }

    /// Check if the leaf is the synthetic primary key.
    pub fn ends_with_primary_key(&self) -> bool {
        self.leaf() == PRIMARY_KEY
    }

    /// Append a segment.
    pub fn join(&self, segment: impl Into<String>) -> Result<Self, Error> {
        let segment = segment.into();
        let mut joined = self.to_string();
        joined.push('.');
        joined.push_str(&segment);
        Self::parse(&joined)
    }

    /// Drop a trailing `__PrimaryKey` segment, keeping at least one segment.
    pub fn without_primary_key(&self) -> Self {
        if self.ends_with_primary_key() && self.segments.len() > 1 {
            Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            }
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for PropertyPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PropertyPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PropertyPath> for String {
    fn from(path: PropertyPath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted_path() {
        let path = PropertyPath::parse("Department.Manager.Name").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.head(), "Department");
        assert_eq!(path.leaf(), "Name");
        assert_eq!(path.prefix(2), "Department.Manager");
        assert_eq!(path.parent().unwrap().to_string(), "Department.Manager");
        assert!(!path.is_simple());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PropertyPath::parse("").is_err());
        assert!(PropertyPath::parse("Department.").is_err());
        assert!(PropertyPath::parse(".Name").is_err());
        assert!(PropertyPath::parse("Department..Name").is_err());
        assert!(PropertyPath::parse("Depart ment.Name").is_err());
    }

    #[test]
    fn test_split_first() {
        let path = PropertyPath::parse("Department.Title").unwrap();
        let (head, rest) = path.split_first();
        assert_eq!(head, "Department");
        assert_eq!(rest.unwrap().to_string(), "Title");

        let simple = PropertyPath::parse("Name").unwrap();
        assert!(simple.split_first().1.is_none());
        assert!(simple.parent().is_none());
    }

    #[test]
    fn test_primary_key_suffix() {
        let path = PropertyPath::parse("Department.__PrimaryKey").unwrap();
        assert!(path.ends_with_primary_key());
        assert_eq!(path.without_primary_key().to_string(), "Department");

        let bare = PropertyPath::parse(PRIMARY_KEY).unwrap();
        assert_eq!(bare.without_primary_key().to_string(), PRIMARY_KEY);
    }

    #[test]
    fn test_join() {
        let path = PropertyPath::parse("Department").unwrap();
        assert_eq!(path.join(PRIMARY_KEY).unwrap().to_string(), "Department.__PrimaryKey");
    }

    #[test]
    fn test_serde_as_string() {
        let path = PropertyPath::parse("Department.Title").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"Department.Title\"");
        let back: PropertyPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<PropertyPath>("\"a..b\"").is_err());
    }
}
