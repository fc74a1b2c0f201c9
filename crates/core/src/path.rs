//! Response paths for error reporting
//!
//! A path is rendered dotted: `hero.friends.1.name`.

use std::fmt;

/// One step of a response path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Response key of a field
    Field(String),
    /// Position inside a list
    Index(usize),
}

/// Location of a value inside a result tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResponsePath(Vec<PathSegment>);

impl ResponsePath {
    /// The empty (root) path
    pub fn root() -> Self {
        Self::default()
    }

    /// Extend with a field segment
    pub fn with_field(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(key.to_string()));
        ResponsePath(segments)
    }

    /// Extend with a list index segment
    pub fn with_index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        ResponsePath(segments)
    }

    /// Segments from the root
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Check if this is the root path
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Field(key) => f.write_str(key)?,
                PathSegment::Index(index) => write!(f, "{index}")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for ResponsePath {
    /// Parse a dotted path; numeric segments become list indices
    fn from(path: &str) -> Self {
        ResponsePath(
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(|s| match s.parse::<usize>() {
                    Ok(index) => PathSegment::Index(index),
                    Err(_) => PathSegment::Field(s.to_string()),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_dotted() {
        let path = ResponsePath::root()
            .with_field("hero")
            .with_field("friends")
            .with_index(1);
        assert_eq!(path.to_string(), "hero.friends.1");
    }

    #[test]
    fn test_parse_round_trip() {
        let path = ResponsePath::from("hero.friends.1.name");
        assert_eq!(path.segments().len(), 4);
        assert_eq!(path.segments()[2], PathSegment::Index(1));
        assert_eq!(path.to_string(), "hero.friends.1.name");
    }

    #[test]
    fn test_root_is_empty() {
        assert!(ResponsePath::root().is_root());
        assert_eq!(ResponsePath::root().to_string(), "");
    }
}
