use std::fmt;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("identifier cannot be empty")]
    Empty,
}

/// A path segment naming an entity either by UUID or by its human-readable key
/// (course/category slug, username).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Id(Uuid),
    Slug(String),
}

impl Identifier {
    /// Parses a raw identifier. Anything that is a valid UUID is treated as an
    /// ID; every other non-empty string is a slug.
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError::Empty` for blank input.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IdentifierError::Empty);
        }
        Ok(match Uuid::parse_str(raw) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Slug(raw.to_owned()),
        })
    }

    #[must_use]
    pub fn as_id(&self) -> Option<Uuid> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Slug(_) => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Slug(slug) => f.write_str(slug),
        }
    }
}
