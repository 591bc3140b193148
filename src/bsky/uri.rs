use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const SCHEME: &str = "at://";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid URI format: {0}")]
pub struct InvalidUri(pub String);

/// A record address of the form `at://repo/collection/rkey`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtUri {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    /// Accept either `at://repo/collection/rkey` or the bare `repo/collection/rkey` form.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidUri`] for anything that is not exactly three non-empty
    /// path segments, with or without the scheme.
    pub fn normalize(input: &str) -> Result<Self, InvalidUri> {
        let trimmed = input.trim();
        let path = trimmed.strip_prefix(SCHEME).unwrap_or(trimmed);

        if path.contains("://") || path.chars().any(char::is_whitespace) {
            return Err(InvalidUri(input.to_string()));
        }

        let mut parts = path.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(repo), Some(collection), Some(rkey), None)
                if !repo.is_empty() && !collection.is_empty() && !rkey.is_empty() =>
            {
                Ok(Self {
                    repo: repo.to_string(),
                    collection: collection.to_string(),
                    rkey: rkey.to_string(),
                })
            }
            _ => Err(InvalidUri(input.to_string())),
        }
    }
}

impl FromStr for AtUri {
    type Err = InvalidUri;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}/{}", self.repo, self.collection, self.rkey)
    }
}
