//! Composite resource identifiers
//!
//! Resources owned by another resource (a provider inside an account, a
//! client inside a tenant) are identified by an ordered tuple of components.
//! The string form percent-encodes each component and joins them with `/`,
//! so a component that itself contains `/` still round-trips.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SEPARATOR: &str = "/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("Incorrect ID {id}: expected {expected} components, found {found}")]
    WrongArity {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("Incorrect ID {id}: component {index} is empty")]
    EmptyComponent { id: String, index: usize },

    #[error("Incorrect ID {id}: component {index} is not canonically encoded")]
    InvalidEncoding { id: String, index: usize },
}

/// Structured identifier made of one or more non-empty components
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    parts: Vec<String>,
}

impl CompositeId {
    pub fn new<I, S>(parts: I) -> Result<Self, IdError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() {
            return Err(IdError::WrongArity {
                id: String::new(),
                expected: 1,
                found: 0,
            });
        }
        if let Some(index) = parts.iter().position(|p| p.is_empty()) {
            return Err(IdError::EmptyComponent {
                id: parts.join(SEPARATOR),
                index,
            });
        }
        Ok(Self { parts })
    }

    /// Two-component identifier, e.g. `(account_id, provider_id)`
    pub fn pair(first: &str, second: &str) -> Result<Self, IdError> {
        Self::new([first, second])
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn encode(&self) -> String {
        self.parts
            .iter()
            .map(|p| urlencoding::encode(p).into_owned())
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }

    /// Decode and check the number of components
    pub fn decode(id: &str, expected_parts: usize) -> Result<Self, IdError> {
        let decoded = Self::decode_any(id)?;
        if decoded.parts.len() != expected_parts {
            return Err(IdError::WrongArity {
                id: id.to_string(),
                expected: expected_parts,
                found: decoded.parts.len(),
            });
        }
        Ok(decoded)
    }

    fn decode_any(id: &str) -> Result<Self, IdError> {
        let parts = id
            .split(SEPARATOR)
            .enumerate()
            .map(|(index, segment)| {
                if segment.is_empty() {
                    return Err(IdError::EmptyComponent {
                        id: id.to_string(),
                        index,
                    });
                }
                let invalid = || IdError::InvalidEncoding {
                    id: id.to_string(),
                    index,
                };
                let decoded = urlencoding::decode(segment).map_err(|_| invalid())?;

                // Only the exact output of `encode` is accepted, so every ID
                // has a single string form
                if urlencoding::encode(&decoded) != segment {
                    return Err(invalid());
                }
                Ok(decoded.into_owned())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { parts })
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CompositeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode_any(s)
    }
}

impl Serialize for CompositeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}
