//! Handle values and their `ref <tag> <id>` token form.

use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

/// Registry namespace for handles, usually the C type name of the pointee.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(String);

impl TypeTag {
    /// A tag must be non-empty and contain no whitespace.
    pub fn new(tag: impl Into<String>) -> Result<Self, RegistryError> {
        let tag = tag.into();
        if tag.is_empty() || tag.chars().any(char::is_whitespace) {
            return Err(RegistryError::MalformedToken {
                detail: "tag must be non-empty without whitespace".into(),
                token: tag,
            });
        }
        Ok(TypeTag(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TypeTag {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeTag::new(s)
    }
}

/// A revocable reference to a registered object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    pub tag: TypeTag,
    pub id: u64,
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref {} {}", self.tag, self.id)
    }
}

impl FromStr for Handle {
    type Err = RegistryError;

    /// Parse exactly `ref <tag> <id>`: single spaces, a decimal id without
    /// sign or leading zeros.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |detail: &str| RegistryError::MalformedToken {
            token: s.to_string(),
            detail: detail.to_string(),
        };
        let parts: Vec<&str> = s.split(' ').collect();
        let [prefix, tag, id] = parts.as_slice() else {
            return Err(malformed("expected 'ref <tag> <id>'"));
        };
        if *prefix != "ref" {
            return Err(malformed("missing 'ref' prefix"));
        }
        let tag = TypeTag::new(*tag).map_err(|_| malformed("empty or invalid tag"))?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("id is not a decimal number"));
        }
        if id.len() > 1 && id.starts_with('0') {
            return Err(malformed("id has leading zeros"));
        }
        let id = id.parse::<u64>().map_err(|_| malformed("id out of range"))?;
        Ok(Handle { tag, id })
    }
}
