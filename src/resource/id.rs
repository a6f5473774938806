//! Resource identifiers.

use std::fmt;

use super::path::ResourcePath;

// ============================================================================
// ResourceTypeId
// ============================================================================

/// Resource type tag, derived from the path extension.
///
/// Up to four lowercase alphanumeric ascii characters, stored inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceTypeId([u8; 4]);

impl ResourceTypeId {
    /// The map type - the sole packaging seed type.
    pub const MAP: Self = Self(*b"map\0");

    /// Parse a type tag (1-4 lowercase alphanumeric characters).
    pub fn parse(tag: &str) -> Option<Self> {
        let bytes = tag.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 {
            return None;
        }

        let mut buf = [0u8; 4];
        for (i, &b) in bytes.iter().enumerate() {
            if !b.is_ascii_lowercase() && !b.is_ascii_digit() {
                return None;
            }
            buf[i] = b;
        }
        Some(Self(buf))
    }

    /// Tag as a string slice.
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(4);
        std::str::from_utf8(&self.0[..len]).unwrap_or("")
    }
}

impl fmt::Display for ResourceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ResourceId
// ============================================================================

/// A possibly-invalid resource identifier.
///
/// Invalid identifiers are representable on purpose: malformed paths coming
/// in over the network still produce a (pre-failed) compilation request, and
/// the failure log needs the raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    raw: String,
    parsed: Option<(ResourcePath, ResourceTypeId)>,
}

impl ResourceId {
    /// Build an identifier from a raw string.
    ///
    /// Valid identifiers normalize `raw` to the canonical path form; invalid
    /// ones keep the original string for diagnostics.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parsed = ResourcePath::parse(&raw).and_then(|path| {
            let type_id = path.extension().and_then(ResourceTypeId::parse)?;
            Some((path, type_id))
        });

        match parsed {
            Some((path, type_id)) => Self {
                raw: path.as_str().to_string(),
                parsed: Some((path, type_id)),
            },
            None => Self { raw, parsed: None },
        }
    }

    /// Build an identifier from an already-validated path.
    ///
    /// Still invalid when the path carries no recognizable type tag.
    pub fn from_path(path: ResourcePath) -> Self {
        Self::new(path.as_str())
    }

    pub fn is_valid(&self) -> bool {
        self.parsed.is_some()
    }

    /// Raw identifier string (canonical when valid).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn resource_path(&self) -> Option<&ResourcePath> {
        self.parsed.as_ref().map(|(path, _)| path)
    }

    pub fn type_id(&self) -> Option<ResourceTypeId> {
        self.parsed.as_ref().map(|(_, type_id)| *type_id)
    }

    pub fn is_map(&self) -> bool {
        self.type_id() == Some(ResourceTypeId::MAP)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
