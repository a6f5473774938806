//! Virtual resource paths.
//!
//! A `ResourcePath` addresses an authored asset independently of where it
//! lives on disk: `data://characters/hero.anim`. The same virtual path
//! resolves under the raw root (source input), the compiled root (normal
//! output) or the packaged root (packaging output).

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Virtual path scheme prefix.
pub const SCHEME: &str = "data://";

/// A validated virtual resource path.
///
/// Always lowercase with forward slashes; never contains empty, `.` or `..`
/// segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcePath(String);

impl ResourcePath {
    /// Parse and normalize a virtual path.
    ///
    /// Returns `None` when the scheme is missing, the path is empty, or any
    /// segment is empty / `.` / `..`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().replace('\\', "/").to_ascii_lowercase();
        let rel = normalized.strip_prefix(SCHEME)?;
        if rel.is_empty() {
            return None;
        }

        for segment in rel.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return None;
            }
        }

        Some(Self(normalized))
    }

    /// Full path string, including the scheme.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path component after the scheme.
    pub fn relative(&self) -> &str {
        &self.0[SCHEME.len()..]
    }

    /// Extension of the final segment, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.relative().rsplit('/').next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            None
        } else {
            Some(ext)
        }
    }

    /// Resolve to a filesystem path under `root`.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.relative().split('/') {
            path.push(segment);
        }
        path
    }

    /// Build a virtual path from a filesystem path relative to `root`.
    ///
    /// Returns `None` for paths outside `root` or with non-UTF8 components.
    pub fn from_fs_path(root: &Path, path: &Path) -> Option<Self> {
        let rel = path.strip_prefix(root).ok()?;

        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(os) => parts.push(os.to_str()?),
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }

        Self::parse(&format!("{SCHEME}{}", parts.join("/")))
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let path = ResourcePath::parse("data://characters/hero.anim").unwrap();
        assert_eq!(path.as_str(), "data://characters/hero.anim");
        assert_eq!(path.relative(), "characters/hero.anim");
        assert_eq!(path.extension(), Some("anim"));
    }

    #[test]
    fn test_parse_normalizes_case_and_separators() {
        let path = ResourcePath::parse("DATA://Characters\\Hero.ANIM").unwrap();
        assert_eq!(path.as_str(), "data://characters/hero.anim");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(ResourcePath::parse("").is_none());
        assert!(ResourcePath::parse("data://").is_none());
        assert!(ResourcePath::parse("characters/hero.anim").is_none());
        assert!(ResourcePath::parse("data://a//b.tex").is_none());
        assert!(ResourcePath::parse("data://../escape.tex").is_none());
        assert!(ResourcePath::parse("data://a/./b.tex").is_none());
    }

    #[test]
    fn test_extension_edge_cases() {
        assert_eq!(
            ResourcePath::parse("data://a/readme").unwrap().extension(),
            None
        );
        assert_eq!(
            ResourcePath::parse("data://a/.hidden").unwrap().extension(),
            None
        );
        assert_eq!(
            ResourcePath::parse("data://a/b.c.map").unwrap().extension(),
            Some("map")
        );
    }

    #[test]
    fn test_fs_roundtrip() {
        let root = Path::new("/srv/raw");
        let path = ResourcePath::parse("data://maps/arena.map").unwrap();

        let fs_path = path.to_fs_path(root);
        assert_eq!(fs_path, PathBuf::from("/srv/raw/maps/arena.map"));

        let back = ResourcePath::from_fs_path(root, &fs_path).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn test_from_fs_path_outside_root() {
        let root = Path::new("/srv/raw");
        assert!(ResourcePath::from_fs_path(root, Path::new("/srv/other/a.map")).is_none());
        assert!(ResourcePath::from_fs_path(root, Path::new("/srv/raw")).is_none());
    }
}
