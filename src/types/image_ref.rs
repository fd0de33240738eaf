// ABOUTME: Image reference parsing for build and push targets.
// ABOUTME: Handles app, app:tag, registry:5000/team/app:tag and re-qualifying under a registry.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0:?}")]
    InvalidChar(char),

    #[error("repository name must be lowercase: {0}")]
    Uppercase(String),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// A `[registry/]name[:tag]` reference. Digests are not accepted as build
/// targets; the tag defaults to `latest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: Option<String>,
    name: String,
    tag: String,
}

pub const DEFAULT_TAG: &str = "latest";

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '-' | '_')))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        // A colon followed by a slash belongs to a registry port, not a tag.
        let (path, tag) = match input.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => (before, Some(after)),
            _ => (input, None),
        };
        if tag.is_some_and(str::is_empty) {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        let (registry, name) = split_registry(path);
        if name.is_empty() || name.split('/').any(str::is_empty) {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }
        if name.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(ParseImageRefError::Uppercase(name.to_string()));
        }

        Ok(Self {
            registry: registry.map(str::to_string),
            name: name.to_string(),
            tag: tag.unwrap_or(DEFAULT_TAG).to_string(),
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The same image addressed under `registry`, replacing any registry the
    /// reference already carried.
    pub fn qualified(&self, registry: &str) -> Self {
        let registry = registry.trim().trim_end_matches('/');
        Self {
            registry: (!registry.is_empty()).then(|| registry.to_string()),
            ..self.clone()
        }
    }
}

/// The first path component is a registry when it looks like a host.
fn split_registry(path: &str) -> (Option<&str>, &str) {
    match path.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (Some(first), rest)
        }
        _ => (None, path),
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{registry}/")?;
        }
        write!(f, "{}:{}", self.name, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_defaults_to_latest() {
        let image = ImageRef::parse("app").unwrap();
        assert_eq!(image.registry(), None);
        assert_eq!(image.name(), "app");
        assert_eq!(image.tag(), "latest");
        assert_eq!(image.to_string(), "app:latest");
    }

    #[test]
    fn registry_with_port_is_not_a_tag() {
        let image = ImageRef::parse("localhost:5000/team/app").unwrap();
        assert_eq!(image.registry(), Some("localhost:5000"));
        assert_eq!(image.name(), "team/app");
        assert_eq!(image.tag(), "latest");
    }

    #[test]
    fn namespaced_name_without_registry() {
        let image = ImageRef::parse("acme/web:v2").unwrap();
        assert_eq!(image.registry(), None);
        assert_eq!(image.name(), "acme/web");
        assert_eq!(image.tag(), "v2");
    }

    #[test]
    fn qualified_replaces_registry() {
        let image = ImageRef::parse("ghcr.io/acme/web:v2").unwrap();
        assert_eq!(
            image.qualified("registry.example.com/").to_string(),
            "registry.example.com/acme/web:v2"
        );
        assert_eq!(image.qualified("").to_string(), "acme/web:v2");
    }

    #[test]
    fn rejects_bad_references() {
        assert_eq!(ImageRef::parse("  "), Err(ParseImageRefError::Empty));
        assert_eq!(
            ImageRef::parse("app name"),
            Err(ParseImageRefError::InvalidChar(' '))
        );
        assert!(matches!(
            ImageRef::parse("MyApp"),
            Err(ParseImageRefError::Uppercase(_))
        ));
        assert!(matches!(
            ImageRef::parse("app:"),
            Err(ParseImageRefError::InvalidFormat(_))
        ));
        assert!(matches!(
            ImageRef::parse("acme//web"),
            Err(ParseImageRefError::InvalidFormat(_))
        ));
        assert!(matches!(
            ImageRef::parse("app@sha256:abc"),
            Err(ParseImageRefError::InvalidChar('@'))
        ));
    }
}
