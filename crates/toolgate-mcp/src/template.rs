//! Resource URI templates.
//!
//! A template such as `calculator://operation/{id}` is a scheme plus
//! `/`-separated segments, each either static text or a `{placeholder}`.
//! Matching is positional: the concrete URI must have the same scheme and
//! segment count, every static segment must be equal, and each placeholder
//! binds the segment at its position. A placeholder never binds an empty
//! segment or one containing braces, so the template string itself is not a
//! readable URI.

use std::fmt;
use thiserror::Error;

/// Template parse errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// No `scheme://` prefix.
    #[error("missing scheme")]
    MissingScheme,

    /// A segment mixes braces with static text, or braces are unbalanced.
    #[error("malformed segment '{0}'")]
    MalformedSegment(String),

    /// `{}` with no name.
    #[error("empty placeholder")]
    EmptyPlaceholder,

    /// The same placeholder appears twice.
    #[error("placeholder '{0}' appears more than once")]
    DuplicatePlaceholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Placeholder(String),
}

/// A parsed resource URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    scheme: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    /// Parse a template.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let (scheme, rest) = raw.split_once("://").ok_or(TemplateError::MissingScheme)?;
        if scheme.is_empty() {
            return Err(TemplateError::MissingScheme);
        }

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        for part in rest.split('/') {
            if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder);
                }
                if name.contains(['{', '}']) {
                    return Err(TemplateError::MalformedSegment(part.to_string()));
                }
                if names.contains(&name) {
                    return Err(TemplateError::DuplicatePlaceholder(name.to_string()));
                }
                names.push(name);
                segments.push(Segment::Placeholder(name.to_string()));
            } else if part.contains(['{', '}']) {
                return Err(TemplateError::MalformedSegment(part.to_string()));
            } else {
                segments.push(Segment::Static(part.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme: scheme.to_string(),
            segments,
        })
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the template has any placeholder segment.
    pub fn is_templated(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder(_)))
    }

    /// Placeholder names in positional order.
    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Static(_) => None,
            })
            .collect()
    }

    /// Match a concrete URI, returning placeholder bindings in positional order.
    pub fn matches(&self, uri: &str) -> Option<Vec<(String, String)>> {
        let (scheme, rest) = uri.split_once("://")?;
        if scheme != self.scheme {
            return None;
        }

        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut bindings = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(expected) if expected == part => {}
                Segment::Static(_) => return None,
                Segment::Placeholder(_) if part.is_empty() || part.contains(['{', '}']) => {
                    return None
                }
                Segment::Placeholder(name) => bindings.push((name.clone(), part.to_string())),
            }
        }
        Some(bindings)
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
