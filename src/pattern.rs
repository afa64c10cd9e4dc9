//! Route pattern parsing.
//!
//! A pattern is a `/`-separated list of segments. Each segment is either a
//! literal or a single whole-segment capture:
//!
//! ```text
//! /users/{id}/posts       literal, capture, literal
//! /files/{name}.txt       rejected: captures must fill the segment
//! /users/{id}/{id}        rejected: capture names are unique
//! ```
//!
//! Segment count is part of a pattern's shape. `/users` and `/users/` are
//! different shapes: the second has a trailing empty literal.

use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Capture(String),
}

/// A parsed, validated route pattern.
#[derive(Clone, Debug)]
pub(crate) struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub(crate) fn parse(source: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidPattern {
            pattern: source.to_owned(),
            reason: reason.to_owned(),
        };

        let rest = source
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with `/`"))?;

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        for raw in rest.split('/') {
            let Some(inner) = raw.strip_prefix('{') else {
                if raw.contains(['{', '}']) {
                    return Err(invalid("a capture must occupy a whole segment"));
                }
                segments.push(Segment::Literal(raw.to_owned()));
                continue;
            };

            let name = inner
                .strip_suffix('}')
                .ok_or_else(|| invalid("unterminated capture"))?;
            if name.is_empty() {
                return Err(invalid("capture name is empty"));
            }
            if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
                return Err(invalid("capture names may only contain [A-Za-z0-9_]"));
            }
            if names.contains(&name) {
                return Err(invalid("duplicate capture name"));
            }
            names.push(name);
            segments.push(Segment::Capture(name.to_owned()));
        }

        Ok(Self { source: source.to_owned(), segments })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub(crate) fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Matches `path` segment by segment. `None` means the shape differs.
    ///
    /// Captured values are taken verbatim; the caller has already decoded
    /// the path.
    pub(crate) fn captures<'p>(&'p self, path: &'p str) -> Option<Vec<(&'p str, &'p str)>> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut captured = Vec::new();

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Capture(_) if part.is_empty() => return None,
                Segment::Capture(name) => captured.push((name.as_str(), part)),
            }
        }

        match parts.next() {
            Some(_) => None,
            None => Some(captured),
        }
    }

    /// True when every path this pattern accepts is also accepted by
    /// `earlier`, i.e. `earlier` fully covers `self`.
    pub(crate) fn is_covered_by(&self, earlier: &Pattern) -> bool {
        self.segments.len() == earlier.segments.len()
            && self
                .segments
                .iter()
                .zip(&earlier.segments)
                .all(|(mine, theirs)| match (mine, theirs) {
                    (_, Segment::Capture(_)) => !matches!(mine, Segment::Literal(l) if l.is_empty()),
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Capture(_), Segment::Literal(_)) => false,
                })
    }
}

/// Number of segments in a request path, as [`Pattern`] counts them.
pub(crate) fn segment_count(path: &str) -> usize {
    path.strip_prefix('/')
        .map(|rest| rest.split('/').count())
        .unwrap_or(0)
}
