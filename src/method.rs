//! Method sets attached to routes.
//!
//! Tokens are [`http::Method`] values, so extension methods (`PURGE`,
//! `PROPFIND`, anything RFC 9110 §9.1 allows) route the same way as `GET`.
//! Matching is case-sensitive, as the RFC requires.

use std::fmt;

use http::Method;

/// The six methods [`Router::any`](crate::Router::any) expands to.
pub const ANY: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// An ordered, duplicate-free set of method tokens.
///
/// Routes carry a handful of methods at most, so a `Vec` with linear
/// membership checks beats hashing here. Iteration and `Display` follow
/// insertion order, which keeps `Allow` headers stable across processes.
/// Equality ignores order.
#[derive(Clone, Debug, Default)]
pub struct Methods(Vec<Method>);

impl Methods {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, method: Method) {
        if !self.contains(&method) {
            self.0.push(method);
        }
    }

    /// Adds every method of `other` not already present.
    pub fn extend_from(&mut self, other: &Methods) {
        for method in &other.0 {
            self.insert(method.clone());
        }
    }

    pub fn contains(&self, method: &Method) -> bool {
        self.0.contains(method)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.0.iter()
    }
}

impl PartialEq for Methods {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|m| other.contains(m))
    }
}

impl Eq for Methods {}

impl FromIterator<Method> for Methods {
    fn from_iter<I: IntoIterator<Item = Method>>(iter: I) -> Self {
        let mut set = Self::new();
        for method in iter {
            set.insert(method);
        }
        set
    }
}

impl<const N: usize> From<[Method; N]> for Methods {
    fn from(methods: [Method; N]) -> Self {
        methods.into_iter().collect()
    }
}

impl From<Vec<Method>> for Methods {
    fn from(methods: Vec<Method>) -> Self {
        methods.into_iter().collect()
    }
}

/// Renders the set the way an `Allow` header wants it: `GET, POST`.
impl fmt::Display for Methods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, method) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(method.as_str())?;
        }
        Ok(())
    }
}
