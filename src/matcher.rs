//! Compiled route matcher.
//!
//! Literal-only patterns are indexed by exact path in a hash map. Patterns
//! with captures are bucketed by segment count, which is fixed per pattern.
//! A lookup gathers both candidate lists and walks them merged in
//! registration order, so precedence never depends on which index a route
//! landed in:
//!
//! ```text
//! GET /users/me
//!   statics["/users/me"]   → [0]
//!   dynamic[2 segments]    → [1 /users/{id}, 3 /posts/{id}]
//!   merged walk            → 0, 1, 3   first shape + method hit wins
//! ```
//!
//! The matcher is immutable after construction and shared across requests
//! without locking.

use std::collections::HashMap;

use http::Method;

use crate::handler::HandlerRef;
use crate::method::Methods;
use crate::pattern::segment_count;
use crate::router::{RouteDefinition, RouteId};

/// What the matcher says about one `(method, path)` pair.
#[derive(Debug)]
pub enum DispatchOutcome<'m> {
    Found {
        route: RouteId,
        handler: &'m HandlerRef,
        variables: HashMap<String, String>,
    },
    MethodNotAllowed {
        allowed: Methods,
    },
    NotFound,
}

/// A compiled, read-only route table.
#[derive(Debug)]
pub struct Matcher {
    routes: Vec<RouteDefinition>,
    statics: HashMap<String, Vec<usize>>,
    dynamic: HashMap<usize, Vec<usize>>,
}

impl Matcher {
    pub(crate) fn new(routes: Vec<RouteDefinition>) -> Self {
        let mut statics: HashMap<String, Vec<usize>> = HashMap::new();
        let mut dynamic: HashMap<usize, Vec<usize>> = HashMap::new();

        for (i, route) in routes.iter().enumerate() {
            if route.pattern.is_static() {
                statics.entry(route.pattern.as_str().to_owned()).or_default().push(i);
            } else {
                dynamic.entry(route.pattern.segments().len()).or_default().push(i);
            }
        }

        Self { routes, statics, dynamic }
    }

    /// Resolves `method` + `path`. `path` must already be stripped of its
    /// query string and percent-decoded.
    pub fn dispatch(&self, method: &Method, path: &str) -> DispatchOutcome<'_> {
        let statics = self.statics.get(path).map(Vec::as_slice).unwrap_or(&[]);
        let dynamic = self
            .dynamic
            .get(&segment_count(path))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut allowed = Methods::new();
        let mut shape_matched = false;

        for i in merged(statics, dynamic) {
            let route = &self.routes[i];
            let Some(captures) = route.pattern.captures(path) else {
                continue;
            };
            shape_matched = true;

            if route.methods.contains(method) {
                let variables = captures
                    .into_iter()
                    .map(|(name, value)| (name.to_owned(), value.to_owned()))
                    .collect();
                return DispatchOutcome::Found {
                    route: RouteId(i),
                    handler: &route.handler,
                    variables,
                };
            }
            allowed.extend_from(&route.methods);
        }

        if shape_matched {
            DispatchOutcome::MethodNotAllowed { allowed }
        } else {
            DispatchOutcome::NotFound
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Walks two ascending index lists as one ascending sequence.
fn merged<'a>(a: &'a [usize], b: &'a [usize]) -> impl Iterator<Item = usize> + 'a {
    let (mut i, mut j) = (0, 0);
    std::iter::from_fn(move || match (a.get(i), b.get(j)) {
        (Some(&x), Some(&y)) if x < y => {
            i += 1;
            Some(x)
        }
        (_, Some(&y)) => {
            j += 1;
            Some(y)
        }
        (Some(&x), None) => {
            i += 1;
            Some(x)
        }
        (None, None) => None,
    })
}
