//! The route table and its registration API.
//!
//! Routes are collected in registration order during setup, then
//! [`Router::compile`] consumes the table and produces a read-only
//! [`Matcher`]. A compiled table cannot be touched again, so there is no such
//! thing as a late registration.

use http::Method;

use crate::error::Error;
use crate::handler::{Handler, HandlerRef};
use crate::matcher::Matcher;
use crate::method::{ANY, Methods};
use crate::pattern::Pattern;

/// Opaque handle to a registered route: its position in the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(pub(crate) usize);

/// One registered `(methods, pattern, handler)` triple. Immutable.
#[derive(Debug)]
pub struct RouteDefinition {
    pub(crate) methods: Methods,
    pub(crate) pattern: Pattern,
    pub(crate) handler: HandlerRef,
}

impl RouteDefinition {
    pub fn methods(&self) -> &Methods { &self.methods }
    pub fn pattern(&self) -> &str { self.pattern.as_str() }
    pub fn handler(&self) -> &HandlerRef { &self.handler }
}

/// The application route table.
///
/// ```rust
/// use switchyard::{Request, Response, Router, handler::to};
///
/// async fn get_user(req: Request) -> Response {
///     Response::text(req.param("id").unwrap_or("unknown").to_owned())
/// }
///
/// let mut routes = Router::new();
/// routes.get("/users/{id}", get_user);
/// routes.post("/users", to("UserController:create"));
/// let matcher = routes.compile().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<RouteDefinition>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers `handler` for every method in `methods`.
    ///
    /// # Panics
    ///
    /// Panics if `methods` is empty, `pattern` is malformed, or `handler` is
    /// a malformed `"TypeName:methodName"` reference. These are setup bugs;
    /// use [`Router::try_map`] to handle them instead.
    pub fn map(
        &mut self,
        methods: impl Into<Methods>,
        pattern: &str,
        handler: impl Handler,
    ) -> RouteId {
        self.try_map(methods, pattern, handler)
            .unwrap_or_else(|e| panic!("invalid route: {e}"))
    }

    /// Fallible form of [`Router::map`].
    pub fn try_map(
        &mut self,
        methods: impl Into<Methods>,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<RouteId, Error> {
        let methods = methods.into();
        if methods.is_empty() {
            return Err(Error::EmptyMethods(pattern.to_owned()));
        }
        let pattern = Pattern::parse(pattern)?;
        let handler = handler.into_handler_ref()?;

        let id = RouteId(self.routes.len());
        self.routes.push(RouteDefinition { methods, pattern, handler });
        Ok(id)
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler) -> RouteId {
        self.map([Method::GET], pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler) -> RouteId {
        self.map([Method::POST], pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: impl Handler) -> RouteId {
        self.map([Method::PUT], pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: impl Handler) -> RouteId {
        self.map([Method::PATCH], pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Handler) -> RouteId {
        self.map([Method::DELETE], pattern, handler)
    }

    pub fn options(&mut self, pattern: &str, handler: impl Handler) -> RouteId {
        self.map([Method::OPTIONS], pattern, handler)
    }

    /// GET, POST, PUT, PATCH, DELETE and OPTIONS.
    pub fn any(&mut self, pattern: &str, handler: impl Handler) -> RouteId {
        self.map(ANY, pattern, handler)
    }

    pub fn route(&self, id: RouteId) -> Option<&RouteDefinition> {
        self.routes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freezes the table into a [`Matcher`].
    ///
    /// Fails with [`Error::ShadowedRoute`] when some route can never be
    /// selected for one of its methods because an earlier route with that
    /// method covers every path it would match.
    pub fn compile(self) -> Result<Matcher, Error> {
        for (i, later) in self.routes.iter().enumerate() {
            for earlier in &self.routes[..i] {
                if !later.pattern.is_covered_by(&earlier.pattern) {
                    continue;
                }
                if let Some(method) = later.methods.iter().find(|m| earlier.methods.contains(*m)) {
                    return Err(Error::ShadowedRoute {
                        pattern: later.pattern.as_str().to_owned(),
                        method: method.clone(),
                        by: earlier.pattern.as_str().to_owned(),
                    });
                }
            }
        }
        Ok(Matcher::new(self.routes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::to;
    use crate::{Request, Response};

    async fn ok(_req: Request) -> Response {
        Response::text("ok")
    }

    #[test]
    fn sugar_registers_fixed_method_sets() {
        let mut routes = Router::new();
        let get = routes.get("/a", ok);
        let any = routes.any("/b", ok);
        let put = routes.put("/c", to("Things:update"));

        assert_eq!(routes.route(get).unwrap().methods(), &Methods::from([Method::GET]));
        assert_eq!(routes.route(any).unwrap().methods(), &Methods::from(ANY));
        assert_eq!(routes.route(put).unwrap().pattern(), "/c");
        assert!(matches!(routes.route(put).unwrap().handler(), HandlerRef::Named(_)));
        assert_eq!(routes.len(), 3);
    }

    #[test]
    fn registration_rejects_empty_methods_and_bad_patterns() {
        let mut routes = Router::new();
        let empty: Vec<Method> = Vec::new();
        assert!(matches!(routes.try_map(empty, "/a", ok), Err(Error::EmptyMethods(_))));
        assert!(matches!(
            routes.try_map([Method::GET], "a/{", ok),
            Err(Error::InvalidPattern { .. })
        ));
        assert!(matches!(
            routes.try_map([Method::GET], "/a", to("NoAction")),
            Err(Error::InvalidHandlerRef(_))
        ));
        assert!(routes.is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn sugar_panics_on_malformed_pattern() {
        Router::new().get("no-slash", ok);
    }

    #[test]
    fn compile_rejects_fully_shadowed_routes() {
        let mut routes = Router::new();
        routes.get("/users/{id}", ok);
        routes.map([Method::POST, Method::GET], "/users/me", ok);
        match routes.compile() {
            Err(Error::ShadowedRoute { pattern, method, by }) => {
                assert_eq!(pattern, "/users/me");
                assert_eq!(method, Method::GET);
                assert_eq!(by, "/users/{id}");
            }
            other => panic!("expected ShadowedRoute, got {other:?}"),
        }
    }

    #[test]
    fn compile_accepts_partial_overlap_and_disjoint_methods() {
        let mut routes = Router::new();
        routes.get("/users/me", ok);
        routes.get("/users/{id}", ok);
        routes.post("/users/{name}", ok);
        routes.get("/a/{x}/c", ok);
        routes.get("/a/b/{y}", ok);
        assert!(routes.compile().is_ok());
    }
}
