//! Per-request dispatch.
//!
//! ```text
//! target "/users/a%20b?x=1"
//!   → normalize_path          "/users/a b"
//!   → Matcher::dispatch       Found | MethodNotAllowed | NotFound
//!   → handler (inline or container-built controller)
//!   → Ok(response)            done
//!   → Abort::Stop(response)   done, no fallback
//!   → Abort::Fault / panic    escalate(HandlerFault)
//! ```

use std::any::Any;
use std::borrow::Cow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use percent_encoding::percent_decode_str;
use tracing::{debug, error};

use crate::container::Container;
use crate::error::{BoxError, Error};
use crate::escalation::{Condition, escalate};
use crate::handler::{Abort, HandlerRef, Outcome};
use crate::matcher::{DispatchOutcome, Matcher};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// A compiled matcher plus the container, shared by every request.
///
/// Cheap to share: wrap it in an `Arc` (the serving loop does) and call
/// [`Dispatcher::handle`] from as many tasks as you like.
#[derive(Debug)]
pub struct Dispatcher {
    matcher: Matcher,
    container: Arc<Container>,
}

impl Dispatcher {
    /// Compiles `routes` and pairs the result with `container`.
    pub fn new(routes: Router, container: Container) -> Result<Self, Error> {
        Ok(Self::from_parts(routes.compile()?, Arc::new(container)))
    }

    pub fn from_parts(matcher: Matcher, container: Arc<Container>) -> Self {
        Self { matcher, container }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Routes one request and produces its response.
    ///
    /// Fails only with [`Error::NoFallbackRegistered`], when a condition
    /// needed a fallback the container does not have.
    pub async fn handle(&self, req: Request) -> Result<Response, Error> {
        let path = normalize_path(req.target()).into_owned();

        match self.matcher.dispatch(req.method(), &path) {
            DispatchOutcome::NotFound => {
                debug!(method = %req.method(), %path, "no route");
                escalate(&self.container, Condition::RouteNotFound, req).await
            }
            DispatchOutcome::MethodNotAllowed { allowed } => {
                debug!(method = %req.method(), %path, %allowed, "method not allowed");
                escalate(&self.container, Condition::MethodNotAllowed { allowed }, req).await
            }
            DispatchOutcome::Found { route, handler, variables } => {
                debug!(method = %req.method(), %path, route = route.0, "route matched");
                let req = req.with_params(variables);
                match self.invoke(handler, req.clone()).await {
                    Ok(response) | Err(Abort::Stop(response)) => Ok(response),
                    Err(Abort::Fault(cause)) => {
                        error!(method = %req.method(), %path, "handler fault: {cause}");
                        escalate(&self.container, Condition::HandlerFault { cause }, req).await
                    }
                }
            }
        }
    }

    async fn invoke(&self, handler: &HandlerRef, req: Request) -> Outcome {
        let container = Arc::clone(&self.container);
        let handler = handler.clone();
        let run = async move {
            let fut = match handler {
                HandlerRef::Inline(h) => h.call(req),
                HandlerRef::Named(target) => match container.call_controller(&target, req) {
                    Ok(fut) => fut,
                    Err(e) => return Err(Abort::from(e)),
                },
            };
            fut.await
        };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(Abort::Fault(panic_cause(panic))),
        }
    }
}

/// Strips the query string and percent-decodes what is left.
///
/// Invalid UTF-8 after decoding is replaced, never rejected.
pub fn normalize_path(target: &str) -> Cow<'_, str> {
    let path = match target.find('?') {
        Some(pos) => &target[..pos],
        None => target,
    };
    percent_decode_str(path).decode_utf8_lossy()
}

pub(crate) fn panic_cause(panic: Box<dyn Any + Send>) -> BoxError {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    };
    format!("handler panicked: {message}").into()
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};
    use rstest::rstest;

    use super::*;
    use crate::handler::to;
    use crate::{BoxFuture, Controller, handler};

    #[rstest]
    #[case("/search?q=test", "/search")]
    #[case("/search", "/search")]
    #[case("/users/a%20b", "/users/a b")]
    #[case("/users/a%2Fb?x=%20", "/users/a/b")]
    #[case("/caf%C3%A9", "/café")]
    #[case("/bad%FF", "/bad\u{FFFD}")]
    fn normalizes_targets(#[case] target: &str, #[case] expected: &str) {
        assert_eq!(normalize_path(target), expected);
    }

    fn get(target: &str) -> Request {
        Request::new(Method::GET, target.parse().unwrap())
    }

    async fn echo_id(req: Request) -> Response {
        Response::text(req.param("id").unwrap_or_default().to_owned())
    }

    async fn stops(_req: Request) -> Result<Response, Abort> {
        Err(Abort::stop(Response::builder().status(StatusCode::UNAUTHORIZED).text("halt")))
    }

    async fn faults(_req: Request) -> Result<Response, Abort> {
        Err(Abort::fault("database unreachable"))
    }

    async fn panics(_req: Request) -> Response {
        panic!("kaboom")
    }

    struct Users;

    impl Controller for Users {
        fn new(_container: Arc<Container>) -> Self {
            Users
        }

        fn call(self, action: &str, req: Request) -> Option<BoxFuture> {
            match action {
                "show" => Some(handler::boxed(async move {
                    format!("user {}", req.param("id").unwrap_or("?"))
                })),
                _ => None,
            }
        }
    }

    fn dispatcher(container: Container) -> Dispatcher {
        let mut routes = Router::new();
        routes.get("/users/{id}", echo_id);
        routes.get("/stop", stops);
        routes.get("/fault", faults);
        routes.get("/panic", panics);
        routes.get("/controller/{id}", to("Users:show"));
        routes.get("/ghost", to("Ghost:show"));
        Dispatcher::new(routes, container).unwrap()
    }

    fn with_error_handler() -> Container {
        let mut container = Container::new();
        container.register_controller::<Users>("Users");
        container.set_error_handler(|_req: Request, cause: BoxError| async move {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .text(cause.to_string())
        });
        container
    }

    #[tokio::test]
    async fn found_route_receives_decoded_variables() {
        let d = dispatcher(Container::new());
        let res = d.handle(get("/users/a%20b?x=1")).await.unwrap();
        assert_eq!(res.body(), "a b".as_bytes());
    }

    #[tokio::test]
    async fn explicit_stop_returns_its_response_without_fallback() {
        let mut container = Container::new();
        container.set_error_handler(|_req: Request, _cause: BoxError| async {
            Response::text("error handler ran")
        });
        let res = dispatcher(container).handle(get("/stop")).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.body(), "halt".as_bytes());
    }

    #[tokio::test]
    async fn faults_reach_error_handler_with_cause() {
        let res = dispatcher(with_error_handler()).handle(get("/fault")).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), "database unreachable".as_bytes());
    }

    #[tokio::test]
    async fn panics_are_faults() {
        let res = dispatcher(with_error_handler()).handle(get("/panic")).await.unwrap();
        assert_eq!(res.body(), "handler panicked: kaboom".as_bytes());
    }

    #[tokio::test]
    async fn faults_without_error_handler_surface() {
        let err = dispatcher(Container::new()).handle(get("/fault")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NoFallbackRegistered(Condition::HandlerFault { .. })
        ));
    }

    #[tokio::test]
    async fn named_targets_build_controllers() {
        let d = dispatcher(with_error_handler());
        let res = d.handle(get("/controller/7")).await.unwrap();
        assert_eq!(res.body(), "user 7".as_bytes());

        let res = d.handle(get("/ghost")).await.unwrap();
        assert_eq!(res.body(), "no controller registered under `Ghost`".as_bytes());
    }
}
