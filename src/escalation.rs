//! Error escalation.
//!
//! Every routing failure and handler fault becomes a [`Condition`], and every
//! condition goes through [`escalate`]. The mapping to fallback names is
//! fixed:
//!
//! | Condition          | Fallback            | Extra argument   |
//! |--------------------|---------------------|------------------|
//! | `RouteNotFound`    | `notFoundHandler`   | none             |
//! | `MethodNotAllowed` | `notAllowedHandler` | allowed methods  |
//! | `HandlerFault`     | `errorHandler`      | the fault cause  |
//!
//! `ExplicitStop` already carries its response and never looks anything up.
//! A missing fallback is reported as [`Error::NoFallbackRegistered`] so the
//! serving loop can answer with a safe generic response.

use std::fmt;

use tracing::{debug, warn};

use crate::container::{Container, ERROR_HANDLER, NOT_ALLOWED_HANDLER, NOT_FOUND_HANDLER};
use crate::error::{BoxError, Error};
use crate::method::Methods;
use crate::request::Request;
use crate::response::Response;

/// A condition raised while dispatching one request.
#[derive(Debug)]
pub enum Condition {
    RouteNotFound,
    MethodNotAllowed { allowed: Methods },
    HandlerFault { cause: BoxError },
    ExplicitStop { response: Response },
}

impl Condition {
    /// Container name of the fallback for this condition.
    pub fn fallback_name(&self) -> Option<&'static str> {
        match self {
            Self::RouteNotFound => Some(NOT_FOUND_HANDLER),
            Self::MethodNotAllowed { .. } => Some(NOT_ALLOWED_HANDLER),
            Self::HandlerFault { .. } => Some(ERROR_HANDLER),
            Self::ExplicitStop { .. } => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RouteNotFound => f.write_str("route not found"),
            Self::MethodNotAllowed { allowed } => write!(f, "method not allowed (allowed: {allowed})"),
            Self::HandlerFault { cause } => write!(f, "handler fault: {cause}"),
            Self::ExplicitStop { response } => {
                write!(f, "explicit stop with status {}", response.status_code())
            }
        }
    }
}

/// Hands `condition` to its fallback and returns the fallback's response.
pub async fn escalate(
    container: &Container,
    condition: Condition,
    req: Request,
) -> Result<Response, Error> {
    let fallback = condition.fallback_name().unwrap_or_default();
    let fut = match condition {
        Condition::ExplicitStop { response } => return Ok(response),
        Condition::RouteNotFound => match container.not_found_handler() {
            Some(handler) => handler(req),
            None => return Err(missing(Condition::RouteNotFound)),
        },
        Condition::MethodNotAllowed { allowed } => match container.not_allowed_handler() {
            Some(handler) => handler(req, allowed),
            None => return Err(missing(Condition::MethodNotAllowed { allowed })),
        },
        Condition::HandlerFault { cause } => match container.error_handler() {
            Some(handler) => handler(req, cause),
            None => return Err(missing(Condition::HandlerFault { cause })),
        },
    };
    debug!(fallback, "escalated to fallback handler");
    Ok(fut.await)
}

fn missing(condition: Condition) -> Error {
    warn!(
        fallback = condition.fallback_name().unwrap_or_default(),
        "no fallback handler registered"
    );
    Error::NoFallbackRegistered(condition)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use http::{Method, StatusCode};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn request() -> Request {
        Request::new(Method::GET, "/x".parse().unwrap())
    }

    #[tokio::test]
    async fn explicit_stop_skips_lookup() {
        let container = Container::new();
        let response = Response::status(StatusCode::ACCEPTED);
        let out = escalate(&container, Condition::ExplicitStop { response }, request())
            .await
            .unwrap();
        assert_eq!(out.status_code(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn not_allowed_fallback_receives_allowed_methods() {
        let mut container = Container::new();
        container.set_not_allowed_handler(|_req: Request, allowed: Methods| async move {
            Response::text(allowed.to_string())
        });
        let allowed = Methods::from([Method::GET, Method::POST]);
        let out = escalate(&container, Condition::MethodNotAllowed { allowed }, request())
            .await
            .unwrap();
        assert_eq!(out.body(), "GET, POST".as_bytes());
    }

    #[tokio::test]
    async fn error_fallback_receives_cause() {
        let mut container = Container::new();
        container.set_error_handler(|_req: Request, cause: BoxError| async move {
            Response::text(format!("caught: {cause}"))
        });
        let cause: BoxError = "boom".into();
        let out = escalate(&container, Condition::HandlerFault { cause }, request())
            .await
            .unwrap();
        assert_eq!(out.body(), "caught: boom".as_bytes());
    }

    #[tokio::test]
    async fn missing_fallback_returns_the_condition() {
        let container = Container::new();
        let err = escalate(&container, Condition::RouteNotFound, request())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoFallbackRegistered(Condition::RouteNotFound)));

        let cause: BoxError = "boom".into();
        let err = escalate(&container, Condition::HandlerFault { cause }, request())
            .await
            .unwrap_err();
        match err {
            Error::NoFallbackRegistered(Condition::HandlerFault { cause }) => {
                assert_eq!(cause.to_string(), "boom");
            }
            other => panic!("expected NoFallbackRegistered, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn escalation_logs_the_fallback_it_used() {
        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut container = Container::new();
        container.set_not_found_handler(|_req: Request| async { StatusCode::NOT_FOUND });
        escalate(&container, Condition::RouteNotFound, request()).await.unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("escalated to fallback handler"), "{output}");
        assert!(output.contains("notFoundHandler"), "{output}");
    }

    #[test]
    fn fallback_names_are_fixed() {
        assert_eq!(Condition::RouteNotFound.fallback_name(), Some("notFoundHandler"));
        assert_eq!(
            Condition::MethodNotAllowed { allowed: Methods::new() }.fallback_name(),
            Some("notAllowedHandler")
        );
        let cause: BoxError = "x".into();
        assert_eq!(Condition::HandlerFault { cause }.fallback_name(), Some("errorHandler"));
    }
}
