//! Handler trait, handler references and type erasure.
//!
//! # How handlers are stored
//!
//! A route points at one of two things:
//!
//! ```text
//! HandlerRef::Inline(BoxedHandler)       ← an async fn / closure
//! HandlerRef::Named(NamedRef)            ← "UserController:show"
//! ```
//!
//! Inline handlers are type-erased the usual way:
//!
//! ```text
//! async fn show(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.get("/", show)
//! show.into_handler_ref()                         ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(show))                       ← stored as BoxedHandler
//!        ↓
//! handler.call(req) at request time               ← one vtable dispatch
//! ```
//!
//! Named references are late-bound: the dispatcher asks the
//! [`Container`](crate::Container) for a fresh controller of that type on
//! every request and hands it the action name.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;

use crate::error::{BoxError, Error};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Outcome ───────────────────────────────────────────────────────────────────

/// Why a handler stopped without producing a normal response.
#[derive(Debug)]
pub enum Abort {
    /// Finish the exchange with this response right away. No fallback
    /// handler runs.
    Stop(Response),
    /// The handler failed. Escalated to the `errorHandler` fallback.
    Fault(BoxError),
}

impl Abort {
    /// Shorthand for [`Abort::Stop`].
    pub fn stop(response: impl IntoResponse) -> Self {
        Self::Stop(response.into_response())
    }

    /// Shorthand for [`Abort::Fault`] from a message.
    pub fn fault(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Fault(message.into())
    }
}

/// Lets handlers use `?` on any standard error; it becomes a fault.
impl<E> From<E> for Abort
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: E) -> Self {
        Self::Fault(Box::new(e))
    }
}

/// What every handler resolves to once erased.
pub type Outcome = Result<Response, Abort>;

/// Conversion of a handler's return value into an [`Outcome`].
///
/// Plain responses are always `Ok`. `Result<T, E>` lets handlers fail with
/// `Err(Abort::stop(..))` or with any error through `?`.
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for Response {
    fn into_outcome(self) -> Outcome { Ok(self) }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Outcome { Ok(self.into_response()) }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Outcome { Ok(self.into_response()) }
}

impl IntoOutcome for StatusCode {
    fn into_outcome(self) -> Outcome { Ok(self.into_response()) }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoResponse,
    E: Into<Abort>,
{
    fn into_outcome(self) -> Outcome {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}

// ── Erased handlers ───────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to an [`Outcome`].
pub type BoxFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` because it appears inside the public [`HandlerRef`].
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Boxes a controller action's future. Use it inside
/// [`Controller::call`](crate::Controller::call).
pub fn boxed<F, R>(fut: F) -> BoxFuture
where
    F: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    Box::pin(async move { fut.await.into_outcome() })
}

// ── Handler references ────────────────────────────────────────────────────────

/// A `"TypeName:methodName"` reference resolved through the container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedRef {
    type_name: String,
    method: String,
}

impl NamedRef {
    /// Parses `"TypeName:methodName"`. Both halves must be non-empty.
    pub fn parse(reference: &str) -> Result<Self, Error> {
        match reference.split_once(':') {
            Some((type_name, method))
                if !type_name.is_empty() && !method.is_empty() && !method.contains(':') =>
            {
                Ok(Self { type_name: type_name.to_owned(), method: method.to_owned() })
            }
            _ => Err(Error::InvalidHandlerRef(reference.to_owned())),
        }
    }

    pub fn type_name(&self) -> &str { &self.type_name }
    pub fn method(&self) -> &str { &self.method }
}

/// What a route resolves to.
#[derive(Clone)]
pub enum HandlerRef {
    Inline(BoxedHandler),
    Named(NamedRef),
}

impl std::fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(..)"),
            Self::Named(named) => write!(f, "Named({}:{})", named.type_name, named.method),
        }
    }
}

/// Route target naming a controller action, e.g. `to("UserController:show")`.
///
/// The reference is validated when the route is registered.
pub fn to(reference: &str) -> Target {
    Target(reference.to_owned())
}

/// An unvalidated `"TypeName:methodName"` route target. Built with [`to`].
pub struct Target(String);

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route target.
///
/// Satisfied automatically by any `async fn` (or closure returning a future)
/// with the signature
///
/// ```text
/// async fn name(req: Request) -> impl IntoOutcome
/// ```
///
/// and by [`Target`] values from [`to`]. Sealed: only those impls exist.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_handler_ref(self) -> Result<HandlerRef, Error>;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_handler_ref(self) -> Result<HandlerRef, Error> {
        Ok(HandlerRef::Inline(Arc::new(FnHandler(self))))
    }
}

impl private::Sealed for Target {}

impl Handler for Target {
    fn into_handler_ref(self) -> Result<HandlerRef, Error> {
        NamedRef::parse(&self.0).map(HandlerRef::Named)
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_references() {
        let named = NamedRef::parse("UserController:show").unwrap();
        assert_eq!(named.type_name(), "UserController");
        assert_eq!(named.method(), "show");
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in ["UserController", ":show", "UserController:", "a:b:c"] {
            assert!(matches!(NamedRef::parse(bad), Err(Error::InvalidHandlerRef(_))), "{bad}");
        }
    }

    #[test]
    fn io_errors_become_faults() {
        fn read() -> Result<Response, Abort> {
            Ok(Err::<Response, _>(std::io::Error::other("disk gone"))?)
        }
        match read() {
            Err(Abort::Fault(cause)) => assert_eq!(cause.to_string(), "disk gone"),
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn results_convert_into_outcomes() {
        let ok: Result<&'static str, Abort> = Ok("fine");
        assert_eq!(ok.into_outcome().unwrap().body(), "fine".as_bytes());

        let stopped: Result<Response, Abort> = Err(Abort::stop(StatusCode::FORBIDDEN));
        match stopped.into_outcome() {
            Err(Abort::Stop(resp)) => assert_eq!(resp.status_code(), StatusCode::FORBIDDEN),
            other => panic!("expected stop, got {other:?}"),
        }
    }
}
