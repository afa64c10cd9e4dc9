//! # switchyard
//!
//! The routing-and-dispatch core of a minimal HTTP application server.
//!
//! ## What it does
//!
//! - **Route table**: `(methods, pattern, handler)` triples registered at
//!   setup, in order. Patterns are literal segments plus `{name}` captures.
//! - **Matcher**: the table compiled once into a read-only structure that
//!   answers `Found`, `MethodNotAllowed` or `NotFound` for a method + path.
//!   The first registered route whose shape and method match wins.
//! - **Dispatcher**: resolves the handler (an inline async fn, or a
//!   `"TypeName:methodName"` controller built from the [`Container`]),
//!   runs it, and escalates failures.
//! - **Escalation**: not-found, method-not-allowed and handler faults go to
//!   the `notFoundHandler`, `notAllowedHandler` and `errorHandler` fallbacks
//!   registered in the container. A handler can also stop early with a
//!   ready response via [`Abort::Stop`].
//! - **Serving loop**: hyper over tokio, graceful shutdown on SIGTERM.
//!
//! What it leaves out: middleware, templating, sessions, TLS. Put a
//! reverse proxy in front for the last one.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use switchyard::{Abort, Container, Dispatcher, Request, Response, Router, Server, handlers};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), switchyard::Error> {
//!     let mut routes = Router::new();
//!     routes.get("/users/{id}", get_user);
//!     routes.post("/users", create_user);
//!
//!     let mut container = Container::new();
//!     container.set_not_found_handler(handlers::not_found);
//!
//!     let dispatcher = Dispatcher::new(routes, container)?;
//!     Server::bind("0.0.0.0:3000")?.serve(dispatcher).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_user(req: Request) -> Result<Response, Abort> {
//!     if req.body().is_empty() {
//!         return Err(Abort::stop(switchyard::StatusCode::BAD_REQUEST));
//!     }
//!     Ok(Response::builder()
//!         .status(switchyard::StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(r#"{"id":"99"}"#))
//! }
//! ```

mod config;
mod container;
mod dispatcher;
mod error;
mod escalation;
mod matcher;
mod method;
mod pattern;
mod request;
mod response;
mod router;
mod server;

pub mod handler;
pub mod handlers;

pub use config::Settings;
pub use container::{Container, Controller, ERROR_HANDLER, NOT_ALLOWED_HANDLER, NOT_FOUND_HANDLER};
pub use dispatcher::{Dispatcher, normalize_path};
pub use error::{BoxError, Error};
pub use escalation::{Condition, escalate};
pub use handler::{Abort, BoxFuture, Handler, HandlerRef, IntoOutcome, NamedRef, Outcome};
pub use http::{Method, StatusCode};
pub use matcher::{DispatchOutcome, Matcher};
pub use method::{ANY, Methods};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::{RouteDefinition, RouteId, Router};
pub use server::Server;
