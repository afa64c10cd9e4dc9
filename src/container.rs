//! Service container.
//!
//! A named registry built once at startup and read by every request. It
//! answers three kinds of lookup:
//!
//! - **Services**: arbitrary shared values, eager ([`Container::insert`]) or
//!   lazy ([`Container::factory`]). A lazy service is built at most once,
//!   even when the first requests race for it.
//! - **Controllers**: `"TypeName:methodName"` route targets. The named type
//!   is built fresh per request with the container injected, then asked to
//!   run the named action.
//! - **Fallbacks**: the handlers the escalation chain looks up under
//!   `notFoundHandler`, `notAllowedHandler` and `errorHandler`.
//!
//! ```rust
//! use std::sync::Arc;
//! use switchyard::{Container, Controller, Request, Response, handler::{self, BoxFuture}};
//!
//! struct Greeter { greeting: Arc<String> }
//!
//! impl Controller for Greeter {
//!     fn new(container: Arc<Container>) -> Self {
//!         let greeting = container.get::<String>("greeting").unwrap_or_default();
//!         Self { greeting }
//!     }
//!
//!     fn call(self, action: &str, req: Request) -> Option<BoxFuture> {
//!         match action {
//!             "hello" => Some(handler::boxed(async move {
//!                 Response::text(format!("{} {}", self.greeting, req.param("name").unwrap_or("?")))
//!             })),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let mut container = Container::new();
//! container.insert("greeting", "hello".to_owned());
//! container.register_controller::<Greeter>("Greeter");
//! assert!(container.has("Greeter"));
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use tracing::warn;

use crate::error::{BoxError, Error};
use crate::handler::{BoxFuture, NamedRef};
use crate::method::Methods;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Name of the fallback for unmatched paths.
pub const NOT_FOUND_HANDLER: &str = "notFoundHandler";
/// Name of the fallback for matched paths with an unaccepted method.
pub const NOT_ALLOWED_HANDLER: &str = "notAllowedHandler";
/// Name of the fallback for handler faults.
pub const ERROR_HANDLER: &str = "errorHandler";

type AnyArc = Arc<dyn Any + Send + Sync>;
type FallbackFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

pub(crate) type NotFoundFn = Arc<dyn Fn(Request) -> FallbackFuture + Send + Sync>;
pub(crate) type NotAllowedFn = Arc<dyn Fn(Request, Methods) -> FallbackFuture + Send + Sync>;
pub(crate) type ErrorFn = Arc<dyn Fn(Request, BoxError) -> FallbackFuture + Send + Sync>;
type ControllerFn = Arc<dyn Fn(Arc<Container>, &str, Request) -> Option<BoxFuture> + Send + Sync>;

/// A type reachable through a `"TypeName:methodName"` route target.
///
/// One instance is built per request via [`Controller::new`]; it is then
/// consumed by [`Controller::call`], which returns the action's future or
/// `None` when the type has no such action.
pub trait Controller: Send + Sync + Sized + 'static {
    fn new(container: Arc<Container>) -> Self;

    fn call(self, action: &str, req: Request) -> Option<BoxFuture>;
}

enum Entry {
    Value(AnyArc),
    Lazy {
        factory: Arc<dyn Fn(&Container) -> AnyArc + Send + Sync>,
        cell: OnceLock<AnyArc>,
    },
    Controller(ControllerFn),
    NotFound(NotFoundFn),
    NotAllowed(NotAllowedFn),
    Error(ErrorFn),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Lazy { .. } => "lazy",
            Self::Controller(_) => "controller",
            Self::NotFound(_) | Self::NotAllowed(_) | Self::Error(_) => "fallback",
        }
    }
}

thread_local! {
    /// Lazy cells whose factories are running on this thread.
    static BUILDING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks one lazy cell as under construction until dropped.
struct Building(usize);

impl Building {
    /// `None` if this thread is already building the cell.
    fn enter(cell: &OnceLock<AnyArc>) -> Option<Self> {
        let key = std::ptr::from_ref(cell) as usize;
        BUILDING.with_borrow_mut(|building| {
            if building.contains(&key) {
                return None;
            }
            building.push(key);
            Some(Self(key))
        })
    }
}

impl Drop for Building {
    fn drop(&mut self) {
        BUILDING.with_borrow_mut(|building| building.retain(|key| *key != self.0));
    }
}

/// The named service registry threaded through setup and dispatch.
#[derive(Default)]
pub struct Container {
    entries: HashMap<String, Entry>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, entry) in &self.entries {
            map.entry(name, &entry.kind());
        }
        map.finish()
    }
}

impl Container {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// True if anything is registered under `name`.
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registers a ready value. Replaces any previous entry of that name.
    pub fn insert<T: Any + Send + Sync>(&mut self, name: &str, value: T) {
        self.entries.insert(name.to_owned(), Entry::Value(Arc::new(value)));
    }

    /// Registers a value built on first [`get`](Container::get). The factory
    /// runs at most once; concurrent first callers wait for it.
    pub fn factory<T, F>(&mut self, name: &str, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> T + Send + Sync + 'static,
    {
        let factory = Arc::new(move |c: &Container| -> AnyArc { Arc::new(factory(c)) });
        self.entries
            .insert(name.to_owned(), Entry::Lazy { factory, cell: OnceLock::new() });
    }

    /// Fetches a service. `None` if absent, not a service, or not a `T`.
    ///
    /// A lazy service that asks for itself while being built, directly or
    /// through other lazy services, gets `None` for the inner lookup.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let value = match self.entries.get(name)? {
            Entry::Value(value) => Arc::clone(value),
            Entry::Lazy { factory, cell } => match cell.get() {
                Some(value) => Arc::clone(value),
                None => {
                    let Some(_building) = Building::enter(cell) else {
                        warn!(service = name, "lazy service depends on itself");
                        return None;
                    };
                    Arc::clone(cell.get_or_init(|| factory(self)))
                }
            },
            _ => return None,
        };
        value.downcast::<T>().ok()
    }

    /// Makes `C` reachable as `type_name` in `"TypeName:methodName"` targets.
    pub fn register_controller<C: Controller>(&mut self, type_name: &str) {
        let build: ControllerFn =
            Arc::new(|container: Arc<Container>, action: &str, req: Request| {
                C::new(container).call(action, req)
            });
        self.entries.insert(type_name.to_owned(), Entry::Controller(build));
    }

    /// Registers the `notFoundHandler` fallback.
    pub fn set_not_found_handler<F, Fut, R>(&mut self, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + Send + 'static,
    {
        let handler: NotFoundFn = Arc::new(move |req| -> FallbackFuture {
            let fut = handler(req);
            Box::pin(async move { fut.await.into_response() })
        });
        self.entries.insert(NOT_FOUND_HANDLER.to_owned(), Entry::NotFound(handler));
    }

    /// Registers the `notAllowedHandler` fallback. It receives the methods
    /// the path does accept.
    pub fn set_not_allowed_handler<F, Fut, R>(&mut self, handler: F)
    where
        F: Fn(Request, Methods) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + Send + 'static,
    {
        let handler: NotAllowedFn = Arc::new(move |req, allowed| -> FallbackFuture {
            let fut = handler(req, allowed);
            Box::pin(async move { fut.await.into_response() })
        });
        self.entries.insert(NOT_ALLOWED_HANDLER.to_owned(), Entry::NotAllowed(handler));
    }

    /// Registers the `errorHandler` fallback. It receives the fault's cause.
    pub fn set_error_handler<F, Fut, R>(&mut self, handler: F)
    where
        F: Fn(Request, BoxError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + Send + 'static,
    {
        let handler: ErrorFn = Arc::new(move |req, cause| -> FallbackFuture {
            let fut = handler(req, cause);
            Box::pin(async move { fut.await.into_response() })
        });
        self.entries.insert(ERROR_HANDLER.to_owned(), Entry::Error(handler));
    }

    pub(crate) fn not_found_handler(&self) -> Option<NotFoundFn> {
        match self.entries.get(NOT_FOUND_HANDLER)? {
            Entry::NotFound(h) => Some(Arc::clone(h)),
            _ => None,
        }
    }

    pub(crate) fn not_allowed_handler(&self) -> Option<NotAllowedFn> {
        match self.entries.get(NOT_ALLOWED_HANDLER)? {
            Entry::NotAllowed(h) => Some(Arc::clone(h)),
            _ => None,
        }
    }

    pub(crate) fn error_handler(&self) -> Option<ErrorFn> {
        match self.entries.get(ERROR_HANDLER)? {
            Entry::Error(h) => Some(Arc::clone(h)),
            _ => None,
        }
    }

    /// Builds the controller named by `target` and starts its action.
    pub(crate) fn call_controller(
        self: &Arc<Self>,
        target: &NamedRef,
        req: Request,
    ) -> Result<BoxFuture, Error> {
        let build = match self.entries.get(target.type_name()) {
            Some(Entry::Controller(build)) => Arc::clone(build),
            _ => return Err(Error::UnknownController(target.type_name().to_owned())),
        };
        build(Arc::clone(self), target.method(), req).ok_or_else(|| Error::UnknownAction {
            controller: target.type_name().to_owned(),
            action: target.method().to_owned(),
        })
    }
}
