//! The serving loop and graceful shutdown.
//!
//! Per request the loop does three things and nothing more:
//!
//! 1. Collect the body and hand a [`Request`] to [`Dispatcher::handle`].
//! 2. Turn an unhandled condition (no fallback registered, or a panic that
//!    escaped dispatch) into a generic response. One bad request never takes
//!    the process down.
//! 3. Set `X-Powered-By` and write the response.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting, lets every in-flight
//! connection finish, then returns from [`Server::serve`].

use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::dispatcher::{Dispatcher, panic_cause};
use crate::error::Error;
use crate::escalation::Condition;
use crate::handlers;
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    options: Arc<Options>,
}

/// What the per-request glue needs from the settings.
struct Options {
    powered_by: HeaderValue,
    display_error_details: bool,
    max_body_bytes: usize,
}

impl Server {
    /// Configures the server to bind to `addr` with default settings.
    ///
    /// ```rust
    /// use switchyard::Server;
    /// let server = Server::bind("127.0.0.1:3000").unwrap();
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let settings = Settings::default();
        Self::with_addr(addr, &settings)
    }

    /// Configures the server from loaded [`Settings`].
    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        Self::with_addr(&settings.addr(), settings)
    }

    fn with_addr(addr: &str, settings: &Settings) -> Result<Self, Error> {
        let addr = addr
            .parse()
            .map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        let powered_by = HeaderValue::try_from(settings.powered_by.as_str()).map_err(|e| {
            Error::InvalidSetting { field: "powered_by", reason: e.to_string() }
        })?;
        Ok(Self {
            addr,
            options: Arc::new(Options {
                powered_by,
                display_error_details: settings.display_error_details,
                max_body_bytes: settings.max_body_bytes,
            }),
        })
    }

    /// Serves until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<(), Error> {
        self.serve_with_shutdown(dispatcher, shutdown_signal()).await
    }

    /// Serves until `signal` resolves, then drains.
    pub async fn serve_with_shutdown(
        self,
        dispatcher: Dispatcher,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_on(listener, dispatcher, signal).await
    }

    /// Serves an already-bound listener. The configured address is ignored.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        dispatcher: Dispatcher,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let local = listener.local_addr()?;
        let dispatcher = Arc::new(dispatcher);

        info!(addr = %local, routes = dispatcher.matcher().len(), "switchyard listening");

        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);
                    let options = Arc::clone(&self.options);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            let options = Arc::clone(&options);
                            async move { serve_request(&dispatcher, &options, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet stays small.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("switchyard stopped");
        Ok(())
    }
}

// ── Request glue ──────────────────────────────────────────────────────────────

/// Routes one request and produces one response. Never fails: every failure
/// is answered with a status code so hyper never sees an error.
async fn serve_request(
    dispatcher: &Dispatcher,
    options: &Options,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();

    let mut response = match Limited::new(body, options.max_body_bytes).collect().await {
        Ok(collected) => {
            let req = Request::from_parts(
                parts.method,
                parts.uri,
                parts.headers,
                collected.to_bytes(),
                Some(remote_addr),
            );
            let handled = AssertUnwindSafe(dispatcher.handle(req)).catch_unwind().await;
            match handled {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => unhandled(e, options),
                Err(panic) => {
                    let cause = panic_cause(panic);
                    error!(peer = %remote_addr, "dispatch panicked: {cause}");
                    handlers::internal_error_response(
                        options.display_error_details.then(|| cause.to_string()).as_deref(),
                    )
                }
            }
        }
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(peer = %remote_addr, limit = options.max_body_bytes, "request body too large");
            Response::status(StatusCode::PAYLOAD_TOO_LARGE)
        }
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            Response::status(StatusCode::BAD_REQUEST)
        }
    };

    response.set_header(HeaderName::from_static("x-powered-by"), options.powered_by.clone());
    Ok(response.into_inner())
}

/// The safe default for a condition nobody handled.
fn unhandled(e: Error, options: &Options) -> Response {
    match e {
        Error::NoFallbackRegistered(Condition::RouteNotFound) => handlers::not_found_response(),
        Error::NoFallbackRegistered(Condition::MethodNotAllowed { allowed }) => {
            handlers::not_allowed_response(&allowed)
        }
        Error::NoFallbackRegistered(Condition::ExplicitStop { response }) => response,
        other => {
            let detail = options.display_error_details.then(|| other.to_string());
            handlers::internal_error_response(detail.as_deref())
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C only on Windows).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
