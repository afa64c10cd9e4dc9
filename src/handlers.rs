//! Stock fallback handlers.
//!
//! Register them in the container when you want the plain defaults:
//!
//! ```rust
//! use switchyard::{Container, handlers};
//!
//! let mut container = Container::new();
//! container.set_not_found_handler(handlers::not_found);
//! container.set_not_allowed_handler(handlers::not_allowed);
//! container.set_error_handler(handlers::internal_error);
//! ```
//!
//! The serving loop produces the same responses on its own when a condition
//! has no fallback registered.

use http::header::{ALLOW, HeaderValue};
use http::StatusCode;

use crate::error::BoxError;
use crate::method::Methods;
use crate::request::Request;
use crate::response::{ContentType, Response};

/// `404` with a minimal HTML body.
pub async fn not_found(_req: Request) -> Response {
    not_found_response()
}

/// `405` with an `Allow` header listing what the path accepts.
pub async fn not_allowed(_req: Request, allowed: Methods) -> Response {
    not_allowed_response(&allowed)
}

/// `500` with a generic body. The cause is never echoed to the client.
pub async fn internal_error(_req: Request, _cause: BoxError) -> Response {
    internal_error_response(None)
}

pub(crate) fn not_found_response() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .bytes(ContentType::Html, "<h1>Not found</h1>")
}

pub(crate) fn not_allowed_response(allowed: &Methods) -> Response {
    let mut res = Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .text("Method Not Allowed");
    if let Ok(value) = HeaderValue::try_from(allowed.to_string()) {
        res.set_header(ALLOW, value);
    }
    res
}

/// `detail` is only shown when the operator opted in to error details.
pub(crate) fn internal_error_response(detail: Option<&str>) -> Response {
    let body = match detail {
        Some(detail) => format!("Internal Server Error: {detail}"),
        None => "Internal Server Error".to_owned(),
    };
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .text(body)
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;

    fn request() -> Request {
        Request::new(Method::GET, "/".parse().unwrap())
    }

    #[tokio::test]
    async fn not_found_is_404_html() {
        let res = not_found(request()).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body(), "<h1>Not found</h1>".as_bytes());
    }

    #[tokio::test]
    async fn not_allowed_sets_allow_header() {
        let res = not_allowed(request(), [Method::GET, Method::POST].into()).await;
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[ALLOW], "GET, POST");
    }

    #[tokio::test]
    async fn internal_error_hides_cause() {
        let res = internal_error(request(), "secret connection string".into()).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), "Internal Server Error".as_bytes());
    }
}
