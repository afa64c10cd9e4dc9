//! Unified error type.

use thiserror::Error;

use crate::escalation::Condition;

/// The cause carried by a handler fault.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by switchyard's fallible operations.
///
/// Registration and compile errors are programmer errors surfaced at setup.
/// [`Error::NoFallbackRegistered`] is the only variant produced per request:
/// it means a routing failure or handler fault had nowhere to go, and the
/// serving loop answers with a generic response instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("route `{0}` declares no methods")]
    EmptyMethods(String),

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid handler reference `{0}`, expected `TypeName:methodName`")]
    InvalidHandlerRef(String),

    #[error("route `{pattern}` is unreachable for {method}: shadowed by earlier route `{by}`")]
    ShadowedRoute {
        pattern: String,
        method: http::Method,
        by: String,
    },

    #[error("no controller registered under `{0}`")]
    UnknownController(String),

    #[error("controller `{controller}` has no action `{action}`")]
    UnknownAction { controller: String, action: String },

    #[error("no fallback handler registered for {0}")]
    NoFallbackRegistered(Condition),

    #[error("invalid setting `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),
}
