//! Error types.
//!
//! Two families live here. Startup errors ([`Error`], [`ConfigError`],
//! [`ResolutionError`]) are raised while the facade is built or while
//! controllers mount their routes; they are programmer mistakes and surface
//! through `?`. Per-request failures travel as [`anyhow::Error`] through
//! [`Next::fail`](crate::Next::fail) and never escape the chain.
//! [`HttpError`] is the one per-request error the default finalizer knows how
//! to turn into a status code.

use http::StatusCode;

use crate::callback::TypeTag;
use crate::method::Method;

/// The error type returned by tsu-loader's fallible startup operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("invalid route `{path}`: {source}")]
    Route {
        path: String,
        #[source]
        source: matchit::InsertError,
    },
}

/// Invalid facade configuration. Detected when the facade is constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("type_callbacks.{0} is not a known type tag")]
    UnknownTypeTag(String),

    #[error("type_callbacks.function cannot be resolved: middleware is mounted as-is")]
    FunctionTypeTag,

    #[error("conditions property not found in type_callbacks[{0}]")]
    MissingConditions(usize),

    #[error("callback property not found in type_callbacks[{0}]")]
    MissingCallback(usize),

    #[error("type_callbacks is a {registry} registry, a {added} entry cannot be added to it")]
    MixedForms { registry: &'static str, added: &'static str },

    #[error("status_code.{0} is not an HTTP method")]
    UnknownStatusVerb(String),

    #[error("status_code.{verb} = {code} is not a valid status code")]
    InvalidStatusCode { verb: String, code: u16 },
}

/// A route callback token that no configured resolver accepts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("no resolver registered for type tag `{tag}` when mounting `{method} {path}`")]
    UnknownTag {
        tag: TypeTag,
        method: Method,
        path: String,
    },

    #[error("no callback found when mounting `{method} {path}`")]
    NoMatch { method: Method, path: String },
}

/// A per-request failure that carries the status the client should see.
///
/// Return it (wrapped in `anyhow::Error`) from a handler or pass it to
/// [`Next::fail`](crate::Next::fail); the default error finalizer answers with
/// its status instead of `500`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}
