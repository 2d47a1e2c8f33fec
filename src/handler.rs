//! Terminal handler trait and type erasure.
//!
//! A terminal handler is the last entry of a route. It does not touch the
//! response or the chain: it returns a value, and the facade turns that value
//! into the response (see [`RouteFacade`](crate::RouteFacade)). What earlier
//! middleware stored in `res.locals` is visible through
//! [`Request::locals`](crate::Request::locals).
//!
//! # How handlers are stored
//!
//! Handlers of different types end up in the same chain, so each one is hidden
//! behind a trait object that yields the result already converted to JSON:
//!
//! ```text
//! async fn list(req: Request) -> anyhow::Result<Vec<Book>>  ← user writes this
//!        ↓ facade.get("/book", vec![], list)
//! list.into_boxed_handler()                                  ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(list))                                  ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time                         ← one vtable dispatch
//!        ↓
//! Box::pin(async { serde_json::to_value(list(req).await?) })
//! ```
//!
//! Synchronous handlers go through [`ready`], which produces an already
//! resolved future, so both kinds answer identically.

use std::future::{self, Future};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::middleware::BoxFuture;
use crate::request::Request;

// ── Internal types ────────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture<anyhow::Result<Value>>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid terminal handler.
///
/// You never implement this yourself. It is satisfied by
///
/// ```text
/// async fn name(req: Request) -> Result<impl Serialize, impl Into<anyhow::Error>>
/// ```
///
/// and by synchronous functions wrapped in [`ready`]. The trait is sealed.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Async functions ───────────────────────────────────────────────────────────

impl<F, Fut, T, E> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Serialize,
    E: Into<anyhow::Error>,
{
}

impl<F, Fut, T, E> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Serialize,
    E: Into<anyhow::Error>,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, T, E> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Serialize,
    E: Into<anyhow::Error>,
{
    fn call(&self, req: Request) -> BoxFuture<anyhow::Result<Value>> {
        let fut = (self.0)(req);
        Box::pin(async move {
            let value = fut.await.map_err(Into::<anyhow::Error>::into)?;
            serde_json::to_value(value).map_err(anyhow::Error::from)
        })
    }
}

// ── Synchronous functions ─────────────────────────────────────────────────────

/// A synchronous terminal handler. Build with [`ready`].
pub struct Ready<F>(F);

/// Wraps a synchronous function so it can terminate a route.
///
/// ```rust
/// use tsu_loader::{handler, Request};
///
/// let list = handler::ready(|_req: Request| Ok::<_, anyhow::Error>(vec![1, 2, 3]));
/// ```
pub fn ready<F, T, E>(f: F) -> Ready<F>
where
    F: Fn(Request) -> Result<T, E> + Send + Sync + 'static,
    T: Serialize,
    E: Into<anyhow::Error>,
{
    Ready(f)
}

impl<F, T, E> private::Sealed for Ready<F>
where
    F: Fn(Request) -> Result<T, E> + Send + Sync + 'static,
    T: Serialize,
    E: Into<anyhow::Error>,
{
}

impl<F, T, E> Handler for Ready<F>
where
    F: Fn(Request) -> Result<T, E> + Send + Sync + 'static,
    T: Serialize,
    E: Into<anyhow::Error>,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}

impl<F, T, E> ErasedHandler for Ready<F>
where
    F: Fn(Request) -> Result<T, E> + Send + Sync + 'static,
    T: Serialize,
    E: Into<anyhow::Error>,
{
    fn call(&self, req: Request) -> BoxFuture<anyhow::Result<Value>> {
        let result = (self.0)(req)
            .map_err(Into::<anyhow::Error>::into)
            .and_then(|value| serde_json::to_value(value).map_err(anyhow::Error::from));
        Box::pin(future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::method::Method;

    async fn titles(_req: Request) -> anyhow::Result<Vec<&'static str>> {
        Ok(vec!["sample"])
    }

    #[tokio::test]
    async fn async_and_ready_handlers_agree() {
        let deferred = titles.into_boxed_handler();
        let immediate = ready(|_req: Request| Ok::<_, anyhow::Error>(vec!["sample"])).into_boxed_handler();

        let a = deferred.call(Request::new(Method::Get, "/")).await.unwrap();
        let b = immediate.call(Request::new(Method::Get, "/")).await.unwrap();
        assert_eq!(a, json!(["sample"]));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn errors_are_converted() {
        let failing = ready(|_req: Request| -> Result<(), std::io::Error> {
            Err(std::io::Error::other("disk"))
        })
        .into_boxed_handler();

        let err = failing.call(Request::new(Method::Get, "/")).await.unwrap_err();
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }
}
