//! Middleware layer.
//!
//! Middleware intercepts requests and is the right place for cross-cutting
//! concerns: role checks, request-id injection, tracing. It follows the
//! Express contract, expressed with ownership instead of shared mutation:
//!
//! ```text
//! async fn mw(req: Request, res: Response, next: Next) -> Response
//! ```
//!
//! - continue:       `next.run(req, res).await`
//! - fail:           `next.fail(req, res, err).await`   (jumps to error handlers)
//! - short-circuit:  send on `res` and return it without calling `next`
//!
//! Whatever the chain returns is what the client receives.
//!
//! Panics are not caught at this layer. A panicking middleware, param
//! handler or error handler unwinds out of [`Router::dispatch`](crate::Router::dispatch)
//! and the connection task ends without a response. Only terminal handlers
//! and templaters registered through [`RouteFacade`](crate::RouteFacade) have
//! their panics turned into [`Next::fail`] calls.
//!
//! # How middleware is stored
//!
//! Chains hold middleware of different concrete types, so every entry is
//! erased to [`BoxedMiddleware`] (`Arc<dyn Middleware>`). One Arc clone and one
//! virtual call per hop.

mod next;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::Response;

pub use next::Next;

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` because the runtime polls it in place; `Send + 'static` so
/// tokio may move it between worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

// ── Middleware ────────────────────────────────────────────────────────────────

/// Implemented for every `Fn(Request, Response, Next) -> impl Future<Output = Response>`.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<Response>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<Response> {
        Box::pin((self)(req, res, next))
    }
}

/// Shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Boxes a closure as middleware.
///
/// Prefer this over a bare `impl Middleware` argument when passing closures:
/// the explicit `Fn` bound lets the compiler infer the argument types.
///
/// ```rust
/// use tsu_loader::middleware;
///
/// let passthrough = middleware::from_fn(|req, res, next| next.run(req, res));
/// ```
pub fn from_fn<F, Fut>(f: F) -> BoxedMiddleware
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(f)
}

// ── Error handlers ────────────────────────────────────────────────────────────

/// Error-handling middleware, reached through [`Next::fail`].
///
/// Call `next.fail(req, res, err)` to pass the error on to the next handler,
/// or send on `res` to answer the client.
pub trait ErrorHandler: Send + Sync + 'static {
    fn call(&self, err: anyhow::Error, req: Request, res: Response, next: Next) -> BoxFuture<Response>;
}

impl<F, Fut> ErrorHandler for F
where
    F: Fn(anyhow::Error, Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, err: anyhow::Error, req: Request, res: Response, next: Next) -> BoxFuture<Response> {
        Box::pin((self)(err, req, res, next))
    }
}

pub type BoxedErrorHandler = Arc<dyn ErrorHandler>;

/// Boxes a closure as an error handler.
pub fn error_fn<F, Fut>(f: F) -> BoxedErrorHandler
where
    F: Fn(anyhow::Error, Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(f)
}

// ── Param handlers ────────────────────────────────────────────────────────────

/// Runs before the route chain whenever the matched route has the named
/// parameter. Receives the parameter value as its last argument.
pub trait ParamHandler: Send + Sync + 'static {
    fn call(&self, req: Request, res: Response, next: Next, value: String) -> BoxFuture<Response>;
}

impl<F, Fut> ParamHandler for F
where
    F: Fn(Request, Response, Next, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request, res: Response, next: Next, value: String) -> BoxFuture<Response> {
        Box::pin((self)(req, res, next, value))
    }
}

pub type BoxedParamHandler = Arc<dyn ParamHandler>;

/// Boxes a closure as a param handler.
pub fn param_fn<F, Fut>(f: F) -> BoxedParamHandler
where
    F: Fn(Request, Response, Next, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(f)
}
