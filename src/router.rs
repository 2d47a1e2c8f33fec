//! Radix-tree request router with Express-style middleware chains.
//!
//! One tree per HTTP method plus one for [`Router::all`]. O(path-length)
//! lookup. A matched route yields a chain:
//!
//! ```text
//! use_middleware…  →  param handlers…  →  route middleware…
//! ```
//!
//! which runs through [`Next`]. Failures go to the [`Router::on_error`]
//! handlers in registration order. If nothing sends a response the client
//! gets `404`. Middleware panics are not caught here; see
//! [`middleware`](crate::middleware).

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use matchit::Router as MatchitRouter;
use serde_json::json;

use crate::error::Error;
use crate::method::Method;
use crate::middleware::{from_fn, BoxedErrorHandler, BoxedMiddleware, BoxedParamHandler, Next};
use crate::request::Request;
use crate::response::Response;

type Chain = Arc<[BoxedMiddleware]>;

/// The application router.
///
/// Build it once at startup, directly or through a
/// [`RouteFacade`](crate::RouteFacade), then pass it to
/// [`Server::serve`](crate::Server::serve).
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Chain>>,
    any: MatchitRouter<Chain>,
    stack: Vec<BoxedMiddleware>,
    params: HashMap<String, Vec<BoxedParamHandler>>,
    errors: Arc<[BoxedErrorHandler]>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            any: MatchitRouter::new(),
            stack: Vec::new(),
            params: HashMap::new(),
            errors: Arc::from(Vec::new()),
        }
    }

    /// Registers a middleware chain for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    pub fn on(&mut self, method: Method, path: &str, chain: Vec<BoxedMiddleware>) -> Result<&mut Self, Error> {
        insert(self.routes.entry(method).or_insert_with(MatchitRouter::new), path, chain)?;
        Ok(self)
    }

    /// Registers a chain that answers every method not registered with
    /// [`Router::on`] for the same path.
    pub fn all(&mut self, path: &str, chain: Vec<BoxedMiddleware>) -> Result<&mut Self, Error> {
        insert(&mut self.any, path, chain)?;
        Ok(self)
    }

    /// Appends middleware that runs before every matched route.
    pub fn use_middleware(&mut self, mw: BoxedMiddleware) -> &mut Self {
        self.stack.push(mw);
        self
    }

    /// Runs `handler` for every matched route that has a `{name}` parameter.
    pub fn param(&mut self, name: &str, handler: BoxedParamHandler) -> &mut Self {
        self.params.entry(name.to_owned()).or_default().push(handler);
        self
    }

    /// Appends an error handler, reached through [`Next::fail`].
    pub fn on_error(&mut self, handler: BoxedErrorHandler) -> &mut Self {
        self.errors = self.errors.iter().cloned().chain([handler]).collect();
        self
    }

    /// Registers several methods on one path.
    ///
    /// ```rust
    /// # fn main() -> Result<(), tsu_loader::Error> {
    /// use tsu_loader::{middleware, Method, Router};
    ///
    /// let ok = middleware::from_fn(|req, res, next| next.run(req, res));
    /// let mut router = Router::new();
    /// router.route("/book")
    ///     .on(Method::Get, vec![ok.clone()])?
    ///     .on(Method::Post, vec![ok])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn route(&mut self, path: &str) -> Route<'_> {
        Route { router: self, path: path.to_owned() }
    }

    fn lookup(&self, method: Method, path: &str) -> Option<(Chain, Vec<(String, String)>)> {
        let matched = self.routes.get(&method)
            .and_then(|tree| tree.at(path).ok())
            .or_else(|| self.any.at(path).ok())?;
        let chain = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((chain, params))
    }

    /// Routes one request and produces one response.
    pub async fn dispatch(&self, req: Request) -> Response {
        let Some((route, params)) = self.lookup(req.method(), req.path()) else {
            return not_found();
        };

        let mut chain = self.stack.clone();
        for (name, value) in &params {
            for handler in self.params.get(name).into_iter().flatten() {
                let handler = Arc::clone(handler);
                let value = value.clone();
                chain.push(from_fn(move |req, res, next| handler.call(req, res, next, value.clone())));
            }
        }
        chain.extend(route.iter().cloned());

        let req = req.with_params(params.into_iter().collect());
        let res = Next::new(chain.into(), Arc::clone(&self.errors))
            .run(req, Response::new())
            .await;

        if res.headers_sent() { res } else { not_found() }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

fn insert(tree: &mut MatchitRouter<Chain>, path: &str, chain: Vec<BoxedMiddleware>) -> Result<(), Error> {
    tree.insert(path, chain.into())
        .map_err(|source| Error::Route { path: path.to_owned(), source })
}

fn not_found() -> Response {
    let mut res = Response::new();
    res.json(StatusCode::NOT_FOUND, &json!({ "error": "Not Found" }));
    res
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// Several registrations on one path. Obtain via [`Router::route`].
pub struct Route<'a> {
    router: &'a mut Router,
    path: String,
}

impl Route<'_> {
    pub fn on(self, method: Method, chain: Vec<BoxedMiddleware>) -> Result<Self, Error> {
        self.router.on(method, &self.path, chain)?;
        Ok(self)
    }

    pub fn all(self, chain: Vec<BoxedMiddleware>) -> Result<Self, Error> {
        self.router.all(&self.path, chain)?;
        Ok(self)
    }
}
