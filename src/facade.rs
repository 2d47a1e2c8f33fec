//! The route facade controllers register through.
//!
//! [`RouteFacade`] looks like a [`Router`] but does two extra things for every
//! verb method:
//!
//! 1. pre-terminal callbacks are resolved into middleware by the configured
//!    [`TypeCallbacks`], so a route can say `["ADMIN"]` instead of building
//!    a role-check middleware by hand;
//! 2. the terminal handler is wrapped so its return value becomes the
//!    response: status from [`StatusCodes`], body from the templater,
//!    serialised as JSON.
//!
//! ```text
//! facade.post("/book", [token, mw], save)
//!        ↓ resolve_chain
//! [resolved(token), mw, terminal(save)]  ──→  router.on(Post, "/book", …)
//! ```
//!
//! A request through the terminal wrapper ends in exactly one of two states:
//! the response is sent, or the failure is handed to [`Next::fail`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error};

use crate::callback::{resolve_chain, Callback, TypeCallbacks, TypeResolver};
use crate::config::Config;
use crate::error::{ConfigError, Error};
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{from_fn, BoxedErrorHandler, BoxedMiddleware, BoxedParamHandler, Next};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Route, Router};
use crate::status::StatusCodes;

/// Transforms a handler's result before it is sent.
pub type Templater = Arc<dyn Fn(&Request, &Response, Value) -> Value + Send + Sync>;

// ── Options ───────────────────────────────────────────────────────────────────

/// Facade construction options. Everything is optional.
#[derive(Clone, Default)]
pub struct Options {
    templater: Option<Templater>,
    status_codes: StatusCodes,
    status_overrides: Vec<(String, u16)>,
    type_callbacks: Option<TypeCallbacks>,
    pub(crate) ignore: Vec<String>,
}

impl Options {
    pub fn new() -> Self { Self::default() }

    /// Starts from a deserialised [`Config`].
    pub fn from_config(config: Config) -> Self {
        Self {
            status_codes: config.status_code,
            ignore: config.ignore,
            ..Self::default()
        }
    }

    /// Wraps every handler result, e.g. into an `{ success, data }` envelope.
    pub fn templater<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request, &Response, Value) -> Value + Send + Sync + 'static,
    {
        self.templater = Some(Arc::new(f));
        self
    }

    /// Overrides the status code for `verb` (any case) or for `"default"`.
    /// Checked when the facade is built.
    pub fn status_code(mut self, verb: &str, code: u16) -> Self {
        self.status_overrides.push((verb.to_owned(), code));
        self
    }

    pub fn type_callbacks(mut self, callbacks: TypeCallbacks) -> Self {
        self.type_callbacks = Some(callbacks);
        self
    }

    /// Skips the controller named `name` when loading.
    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.ignore.push(name.into());
        self
    }
}

// ── RouteFacade ───────────────────────────────────────────────────────────────

/// Router wrapper that resolves callback tokens and normalises handler results.
pub struct RouteFacade {
    router: Router,
    registry: Option<Arc<dyn TypeResolver>>,
    status_codes: Arc<StatusCodes>,
    templater: Templater,
}

impl RouteFacade {
    /// Builds the facade. Fails if the type callbacks or status overrides are
    /// invalid; nothing is mounted in that case.
    pub fn new(router: Router, options: Options) -> Result<Self, ConfigError> {
        let registry = options.type_callbacks.map(TypeCallbacks::into_resolver).transpose()?;
        let status_codes = options.status_codes.merge(options.status_overrides)?;
        let templater: Templater = match options.templater {
            Some(templater) => templater,
            None => Arc::new(|_: &Request, _: &Response, body: Value| body),
        };

        Ok(Self {
            router,
            registry,
            status_codes: Arc::new(status_codes),
            templater,
        })
    }

    /// Mounts `handler` at `method path`, preceded by `callbacks`.
    ///
    /// Fails if a token cannot be resolved or the path is not a valid route.
    pub fn on<H: Handler>(
        &mut self,
        method: Method,
        path: &str,
        callbacks: Vec<Callback>,
        handler: H,
    ) -> Result<&mut Self, Error> {
        let mut chain = resolve_chain(callbacks, path, method, self.registry.as_deref())?;
        chain.push(self.terminal(handler.into_boxed_handler()));
        debug!(%method, path, middleware = chain.len() - 1, "route mounted");
        self.router.on(method, path, chain)?;
        Ok(self)
    }

    fn terminal(&self, handler: BoxedHandler) -> BoxedMiddleware {
        let status_codes = Arc::clone(&self.status_codes);
        let templater = Arc::clone(&self.templater);

        from_fn(move |req: Request, mut res: Response, next: Next| {
            let handler = Arc::clone(&handler);
            let status_codes = Arc::clone(&status_codes);
            let templater = Arc::clone(&templater);
            async move {
                let call = req.clone().with_locals(res.locals().clone());
                let body = match invoke(&handler, call).await {
                    Ok(body) => body,
                    Err(err) => return next.fail(req, res, err).await,
                };
                if res.headers_sent() {
                    return res;
                }
                match panic::catch_unwind(AssertUnwindSafe(|| templater(&req, &res, body))) {
                    Ok(body) => {
                        res.json(status_codes.for_method(req.method()), &body);
                        res
                    }
                    Err(payload) => next.fail(req, res, panicked("templater", payload)).await,
                }
            }
        })
    }

    // ── Pass-throughs ─────────────────────────────────────────────────────────

    pub fn use_middleware(&mut self, mw: BoxedMiddleware) -> &mut Self {
        self.router.use_middleware(mw);
        self
    }

    pub fn all(&mut self, path: &str, chain: Vec<BoxedMiddleware>) -> Result<&mut Self, Error> {
        self.router.all(path, chain)?;
        Ok(self)
    }

    pub fn param(&mut self, name: &str, handler: BoxedParamHandler) -> &mut Self {
        self.router.param(name, handler);
        self
    }

    pub fn route(&mut self, path: &str) -> Route<'_> {
        self.router.route(path)
    }

    pub fn on_error(&mut self, handler: BoxedErrorHandler) -> &mut Self {
        self.router.on_error(handler);
        self
    }

    /// The wrapped router, for routes that must bypass the facade.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

macro_rules! verbs {
    ($($name:ident => $method:ident),* $(,)?) => {
        impl RouteFacade {
            $(
                #[doc = concat!("Mounts a [`Method::", stringify!($method), "`] route. See [`RouteFacade::on`].")]
                pub fn $name<H: Handler>(
                    &mut self,
                    path: &str,
                    callbacks: Vec<Callback>,
                    handler: H,
                ) -> Result<&mut Self, Error> {
                    self.on(Method::$method, path, callbacks, handler)
                }
            )*
        }
    };
}

verbs! {
    connect    => Connect,
    delete     => Delete,
    get        => Get,
    head       => Head,
    options    => Options,
    patch      => Patch,
    post       => Post,
    put        => Put,
    trace      => Trace,
    copy       => Copy,
    lock       => Lock,
    mkcol      => Mkcol,
    r#move     => Move,
    propfind   => Propfind,
    proppatch  => Proppatch,
    unlock     => Unlock,
    mkcalendar => Mkcalendar,
    report     => Report,
    search     => Search,
    purge      => Purge,
}

/// Runs the handler, turning panics (while building or polling its future)
/// into ordinary failures. The templater gets the same treatment in
/// [`RouteFacade::terminal`].
async fn invoke(handler: &BoxedHandler, req: Request) -> anyhow::Result<Value> {
    let fut = match panic::catch_unwind(AssertUnwindSafe(|| handler.call(req))) {
        Ok(fut) => fut,
        Err(payload) => return Err(panicked("handler", payload)),
    };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(panicked("handler", payload)),
    }
}

fn panicked(stage: &str, payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload.downcast_ref::<&str>().map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned());
    error!("{stage} panicked: {message}");
    anyhow::anyhow!("{stage} panicked: {message}")
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::handler::ready;
    use crate::middleware::error_fn;

    async fn sample(_req: Request) -> anyhow::Result<Value> {
        Ok(json!({ "title": "sample" }))
    }

    async fn exploding(_req: Request) -> anyhow::Result<Value> {
        panic!("kaboom")
    }

    fn facade(options: Options) -> RouteFacade {
        RouteFacade::new(Router::new(), options).unwrap()
    }

    async fn send(facade: RouteFacade, method: Method, path: &str) -> Response {
        facade.into_router().dispatch(Request::new(method, path)).await
    }

    #[test]
    fn construction_fails_fast_on_bad_options() {
        let bad_registry = Options::new().type_callbacks(TypeCallbacks::mapping().on("aray", |_| None));
        assert!(matches!(RouteFacade::new(Router::new(), bad_registry), Err(ConfigError::UnknownTypeTag(_))));

        let bad_status = Options::new().status_code("post", 1000);
        assert!(matches!(RouteFacade::new(Router::new(), bad_status), Err(ConfigError::InvalidStatusCode { .. })));
    }

    #[tokio::test]
    async fn status_follows_method() {
        let mut routes = facade(Options::new());
        routes.post("/book", vec![], sample).unwrap();
        routes.delete("/book", vec![], sample).unwrap();
        routes.search("/book", vec![], sample).unwrap();
        let router = routes.into_router();

        let created = router.dispatch(Request::new(Method::Post, "/book")).await;
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(created.body(), br#"{"title":"sample"}"#);

        let deleted = router.dispatch(Request::new(Method::Delete, "/book")).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let searched = router.dispatch(Request::new(Method::Search, "/book")).await;
        assert_eq!(searched.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn default_entry_covers_unlisted_methods() {
        let mut routes = facade(Options::new().status_code("default", 202));
        routes.options("/book", vec![], sample).unwrap();

        let res = send(routes, Method::Options, "/book").await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn templater_sees_request_and_locals() {
        let mut routes = facade(Options::new().templater(|req, res, body| {
            json!({ "path": req.path(), "role": res.locals().get("role"), "data": body })
        }));
        let role = from_fn(|req, mut res: Response, next: Next| async move {
            res.locals_mut().insert("role".into(), json!("ADMIN"));
            next.run(req, res).await
        });
        routes.get("/book", vec![Callback::from(role)], sample).unwrap();

        let res = send(routes, Method::Get, "/book").await;
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, json!({ "path": "/book", "role": "ADMIN", "data": { "title": "sample" } }));
    }

    #[tokio::test]
    async fn handlers_read_locals_set_by_middleware() {
        let mut routes = facade(Options::new());
        let role = from_fn(|req, mut res: Response, next: Next| async move {
            res.locals_mut().insert("role".into(), json!("WRITER"));
            next.run(req, res).await
        });
        routes.get("/me", vec![Callback::from(role)], |req: Request| async move {
            Ok::<_, anyhow::Error>(json!({ "role": req.locals().get("role") }))
        }).unwrap();

        let res = send(routes, Method::Get, "/me").await;
        assert_eq!(res.body(), br#"{"role":"WRITER"}"#);
    }

    #[tokio::test]
    async fn templater_panics_are_delegated() {
        let mut routes = facade(Options::new().templater(|_req, _res, _body| panic!("broken template")));
        routes.get("/book", vec![], sample).unwrap();
        routes.on_error(error_fn(|err: anyhow::Error, _req, mut res: Response, _next| async move {
            res.text(StatusCode::SERVICE_UNAVAILABLE, err.to_string());
            res
        }));

        let res = send(routes, Method::Get, "/book").await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.body(), b"templater panicked: broken template");
    }

    #[tokio::test]
    async fn does_not_answer_twice() {
        let mut routes = facade(Options::new());
        let early = from_fn(|req, mut res: Response, next: Next| async move {
            res.text(StatusCode::ACCEPTED, "queued");
            next.run(req, res).await
        });
        routes.post("/book", vec![Callback::from(early)], sample).unwrap();

        let res = send(routes, Method::Post, "/book").await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert_eq!(res.body(), b"queued");
    }

    #[tokio::test]
    async fn failures_are_delegated() {
        let mut routes = facade(Options::new());
        routes.get("/sync", vec![], ready(|_req: Request| -> anyhow::Result<()> { anyhow::bail!("sync") })).unwrap();
        routes.get("/panic", vec![], exploding).unwrap();
        routes.on_error(error_fn(|err: anyhow::Error, _req, mut res: Response, _next| async move {
            res.text(StatusCode::SERVICE_UNAVAILABLE, err.to_string());
            res
        }));
        let router = routes.into_router();

        let res = router.dispatch(Request::new(Method::Get, "/sync")).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.body(), b"sync");

        let res = router.dispatch(Request::new(Method::Get, "/panic")).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.body(), b"handler panicked: kaboom");
    }

    #[test]
    fn resolution_errors_fail_the_mount() {
        let mut routes = facade(Options::new().type_callbacks(TypeCallbacks::mapping().on("array", |_| None)));
        let err = routes.get("/book", vec![Callback::token("ADMIN")], sample).err().unwrap();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[test]
    fn invalid_paths_fail_the_mount() {
        let mut routes = facade(Options::new());
        routes.get("/book/{id}", vec![], sample).unwrap();
        let err = routes.get("/book/{id}", vec![], sample).err().unwrap();
        assert!(matches!(err, Error::Route { .. }));
    }
}
