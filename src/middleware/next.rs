use std::future;
use std::sync::Arc;

use http::StatusCode;
use serde_json::json;
use tracing::{error, warn};

use super::{BoxFuture, BoxedErrorHandler, BoxedMiddleware};
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;

/// The rest of the chain, as seen from one middleware.
///
/// Consumed by value: a middleware either continues, fails, or returns, and
/// cannot do two of those.
#[derive(Clone)]
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    position: usize,
    errors: Arc<[BoxedErrorHandler]>,
    error_position: usize,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, errors: Arc<[BoxedErrorHandler]>) -> Self {
        Self { chain, position: 0, errors, error_position: 0 }
    }

    /// Runs the next middleware. At the end of the chain the response is
    /// returned as-is; the router answers `404` if nobody sent it.
    pub fn run(self, req: Request, res: Response) -> BoxFuture<Response> {
        let Some(mw) = self.chain.get(self.position).cloned() else {
            return Box::pin(future::ready(res));
        };
        let next = Next { position: self.position + 1, ..self };
        mw.call(req, res, next)
    }

    /// Skips the remaining middleware and hands `err` to the next error
    /// handler. With none left, answers with the error's status (see
    /// [`HttpError`]) or `500`, unless a response was already sent.
    pub fn fail(self, req: Request, res: Response, err: anyhow::Error) -> BoxFuture<Response> {
        let Some(handler) = self.errors.get(self.error_position).cloned() else {
            return Box::pin(future::ready(finalize(&req, res, err)));
        };
        let next = Next { error_position: self.error_position + 1, ..self };
        handler.call(err, req, res, next)
    }
}

fn finalize(req: &Request, mut res: Response, err: anyhow::Error) -> Response {
    if res.headers_sent() {
        warn!(method = %req.method(), path = req.path(), "unhandled error after response was sent: {err:#}");
        return res;
    }

    let (status, message) = match err.downcast_ref::<HttpError>() {
        Some(e) => (e.status, e.message.clone()),
        None => {
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            (status, status.canonical_reason().unwrap_or_default().to_owned())
        }
    };
    error!(method = %req.method(), path = req.path(), status = status.as_u16(), "request failed: {err:#}");
    res.json(status, &json!({ "error": message }));
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::middleware::{error_fn, from_fn};

    fn run_chain(chain: Vec<BoxedMiddleware>, errors: Vec<BoxedErrorHandler>) -> BoxFuture<Response> {
        Next::new(chain.into(), errors.into())
            .run(Request::new(Method::Get, "/"), Response::new())
    }

    #[tokio::test]
    async fn runs_in_order() {
        let chain = vec![
            from_fn(|req, mut res: Response, next: Next| async move {
                res.locals_mut().insert("trail".into(), json!("a"));
                next.run(req, res).await
            }),
            from_fn(|_req, mut res: Response, _next| async move {
                let trail = format!("{}b", res.locals()["trail"].as_str().unwrap_or_default());
                res.text(StatusCode::OK, trail);
                res
            }),
        ];

        let res = run_chain(chain, Vec::new()).await;
        assert_eq!(res.body(), b"ab");
    }

    #[tokio::test]
    async fn fail_skips_to_error_handlers() {
        let chain = vec![
            from_fn(|req, res, next: Next| next.fail(req, res, anyhow::anyhow!("boom"))),
            from_fn(|_req, mut res: Response, _next| async move {
                res.text(StatusCode::OK, "unreachable");
                res
            }),
        ];
        let errors = vec![
            error_fn(|err, req, res, next: Next| next.fail(req, res, err.context("first"))),
            error_fn(|err: anyhow::Error, _req, mut res: Response, _next| async move {
                res.text(StatusCode::BAD_GATEWAY, format!("{err:#}"));
                res
            }),
        ];

        let res = run_chain(chain, errors).await;
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(res.body(), b"first: boom");
    }

    #[tokio::test]
    async fn default_finalizer_uses_http_error_status() {
        let chain = vec![from_fn(|req, res, next: Next| {
            next.fail(req, res, HttpError::forbidden("role not allowed").into())
        })];

        let res = run_chain(chain, Vec::new()).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.body(), br#"{"error":"role not allowed"}"#);
    }

    #[tokio::test]
    async fn default_finalizer_hides_internal_errors() {
        let chain = vec![from_fn(|req, res, next: Next| {
            next.fail(req, res, anyhow::anyhow!("db password is hunter2"))
        })];

        let res = run_chain(chain, Vec::new()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), br#"{"error":"Internal Server Error"}"#);
    }

    #[tokio::test]
    async fn end_of_chain_returns_unsent_response() {
        let res = run_chain(Vec::new(), Vec::new()).await;
        assert!(!res.headers_sent());
    }
}
