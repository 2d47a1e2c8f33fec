//! HTTP front end for a loaded [`Router`].
//!
//! Every connection gets its own task and is served by hyper's auto builder
//! (HTTP/1.1 or HTTP/2, whichever the client speaks). Requests are collected
//! into a [`Request`], routed in-process, and the [`Response`] is written back.
//!
//! Shutdown is graceful: on SIGTERM or Ctrl-C the listener stops accepting,
//! open connections finish their work, and only then does
//! [`Server::serve`] return. That fits the SIGTERM → grace period → SIGKILL
//! sequence container orchestrators use.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Serves a [`Router`] over TCP.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Parses `addr` (`host:port`). Nothing is bound until
    /// [`serve`](Server::serve).
    ///
    /// ```rust
    /// # fn main() -> Result<(), tsu_loader::Error> {
    /// let server = tsu_loader::Server::bind("127.0.0.1:3000")?;
    /// assert_eq!(server.addr().port(), 3000);
    /// # Ok(())
    /// # }
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        Ok(Self { addr: addr.parse()? })
    }

    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Serves until SIGTERM or Ctrl-C, then drains open connections.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Serves until `signal` resolves, then drains open connections.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let router = Arc::new(router);
        let mut connections = JoinSet::new();
        info!(addr = %self.addr, "tsu-loader listening");

        tokio::pin!(signal);
        loop {
            tokio::select! {
                // Checked first so queued connections cannot delay shutdown.
                biased;

                () = &mut signal => {
                    info!(open = connections.len(), "shutting down, draining connections");
                    break;
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(stream, peer, Arc::clone(&router)));
                    }
                    Err(e) => error!("accept failed: {e}"),
                },

                // Reap finished tasks on long-running servers.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        while connections.join_next().await.is_some() {}
        info!("tsu-loader stopped");
        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, router: Arc<Router>) {
    debug!(%peer, "connection accepted");
    let svc = service_fn(move |req| handle(Arc::clone(&router), req));

    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), svc)
        .await
    {
        error!(%peer, "connection error: {e}");
    }
}

/// Every outcome is a response (405 for unknown methods, 400 for unreadable
/// bodies), so hyper never sees an error.
async fn handle(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let Ok(method) = Method::try_from(req.method()) else {
        return Ok(empty(StatusCode::METHOD_NOT_ALLOWED));
    };
    let path = req.uri().path().to_owned();
    let headers = req.headers().iter()
        .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
        .collect();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(%method, path = %path, "failed to read request body: {e}");
            return Ok(empty(StatusCode::BAD_REQUEST));
        }
    };

    let request = Request::new(method, path).with_headers(headers).with_body(body);
    Ok(router.dispatch(request).await.into_inner())
}

fn empty(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut res = Response::new();
    res.send_status(status);
    res.into_inner()
}

/// SIGTERM or Ctrl-C on Unix, Ctrl-C elsewhere. If a handler cannot be
/// installed that signal is never reported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => { sigterm.recv().await; }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_rejects_malformed_addresses() {
        assert!(matches!(Server::bind("localhost"), Err(Error::Addr(_))));
        assert_eq!(Server::bind("0.0.0.0:8080").unwrap().addr().port(), 8080);
    }

    #[tokio::test]
    async fn stops_when_signalled() {
        let server = Server::bind("127.0.0.1:0").unwrap();
        server.serve_with_shutdown(Router::new(), async {}).await.unwrap();
    }
}
