//! # tsu-loader
//!
//! Controller loading for tsu services. Controllers declare routes through a
//! [`RouteFacade`]; the facade does the repetitive parts:
//!
//! - **Tokens instead of boilerplate.** A route can carry plain data, such as
//!   the roles allowed to call it, in front of its handler. The data is turned
//!   into middleware once, at mount time, by the configured [`TypeCallbacks`].
//! - **Return values instead of responses.** Handlers return a value (sync or
//!   async); the facade writes it as JSON with a per-method status code
//!   (`POST` → 201, `DELETE` → 204, …) and an optional templater.
//! - **Errors go to error handlers.** A failing or panicking handler never
//!   writes a response itself; the failure continues down the router's error
//!   path.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde_json::{json, Value};
//! use tsu_loader::{controller, load, middleware, Callback, Error, HttpError, Options,
//!                  Request, RouteFacade, Router, Server, TypeCallbacks};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let roles = TypeCallbacks::mapping().on("array", |r| {
//!         let allowed = r.token.clone();
//!         Some(middleware::from_fn(move |req, res, next| {
//!             let allowed = allowed.clone();
//!             async move {
//!                 let role = req.header("x-role").unwrap_or_default();
//!                 if allowed.as_array().is_some_and(|a| a.iter().any(|r| r == role)) {
//!                     next.run(req, res).await
//!                 } else {
//!                     next.fail(req, res, HttpError::forbidden("role not allowed").into()).await
//!                 }
//!             }
//!         }))
//!     });
//!
//!     let router = load(
//!         Router::new(),
//!         vec![controller("book", books)],
//!         Options::new().type_callbacks(roles),
//!     )?;
//!     Server::bind("0.0.0.0:3000")?.serve(router).await
//! }
//!
//! fn books(routes: &mut RouteFacade) -> Result<(), Error> {
//!     routes.get("/book", vec![], list)?;
//!     routes.delete("/book/{id}", vec![Callback::token(json!(["ADMIN"]))], list)?;
//!     Ok(())
//! }
//!
//! async fn list(_req: Request) -> anyhow::Result<Value> {
//!     Ok(json!([{ "title": "sample" }]))
//! }
//! ```

mod callback;
mod config;
mod error;
mod facade;
mod loader;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod handler;
pub mod middleware;

pub use callback::{
    resolve_chain, Callback, Condition, Match, PredicateListResolver, Resolution, Resolver,
    TagMapResolver, TypeCallback, TypeCallbacks, TypeResolver, TypeTag,
};
pub use config::Config;
pub use error::{ConfigError, Error, HttpError, ResolutionError};
pub use facade::{Options, RouteFacade, Templater};
pub use handler::Handler;
pub use loader::{controller, load, Controller};
pub use method::Method;
pub use middleware::{Middleware, Next};
pub use request::Request;
pub use response::{ContentType, Response};
pub use router::{Route, Router};
pub use server::Server;
pub use status::StatusCodes;
