//! Minimal tsu-loader example: two controllers, role tokens, and a templater.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/book
//!   curl -X POST http://localhost:3000/book -H 'x-role: WRITER'
//!   curl -X DELETE http://localhost:3000/book/1 -H 'x-role: WRITER'   # 403
//!   curl -X DELETE http://localhost:3000/book/1 -H 'x-role: ADMIN'    # 204
//!   curl http://localhost:3000/author

use serde_json::{json, Value};
use tsu_loader::handler::ready;
use tsu_loader::{
    controller, load, middleware, Callback, Error, HttpError, Options, Request, RouteFacade,
    Router, Server, TypeCallbacks,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    // `array` tokens on a route list the roles allowed to call it.
    let roles = TypeCallbacks::mapping().on("array", |r| {
        let allowed = r.token.clone();
        Some(middleware::from_fn(move |req, res, next| {
            let allowed = allowed.clone();
            async move {
                let role = req.header("x-role").unwrap_or_default();
                if allowed.as_array().is_some_and(|a| a.iter().any(|r| r == role)) {
                    next.run(req, res).await
                } else {
                    next.fail(req, res, HttpError::forbidden("role not allowed").into()).await
                }
            }
        }))
    });

    let options = Options::new()
        .type_callbacks(roles)
        .templater(|_req, _res, body| json!({ "success": true, "data": body }));

    let router = load(
        Router::new(),
        vec![controller("book", books), controller("author", authors)],
        options,
    )?;

    Server::bind("0.0.0.0:3000")?.serve(router).await
}

fn books(routes: &mut RouteFacade) -> Result<(), Error> {
    routes.get("/book", vec![], list_books)?;
    routes.get("/book/{id}", vec![], get_book)?;
    routes.post("/book", vec![Callback::token(json!(["WRITER", "ADMIN"]))], create_book)?;
    routes.delete("/book/{id}", vec![Callback::token(json!(["ADMIN"]))], delete_book)?;
    Ok(())
}

fn authors(routes: &mut RouteFacade) -> Result<(), Error> {
    // Synchronous handlers go through `ready`.
    routes.get("/author", vec![], ready(|_req: Request| {
        Ok::<_, anyhow::Error>(json!({ "author": { "name": "john" } }))
    }))?;
    Ok(())
}

async fn list_books(_req: Request) -> anyhow::Result<Value> {
    Ok(json!([{ "id": 1, "title": "sample" }]))
}

async fn get_book(req: Request) -> anyhow::Result<Value> {
    match req.param("id") {
        Some("1") => Ok(json!({ "id": 1, "title": "sample" })),
        _ => Err(HttpError::not_found("no such book").into()),
    }
}

async fn create_book(_req: Request) -> anyhow::Result<Value> {
    Ok(json!({ "id": 2, "title": "draft" }))
}

async fn delete_book(_req: Request) -> anyhow::Result<Value> {
    Ok(Value::Null)
}
