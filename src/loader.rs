//! Controller loading.
//!
//! A controller is a named group of routes. [`load`] builds one
//! [`RouteFacade`] from the options and hands it to every controller in
//! order, skipping the names on the ignore list.
//!
//! ```rust
//! # fn main() -> Result<(), tsu_loader::Error> {
//! use serde_json::{json, Value};
//! use tsu_loader::{controller, load, Error, Options, Request, RouteFacade, Router};
//!
//! async fn list(_req: Request) -> anyhow::Result<Value> {
//!     Ok(json!([1, 2, 3]))
//! }
//!
//! fn books(routes: &mut RouteFacade) -> Result<(), Error> {
//!     routes.get("/book", vec![], list)?;
//!     Ok(())
//! }
//!
//! let router = load(Router::new(), vec![controller("book", books)], Options::new())?;
//! # let _ = router;
//! # Ok(())
//! # }
//! ```

use tracing::{debug, info};

use crate::error::Error;
use crate::facade::{Options, RouteFacade};
use crate::router::Router;

/// A named group of routes.
pub trait Controller {
    fn name(&self) -> &str;
    fn mount(&self, routes: &mut RouteFacade) -> Result<(), Error>;
}

struct FnController<F> {
    name: String,
    mount: F,
}

impl<F> Controller for FnController<F>
where
    F: Fn(&mut RouteFacade) -> Result<(), Error>,
{
    fn name(&self) -> &str { &self.name }

    fn mount(&self, routes: &mut RouteFacade) -> Result<(), Error> {
        (self.mount)(routes)
    }
}

/// Builds a controller from a mounting function.
pub fn controller<F>(name: impl Into<String>, mount: F) -> Box<dyn Controller>
where
    F: Fn(&mut RouteFacade) -> Result<(), Error> + 'static,
{
    Box::new(FnController { name: name.into(), mount })
}

/// Mounts `controllers` on `router` through a facade built from `options`.
///
/// Stops at the first controller that fails to mount.
pub fn load(
    router: Router,
    controllers: impl IntoIterator<Item = Box<dyn Controller>>,
    options: Options,
) -> Result<Router, Error> {
    let ignore = options.ignore.clone();
    let mut routes = RouteFacade::new(router, options)?;

    let (mut mounted, mut skipped) = (0usize, 0usize);
    for controller in controllers {
        let name = controller.name();
        if ignore.iter().any(|ignored| ignored == name) {
            debug!(controller = name, "controller ignored");
            skipped += 1;
            continue;
        }
        controller.mount(&mut routes)?;
        debug!(controller = name, "controller mounted");
        mounted += 1;
    }

    info!(mounted, skipped, "controllers loaded");
    Ok(routes.into_router())
}
