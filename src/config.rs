//! Declarative configuration.
//!
//! The parts of [`Options`](crate::Options) that are plain data can be loaded
//! from a file or an environment-provided JSON blob:
//!
//! ```json
//! {
//!   "status_code": { "post": 200, "default": 200 },
//!   "ignore": ["legacy"]
//! }
//! ```
//!
//! Every field is optional. Templaters and type callbacks are code and are set
//! on [`Options`](crate::Options) directly.

use serde::Deserialize;

use crate::error::Error;
use crate::status::StatusCodes;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Config {
    /// Per-method status-code overrides, merged onto the defaults.
    #[serde(default)]
    pub status_code: StatusCodes,
    /// Names of controllers the loader skips.
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Config {
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::method::Method;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reads_overrides_and_ignore_list() {
        let config = Config::from_json(r#"{ "status_code": { "post": 200 }, "ignore": ["legacy"] }"#).unwrap();
        assert_eq!(config.status_code.for_method(Method::Post), StatusCode::OK);
        assert_eq!(config.ignore, ["legacy"]);
    }

    #[test]
    fn invalid_verbs_are_reported() {
        let err = Config::from_json(r#"{ "status_code": { "fetch": 200 } }"#).unwrap_err();
        assert!(err.to_string().contains("status_code.fetch"));

        let source = std::error::Error::source(&err).and_then(|e| e.downcast_ref::<serde_json::Error>());
        assert!(source.is_some_and(serde_json::Error::is_data));
    }
}
