//! Status codes written by the terminal wrapper, per HTTP method.
//!
//! | verb      | default |
//! |-----------|---------|
//! | `get`     | 200     |
//! | `post`    | 201     |
//! | `put`     | 200     |
//! | `patch`   | 200     |
//! | `delete`  | 204     |
//! | `default` | 200     |
//!
//! `default` answers every method without its own entry. Overrides merge onto
//! this table verb by verb:
//!
//! ```rust
//! use http::StatusCode;
//! use tsu_loader::{Method, StatusCodes};
//!
//! let codes = StatusCodes::default().merge([("post", 200), ("delete", 200)]).unwrap();
//! assert_eq!(codes.for_method(Method::Post), StatusCode::OK);
//! assert_eq!(codes.for_method(Method::Options), StatusCode::OK);
//! ```

use std::collections::BTreeMap;

use http::StatusCode;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::method::Method;

const DEFAULT_KEY: &str = "default";

/// Method → status code table with a `default` fallback.
///
/// Deserialises from a `{verb: code}` map, which is merged onto the defaults.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(try_from = "BTreeMap<String, u16>")]
pub struct StatusCodes {
    by_method: BTreeMap<Method, StatusCode>,
    default: StatusCode,
}

impl StatusCodes {
    pub fn for_method(&self, method: Method) -> StatusCode {
        self.by_method.get(&method).copied().unwrap_or(self.default)
    }

    /// Overrides one entry. `verb` is a method name in any case, or `"default"`.
    pub fn set(&mut self, verb: &str, code: u16) -> Result<(), ConfigError> {
        let status = StatusCode::from_u16(code)
            .map_err(|_| ConfigError::InvalidStatusCode { verb: verb.to_owned(), code })?;

        if verb.eq_ignore_ascii_case(DEFAULT_KEY) {
            self.default = status;
            return Ok(());
        }
        let method = Method::from_verb(verb)
            .ok_or_else(|| ConfigError::UnknownStatusVerb(verb.to_owned()))?;
        self.by_method.insert(method, status);
        Ok(())
    }

    pub fn merge<K: AsRef<str>>(
        mut self,
        overrides: impl IntoIterator<Item = (K, u16)>,
    ) -> Result<Self, ConfigError> {
        for (verb, code) in overrides {
            self.set(verb.as_ref(), code)?;
        }
        Ok(self)
    }
}

impl Default for StatusCodes {
    fn default() -> Self {
        Self {
            by_method: BTreeMap::from([
                (Method::Get,    StatusCode::OK),
                (Method::Post,   StatusCode::CREATED),
                (Method::Put,    StatusCode::OK),
                (Method::Patch,  StatusCode::OK),
                (Method::Delete, StatusCode::NO_CONTENT),
            ]),
            default: StatusCode::OK,
        }
    }
}

impl TryFrom<BTreeMap<String, u16>> for StatusCodes {
    type Error = ConfigError;

    fn try_from(overrides: BTreeMap<String, u16>) -> Result<Self, Self::Error> {
        Self::default().merge(overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let codes = StatusCodes::default();
        assert_eq!(codes.for_method(Method::Get), StatusCode::OK);
        assert_eq!(codes.for_method(Method::Post), StatusCode::CREATED);
        assert_eq!(codes.for_method(Method::Delete), StatusCode::NO_CONTENT);
        assert_eq!(codes.for_method(Method::Head), StatusCode::OK);
    }

    #[test]
    fn overrides_merge_per_verb() {
        let codes = StatusCodes::default()
            .merge([("post", 200), ("default", 202)])
            .unwrap();
        assert_eq!(codes.for_method(Method::Post), StatusCode::OK);
        assert_eq!(codes.for_method(Method::Delete), StatusCode::NO_CONTENT);
        assert_eq!(codes.for_method(Method::Purge), StatusCode::ACCEPTED);
    }

    #[test]
    fn rejects_bad_entries() {
        assert_eq!(
            StatusCodes::default().merge([("fetch", 200)]),
            Err(ConfigError::UnknownStatusVerb("fetch".into())),
        );
        assert_eq!(
            StatusCodes::default().merge([("get", 42)]),
            Err(ConfigError::InvalidStatusCode { verb: "get".into(), code: 42 }),
        );
    }

    #[test]
    fn deserialises_onto_defaults() {
        let codes: StatusCodes = serde_json::from_str(r#"{ "put": 204 }"#).unwrap();
        assert_eq!(codes.for_method(Method::Put), StatusCode::NO_CONTENT);
        assert_eq!(codes.for_method(Method::Post), StatusCode::CREATED);
    }
}
