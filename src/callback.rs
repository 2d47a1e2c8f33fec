//! Callback-type resolution.
//!
//! Route declarations may mix real middleware with plain data *tokens*:
//!
//! ```rust,ignore
//! facade.delete("/book/{id}", vec![Callback::token(json!(["ADMIN"]))], remove_book)?;
//! ```
//!
//! A token is resolved once, at mount time, into middleware by the configured
//! [`TypeCallbacks`], keyed on the token's [`TypeTag`]. The router itself only
//! ever sees middleware.
//!
//! Two registry shapes exist and are never mixed:
//!
//! | shape   | lookup                                              |
//! |---------|-----------------------------------------------------|
//! | mapping | exact match on the tag                              |
//! | list    | first entry whose `conditions` accepts the token    |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tracing::{trace, warn};

use crate::error::{ConfigError, ResolutionError};
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Middleware};

// ── Type tags ─────────────────────────────────────────────────────────────────

/// The runtime kind of a route callback.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TypeTag {
    Function,
    Array,
    Object,
    String,
    Number,
    Boolean,
    Null,
}

impl TypeTag {
    pub fn of(token: &Value) -> Self {
        match token {
            Value::Array(_)  => Self::Array,
            Value::Object(_) => Self::Object,
            Value::String(_) => Self::String,
            Value::Number(_) => Self::Number,
            Value::Bool(_)   => Self::Boolean,
            Value::Null      => Self::Null,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Array    => "array",
            Self::Object   => "object",
            Self::String   => "string",
            Self::Number   => "number",
            Self::Boolean  => "boolean",
            Self::Null     => "null",
        }
    }
}

impl FromStr for TypeTag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(Self::Function),
            "array"    => Ok(Self::Array),
            "object"   => Ok(Self::Object),
            "string"   => Ok(Self::String),
            "number"   => Ok(Self::Number),
            "boolean"  => Ok(Self::Boolean),
            "null"     => Ok(Self::Null),
            _          => Err(()),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Callbacks ─────────────────────────────────────────────────────────────────

/// One pre-terminal entry of a route declaration.
#[derive(Clone)]
pub enum Callback {
    Middleware(BoxedMiddleware),
    Token(Value),
}

impl Callback {
    pub fn middleware(mw: impl Middleware) -> Self {
        Self::Middleware(Arc::new(mw))
    }

    pub fn token(token: impl Into<Value>) -> Self {
        Self::Token(token.into())
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Middleware(_) => TypeTag::Function,
            Self::Token(token) => TypeTag::of(token),
        }
    }
}

impl From<BoxedMiddleware> for Callback {
    fn from(mw: BoxedMiddleware) -> Self { Self::Middleware(mw) }
}

impl From<Value> for Callback {
    fn from(token: Value) -> Self { Self::Token(token) }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Middleware(_) => f.write_str("Middleware(..)"),
            Self::Token(token) => f.debug_tuple("Token").field(token).finish(),
        }
    }
}

// ── Resolver inputs ───────────────────────────────────────────────────────────

/// What a resolver is asked to turn into middleware.
#[derive(Clone, Copy, Debug)]
pub struct Resolution<'a> {
    pub path: &'a str,
    pub method: Method,
    pub token: &'a Value,
}

/// What a list-form condition is asked to accept or reject.
#[derive(Clone, Copy, Debug)]
pub struct Match<'a> {
    pub tag: TypeTag,
    pub path: &'a str,
    pub method: Method,
}

/// Turns a token into middleware. `None` omits the entry from the chain.
pub type Resolver = Arc<dyn Fn(&Resolution<'_>) -> Option<BoxedMiddleware> + Send + Sync>;

pub type Condition = Arc<dyn Fn(&Match<'_>) -> bool + Send + Sync>;

// ── Configuration ─────────────────────────────────────────────────────────────

/// One list-form entry. Both fields are required; [`TypeCallbacks::validate`]
/// reports the first entry missing either.
#[derive(Clone, Default)]
pub struct TypeCallback {
    conditions: Option<Condition>,
    callback: Option<Resolver>,
}

impl TypeCallback {
    pub fn new() -> Self { Self::default() }

    pub fn conditions<F>(mut self, f: F) -> Self
    where
        F: Fn(&Match<'_>) -> bool + Send + Sync + 'static,
    {
        self.conditions = Some(Arc::new(f));
        self
    }

    pub fn callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resolution<'_>) -> Option<BoxedMiddleware> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(f));
        self
    }
}

/// User-supplied registry configuration.
///
/// ```rust
/// use tsu_loader::{middleware, TypeCallbacks, TypeCallback};
///
/// let by_tag = TypeCallbacks::mapping()
///     .on("array", |r| {
///         let roles = r.token.clone();
///         Some(middleware::from_fn(move |req, res, next| {
///             let _ = &roles;
///             next.run(req, res)
///         }))
///     });
///
/// let by_predicate = TypeCallbacks::list()
///     .push(TypeCallback::new()
///         .conditions(|m| m.path.starts_with("/admin"))
///         .callback(|_| None));
/// # let _ = (by_tag, by_predicate);
/// ```
#[derive(Clone)]
pub struct TypeCallbacks {
    form: Form,
    mixed: Option<ConfigError>,
}

#[derive(Clone)]
enum Form {
    Mapping(BTreeMap<String, Resolver>),
    List(Vec<TypeCallback>),
}

impl TypeCallbacks {
    pub fn mapping() -> Self {
        Self { form: Form::Mapping(BTreeMap::new()), mixed: None }
    }

    pub fn list() -> Self {
        Self { form: Form::List(Vec::new()), mixed: None }
    }

    /// Registers a mapping-form resolver for `tag`. A later call for the same
    /// tag replaces the earlier one. On a list-form registry this is recorded
    /// as an error and reported by [`validate`](Self::validate).
    pub fn on<F>(mut self, tag: &str, f: F) -> Self
    where
        F: Fn(&Resolution<'_>) -> Option<BoxedMiddleware> + Send + Sync + 'static,
    {
        match self.form {
            Form::Mapping(ref mut map) => { map.insert(tag.to_owned(), Arc::new(f)); }
            Form::List(_) => self.mix("list", "mapping"),
        }
        self
    }

    /// Appends a list-form entry. On a mapping-form registry this is recorded
    /// as an error and reported by [`validate`](Self::validate).
    pub fn push(mut self, entry: TypeCallback) -> Self {
        match self.form {
            Form::List(ref mut entries) => entries.push(entry),
            Form::Mapping(_) => self.mix("mapping", "list"),
        }
        self
    }

    fn mix(&mut self, registry: &'static str, added: &'static str) {
        self.mixed.get_or_insert(ConfigError::MixedForms { registry, added });
    }

    /// Checks the registry shape. Both forms must not be mixed, mapping keys
    /// must name a token tag, and list entries must carry both `conditions`
    /// and `callback`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(err) = &self.mixed {
            return Err(err.clone());
        }
        match &self.form {
            Form::Mapping(map) => {
                for key in map.keys() {
                    match key.parse::<TypeTag>() {
                        Ok(TypeTag::Function) => return Err(ConfigError::FunctionTypeTag),
                        Ok(_) => {}
                        Err(()) => return Err(ConfigError::UnknownTypeTag(key.clone())),
                    }
                }
            }
            Form::List(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    if entry.conditions.is_none() {
                        return Err(ConfigError::MissingConditions(i));
                    }
                    if entry.callback.is_none() {
                        return Err(ConfigError::MissingCallback(i));
                    }
                }
            }
        }
        Ok(())
    }

    /// Validates and freezes the configuration into a resolver.
    pub fn into_resolver(self) -> Result<Arc<dyn TypeResolver>, ConfigError> {
        self.validate()?;
        Ok(match self.form {
            Form::Mapping(map) => Arc::new(TagMapResolver {
                resolvers: map.into_iter()
                    .filter_map(|(k, v)| k.parse().ok().map(|tag| (tag, v)))
                    .collect(),
            }),
            Form::List(entries) => Arc::new(PredicateListResolver {
                entries: entries.into_iter()
                    .filter_map(|e| Some((e.conditions?, e.callback?)))
                    .collect(),
            }),
        })
    }
}

// ── Resolvers ─────────────────────────────────────────────────────────────────

/// A validated registry.
pub trait TypeResolver: Send + Sync {
    fn resolve(
        &self,
        tag: TypeTag,
        path: &str,
        method: Method,
        token: &Value,
    ) -> Result<Option<BoxedMiddleware>, ResolutionError>;
}

/// Mapping form: exact lookup on the tag.
pub struct TagMapResolver {
    resolvers: BTreeMap<TypeTag, Resolver>,
}

impl TypeResolver for TagMapResolver {
    fn resolve(
        &self,
        tag: TypeTag,
        path: &str,
        method: Method,
        token: &Value,
    ) -> Result<Option<BoxedMiddleware>, ResolutionError> {
        let resolver = self.resolvers.get(&tag).ok_or_else(|| ResolutionError::UnknownTag {
            tag,
            method,
            path: path.to_owned(),
        })?;
        Ok(resolver(&Resolution { path, method, token }))
    }
}

/// List form: the first entry whose condition accepts the token wins.
pub struct PredicateListResolver {
    entries: Vec<(Condition, Resolver)>,
}

impl TypeResolver for PredicateListResolver {
    fn resolve(
        &self,
        tag: TypeTag,
        path: &str,
        method: Method,
        token: &Value,
    ) -> Result<Option<BoxedMiddleware>, ResolutionError> {
        let candidate = Match { tag, path, method };
        let (_, resolver) = self.entries.iter()
            .find(|(condition, _)| condition(&candidate))
            .ok_or_else(|| ResolutionError::NoMatch { method, path: path.to_owned() })?;
        Ok(resolver(&Resolution { path, method, token }))
    }
}

/// Turns the pre-terminal callbacks of one route into middleware.
///
/// Middleware passes through untouched. Tokens go through `registry`; with no
/// registry configured they are dropped. Entries a resolver maps to `None`
/// are dropped as well; the order of the rest is preserved.
pub fn resolve_chain(
    callbacks: Vec<Callback>,
    path: &str,
    method: Method,
    registry: Option<&dyn TypeResolver>,
) -> Result<Vec<BoxedMiddleware>, ResolutionError> {
    let mut chain = Vec::with_capacity(callbacks.len());
    for callback in callbacks {
        let token = match callback {
            Callback::Middleware(mw) => {
                chain.push(mw);
                continue;
            }
            Callback::Token(token) => token,
        };
        let tag = TypeTag::of(&token);
        let Some(registry) = registry else {
            warn!(%method, path, %tag, "no type callbacks configured, dropping token");
            continue;
        };
        match registry.resolve(tag, path, method, &token)? {
            Some(mw) => chain.push(mw),
            None => trace!(%method, path, %tag, "resolver omitted token"),
        }
    }
    Ok(chain)
}
