//! HTTP method as a typed enum.
//!
//! Covers RFC 9110 standard methods, WebDAV extensions (RFC 4918 / 4791 / 3253 / 5323),
//! and `PURGE` used by nginx and Varnish for cache invalidation. The facade
//! generates one registration method per variant.
//!
//! Unknown method strings are rejected at the server level with `405 Method Not Allowed`
//! before they ever reach a middleware chain.

use std::fmt;
use std::str::FromStr;

/// A known HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Method {
    // RFC 9110 ─────────────────────────────────────────────────────────────────
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
    // WebDAV RFC 4918 ──────────────────────────────────────────────────────────
    Copy,
    Lock,
    Mkcol,
    Move,
    Propfind,
    Proppatch,
    Unlock,
    // WebDAV extensions ────────────────────────────────────────────────────────
    Mkcalendar, // RFC 4791 — CalDAV
    Report,     // RFC 3253
    Search,     // RFC 5323
    // Cache invalidation ───────────────────────────────────────────────────────
    Purge, // nginx / Varnish
}

impl Method {
    /// Every method the router accepts, in declaration order.
    pub const ALL: [Method; 20] = [
        Self::Connect, Self::Delete, Self::Get, Self::Head, Self::Options,
        Self::Patch, Self::Post, Self::Put, Self::Trace, Self::Copy,
        Self::Lock, Self::Mkcol, Self::Move, Self::Propfind, Self::Proppatch,
        Self::Unlock, Self::Mkcalendar, Self::Report, Self::Search, Self::Purge,
    ];

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect    => "CONNECT",
            Self::Copy       => "COPY",
            Self::Delete     => "DELETE",
            Self::Get        => "GET",
            Self::Head       => "HEAD",
            Self::Lock       => "LOCK",
            Self::Mkcalendar => "MKCALENDAR",
            Self::Mkcol      => "MKCOL",
            Self::Move       => "MOVE",
            Self::Options    => "OPTIONS",
            Self::Patch      => "PATCH",
            Self::Post       => "POST",
            Self::Propfind   => "PROPFIND",
            Self::Proppatch  => "PROPPATCH",
            Self::Purge      => "PURGE",
            Self::Put        => "PUT",
            Self::Report     => "REPORT",
            Self::Search     => "SEARCH",
            Self::Trace      => "TRACE",
            Self::Unlock     => "UNLOCK",
        }
    }

    /// Parses a configuration key such as `"post"` or `"Delete"`.
    ///
    /// Unlike [`FromStr`], which follows the wire format, this is
    /// case-insensitive: status-code tables are keyed by lowercase verbs.
    pub fn from_verb(verb: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str().eq_ignore_ascii_case(verb))
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|m| m.as_str() == s).ok_or(())
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = ();

    fn try_from(m: &http::Method) -> Result<Self, Self::Error> {
        m.as_str().parse()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
