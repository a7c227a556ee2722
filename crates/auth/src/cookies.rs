//! Cookie jar contract and the options the session writes with.
//!
//! The session only needs get/set/delete plus a read-only snapshot (handed to
//! the expiration policy). Two jars are provided: [`MemoryCookieJar`] for
//! tests and embedding, and an adapter over [`cookie::CookieJar`] for hosts
//! that already speak the `cookie` crate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attributes applied to a remember-cookie write.
///
/// Computed fresh for every write and never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieOptions {
    pub expires: DateTime<Utc>,
    pub httponly: bool,
    pub path: String,
    pub secure: bool,
    /// Absent unless a non-empty domain is configured. An explicit domain
    /// attribute widens the cookie to subdomains, so it is never defaulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Attributes applied to a cookie deletion.
///
/// Browsers scope deletion by domain and path: a delete without the domain the
/// cookie was written with leaves the original in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub path: String,
}

/// Read-only view of the cookies currently set on a jar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSnapshot(BTreeMap<String, String>);

impl CookieSnapshot {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CookieSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Request/response cookie storage as seen by the session.
///
/// Deleting an absent cookie must be a no-op.
pub trait CookieJar {
    fn get(&self, name: &str) -> Option<&str>;

    fn set(&mut self, name: &str, value: &str, options: &CookieOptions);

    fn delete(&mut self, name: &str, options: &DeleteOptions);

    fn snapshot(&self) -> CookieSnapshot;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory jar
// ─────────────────────────────────────────────────────────────────────────────

/// A cookie held by [`MemoryCookieJar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub value: String,
    /// `None` for cookies that arrived with the request (no attributes known).
    pub options: Option<CookieOptions>,
}

/// In-memory cookie jar.
///
/// Intended for tests/dev. Records every write and deletion so callers can
/// assert on exactly what the session sent.
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieJar {
    cookies: BTreeMap<String, StoredCookie>,
    writes: Vec<(String, CookieOptions)>,
    deletions: Vec<(String, DeleteOptions)>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cookie as if the client had sent it with the request.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(
            name.into(),
            StoredCookie {
                value: value.into(),
                options: None,
            },
        );
        self
    }

    pub fn cookie(&self, name: &str) -> Option<&StoredCookie> {
        self.cookies.get(name)
    }

    /// Options of the last write for `name`, if the cookie is still present.
    pub fn options(&self, name: &str) -> Option<&CookieOptions> {
        self.cookies.get(name).and_then(|c| c.options.as_ref())
    }

    pub fn writes(&self) -> &[(String, CookieOptions)] {
        &self.writes
    }

    pub fn deletions(&self) -> &[(String, DeleteOptions)] {
        &self.deletions
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|c| c.value.as_str())
    }

    fn set(&mut self, name: &str, value: &str, options: &CookieOptions) {
        self.cookies.insert(
            name.to_owned(),
            StoredCookie {
                value: value.to_owned(),
                options: Some(options.clone()),
            },
        );
        self.writes.push((name.to_owned(), options.clone()));
    }

    fn delete(&mut self, name: &str, options: &DeleteOptions) {
        self.cookies.remove(name);
        self.deletions.push((name.to_owned(), options.clone()));
    }

    fn snapshot(&self) -> CookieSnapshot {
        self.cookies
            .iter()
            .map(|(name, c)| (name.clone(), c.value.clone()))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// `cookie` crate adapter
// ─────────────────────────────────────────────────────────────────────────────

impl CookieJar for cookie::CookieJar {
    fn get(&self, name: &str) -> Option<&str> {
        cookie::CookieJar::get(self, name).map(|c| c.value())
    }

    fn set(&mut self, name: &str, value: &str, options: &CookieOptions) {
        let mut builder = cookie::Cookie::build((name.to_owned(), value.to_owned()))
            .path(options.path.clone())
            .http_only(options.httponly)
            .secure(options.secure);

        if let Some(domain) = &options.domain {
            builder = builder.domain(domain.clone());
        }

        builder = builder.expires(transport_expiry(name, options.expires));

        self.add(builder.build());
    }

    fn delete(&mut self, name: &str, options: &DeleteOptions) {
        let mut removal =
            cookie::Cookie::build((name.to_owned(), String::new())).path(options.path.clone());

        if let Some(domain) = &options.domain {
            removal = removal.domain(domain.clone());
        }

        self.remove(removal.build());
    }

    fn snapshot(&self) -> CookieSnapshot {
        self.iter()
            .map(|c| (c.name().to_owned(), c.value().to_owned()))
            .collect()
    }
}

/// Convert an expiry to the `time` representation used by `cookie`.
///
/// Instants outside the range `time` can represent are clamped to its bounds,
/// so a remember cookie always stays persistent.
fn transport_expiry(name: &str, expires: DateTime<Utc>) -> time::OffsetDateTime {
    match time::OffsetDateTime::from_unix_timestamp(expires.timestamp()) {
        Ok(at) => at,
        Err(err) => {
            tracing::warn!(cookie = name, "expiry out of range for cookie transport, clamping: {err}");
            if expires.timestamp() > 0 {
                time::PrimitiveDateTime::MAX.assume_utc()
            } else {
                time::PrimitiveDateTime::MIN.assume_utc()
            }
        }
    }
}
