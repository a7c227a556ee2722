//! Session configuration.
//!
//! [`CookieSettings`] is plain data and can be loaded from the environment or
//! JSON. [`Configuration`] adds the behavioural parts (expiration policy,
//! guard chain, principal store) and is shared read-only behind an `Arc`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expiration::CookieExpiration;
use crate::guard::GuardFactory;
use crate::principal::{Principal, PrincipalStore};

pub const DEFAULT_COOKIE_NAME: &str = "remember_token";
pub const DEFAULT_COOKIE_PATH: &str = "/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cookie name must not be empty")]
    EmptyCookieName,

    #[error("cookie path must start with '/': {0:?}")]
    InvalidCookiePath(String),

    #[error("invalid boolean for {key}: {value:?}")]
    InvalidBool { key: &'static str, value: String },

    #[error("malformed cookie settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Attributes of the remember cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub cookie_name: String,
    pub cookie_domain: Option<String>,
    pub cookie_path: String,
    pub httponly: bool,
    pub secure_cookie: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_domain: None,
            cookie_path: DEFAULT_COOKIE_PATH.to_string(),
            httponly: true,
            secure_cookie: false,
        }
    }
}

impl CookieSettings {
    pub const ENV_COOKIE_NAME: &'static str = "TOLLGATE_COOKIE_NAME";
    pub const ENV_COOKIE_DOMAIN: &'static str = "TOLLGATE_COOKIE_DOMAIN";
    pub const ENV_COOKIE_PATH: &'static str = "TOLLGATE_COOKIE_PATH";
    pub const ENV_HTTPONLY: &'static str = "TOLLGATE_COOKIE_HTTPONLY";
    pub const ENV_SECURE_COOKIE: &'static str = "TOLLGATE_SECURE_COOKIE";

    /// The configured domain, if it is non-blank.
    pub fn domain(&self) -> Option<&str> {
        self.cookie_domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_name.trim().is_empty() {
            return Err(ConfigError::EmptyCookieName);
        }
        if !self.cookie_path.starts_with('/') {
            return Err(ConfigError::InvalidCookiePath(self.cookie_path.clone()));
        }
        Ok(())
    }

    /// Read settings from `TOLLGATE_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`CookieSettings::from_env`], with an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let settings = Self {
            cookie_name: lookup(Self::ENV_COOKIE_NAME).unwrap_or(defaults.cookie_name),
            cookie_domain: lookup(Self::ENV_COOKIE_DOMAIN).or(defaults.cookie_domain),
            cookie_path: lookup(Self::ENV_COOKIE_PATH).unwrap_or(defaults.cookie_path),
            httponly: match lookup(Self::ENV_HTTPONLY) {
                Some(raw) => parse_bool(Self::ENV_HTTPONLY, &raw)?,
                None => defaults.httponly,
            },
            secure_cookie: match lookup(Self::ENV_SECURE_COOKIE) {
                Some(raw) => parse_bool(Self::ENV_SECURE_COOKIE, &raw)?,
                None => defaults.secure_cookie,
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}

/// Everything a [`Session`](crate::Session) reads; never mutated by sessions
/// or guards.
pub struct Configuration<P: Principal> {
    pub cookie: CookieSettings,
    pub cookie_expiration: CookieExpiration,
    /// Outermost first.
    pub sign_in_guards: Vec<GuardFactory<P>>,
    pub user_model: Arc<dyn PrincipalStore<Principal = P>>,
}

impl<P: Principal> Configuration<P> {
    pub fn new<S>(user_model: Arc<S>) -> Self
    where
        S: PrincipalStore<Principal = P> + 'static,
    {
        let user_model: Arc<dyn PrincipalStore<Principal = P>> = user_model;
        Self {
            cookie: CookieSettings::default(),
            cookie_expiration: CookieExpiration::default(),
            sign_in_guards: Vec::new(),
            user_model,
        }
    }

    /// Replace the cookie settings, rejecting ones that could not be written.
    pub fn with_cookie_settings(mut self, cookie: CookieSettings) -> Result<Self, ConfigError> {
        cookie.validate()?;
        self.cookie = cookie;
        Ok(self)
    }

    pub fn with_cookie_expiration(mut self, expiration: CookieExpiration) -> Self {
        self.cookie_expiration = expiration;
        self
    }

    /// Append a guard; it runs after every guard added before it.
    pub fn with_sign_in_guard(mut self, guard: GuardFactory<P>) -> Self {
        self.sign_in_guards.push(guard);
        self
    }

    pub fn with_sign_in_guards(mut self, guards: impl IntoIterator<Item = GuardFactory<P>>) -> Self {
        self.sign_in_guards.extend(guards);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl<P: Principal> Clone for Configuration<P> {
    fn clone(&self) -> Self {
        Self {
            cookie: self.cookie.clone(),
            cookie_expiration: self.cookie_expiration.clone(),
            sign_in_guards: self.sign_in_guards.clone(),
            user_model: Arc::clone(&self.user_model),
        }
    }
}

impl<P: Principal> core::fmt::Debug for Configuration<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Configuration")
            .field("cookie", &self.cookie)
            .field("cookie_expiration", &self.cookie_expiration)
            .field("sign_in_guards", &self.sign_in_guards)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_remember_me_conventions() {
        let settings = CookieSettings::default();
        assert_eq!(settings.cookie_name, "remember_token");
        assert_eq!(settings.cookie_path, "/");
        assert_eq!(settings.domain(), None);
        assert!(settings.httponly);
        assert!(!settings.secure_cookie);
    }

    #[test]
    fn blank_domain_is_treated_as_unset() {
        let settings = CookieSettings {
            cookie_domain: Some("   ".to_string()),
            ..CookieSettings::default()
        };
        assert_eq!(settings.domain(), None);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let settings = CookieSettings::from_lookup(lookup(&[
            ("TOLLGATE_COOKIE_NAME", "session_key"),
            ("TOLLGATE_COOKIE_DOMAIN", "example.com"),
            ("TOLLGATE_SECURE_COOKIE", "yes"),
            ("TOLLGATE_COOKIE_HTTPONLY", "0"),
        ]))
        .unwrap();

        assert_eq!(settings.cookie_name, "session_key");
        assert_eq!(settings.domain(), Some("example.com"));
        assert_eq!(settings.cookie_path, "/");
        assert!(settings.secure_cookie);
        assert!(!settings.httponly);
    }

    #[test]
    fn lookup_rejects_garbage_booleans() {
        let err = CookieSettings::from_lookup(lookup(&[("TOLLGATE_SECURE_COOKIE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { key: "TOLLGATE_SECURE_COOKIE", .. }));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let settings =
            CookieSettings::from_json(r#"{ "cookie_domain": "example.com", "secure_cookie": true }"#)
                .unwrap();
        assert_eq!(settings.cookie_name, "remember_token");
        assert_eq!(settings.domain(), Some("example.com"));
        assert!(settings.secure_cookie);
    }

    #[test]
    fn configuration_rejects_unwritable_cookie_settings() {
        let store = Arc::new(crate::user::MemoryUserStore::new());

        let err = Configuration::new(store.clone())
            .with_cookie_settings(CookieSettings {
                cookie_name: " ".to_string(),
                ..CookieSettings::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCookieName));

        let err = Configuration::new(store.clone())
            .with_cookie_settings(CookieSettings {
                cookie_path: "app".to_string(),
                ..CookieSettings::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCookiePath(_)));

        let config = Configuration::new(store)
            .with_cookie_settings(CookieSettings {
                cookie_domain: Some("example.com".to_string()),
                ..CookieSettings::default()
            })
            .unwrap();
        assert_eq!(config.cookie.domain(), Some("example.com"));
    }

    #[test]
    fn json_validation_rejects_empty_name_and_relative_path() {
        assert!(matches!(
            CookieSettings::from_json(r#"{ "cookie_name": "" }"#),
            Err(ConfigError::EmptyCookieName)
        ));
        assert!(matches!(
            CookieSettings::from_json(r#"{ "cookie_path": "app" }"#),
            Err(ConfigError::InvalidCookiePath(_))
        ));
        assert!(matches!(
            CookieSettings::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
