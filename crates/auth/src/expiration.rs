//! Expiration policy for the remember cookie.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::cookies::CookieSnapshot;

/// Tracing target used for deprecation notices.
pub const DEPRECATION_TARGET: &str = "tollgate::deprecation";

type SnapshotPolicy = dyn Fn(&CookieSnapshot) -> DateTime<Utc> + Send + Sync;
type LegacyPolicy = dyn Fn() -> DateTime<Utc> + Send + Sync;

/// Computes the `expires` attribute of every remember-cookie write.
///
/// The current form receives the cookies already set on the jar, which allows
/// policies such as "keep the expiry of an existing cookie". The legacy form
/// takes no arguments and is kept for older configurations.
#[derive(Clone)]
pub enum CookieExpiration {
    WithCookies(Arc<SnapshotPolicy>),
    Legacy(Arc<LegacyPolicy>),
}

impl CookieExpiration {
    pub fn new<F>(policy: F) -> Self
    where
        F: Fn(&CookieSnapshot) -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self::WithCookies(Arc::new(policy))
    }

    #[deprecated(
        note = "expiration policies should accept the collection of previously set cookies; use `CookieExpiration::new`"
    )]
    pub fn legacy<F>(policy: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self::Legacy(Arc::new(policy))
    }

    /// Expire `ttl` after the moment the cookie is written.
    ///
    /// Saturates at the latest representable instant instead of overflowing.
    pub fn after(ttl: Duration) -> Self {
        Self::new(move |_| {
            Utc::now()
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Evaluate the policy against the jar's current contents.
    ///
    /// The legacy form emits one deprecation warning per evaluation.
    pub fn expires_at(&self, cookies: &CookieSnapshot) -> DateTime<Utc> {
        match self {
            Self::WithCookies(policy) => policy(cookies),
            Self::Legacy(policy) => {
                tracing::warn!(
                    target: DEPRECATION_TARGET,
                    "cookie_expiration policy with no parameters is deprecated and will be \
                     removed in a future release; the policy should accept the collection of \
                     previously set cookies"
                );
                policy()
            }
        }
    }
}

impl Default for CookieExpiration {
    /// One year from the time of the write.
    fn default() -> Self {
        Self::after(Duration::days(365))
    }
}

impl core::fmt::Debug for CookieExpiration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::WithCookies(_) => f.write_str("CookieExpiration::WithCookies(..)"),
            Self::Legacy(_) => f.write_str("CookieExpiration::Legacy(..)"),
        }
    }
}
