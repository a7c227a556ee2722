//! Principal contracts consumed by the session.
//!
//! The session never owns a principal's storage: it asks a
//! [`PrincipalStore`] for the principal behind a cookie and asks the
//! principal itself to rotate its token on sign-out.

use tollgate_core::StoreResult;

/// An authenticated entity a session can represent.
///
/// Implementations are typically cheap handles (a record snapshot plus a
/// handle to its store), hence the `Clone` bound.
pub trait Principal: Clone + Send + Sync + 'static {
    /// The current remember token, if the principal has one.
    fn remember_token(&self) -> Option<&str>;

    /// Invalidate the current token (mint a new one or clear it) and persist
    /// the change before returning.
    ///
    /// After this returns `Ok`, a store lookup with the old token must miss.
    fn reset_remember_token(&mut self) -> StoreResult<()>;

    /// Whether the principal carries a usable (non-blank) token.
    fn has_remember_token(&self) -> bool {
        self.remember_token()
            .is_some_and(|token| !token.trim().is_empty())
    }
}

/// Single-result lookup of principals by remember token.
pub trait PrincipalStore: Send + Sync {
    type Principal: Principal;

    /// Resolve the principal owning `token`.
    ///
    /// A miss is `Ok(None)`; `Err` is reserved for the store itself failing.
    fn find_by_remember_token(&self, token: &str) -> StoreResult<Option<Self::Principal>>;
}
