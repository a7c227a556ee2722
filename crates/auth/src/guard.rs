//! Sign-in guards: an ordered chain of post-authentication admission checks.
//!
//! Each configured guard wraps the next one. A guard either short-circuits
//! with a failure [`GuardStatus`] or delegates to its `next` guard. The
//! innermost guard is [`DefaultSignInGuard`], which always approves.
//!
//! ```ignore
//! struct EmailConfirmedGuard {
//!     next: Box<dyn SignInGuard<User>>,
//! }
//!
//! impl SignInGuard<User> for EmailConfirmedGuard {
//!     fn call(&self, session: &Session<'_, User>) -> Result<GuardStatus, GuardError> {
//!         match session.current_user() {
//!             Some(user) if !user.is_email_confirmed() => Ok(GuardStatus::failure("confirm your email")
//!                 .with_redirect("/confirmations/new")),
//!             _ => self.next.call(session),
//!         }
//!     }
//! }
//!
//! let guard = GuardFactory::new("email_confirmed", |next| EmailConfirmedGuard { next });
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use tollgate_core::StoreError;

use crate::principal::Principal;
use crate::session::Session;

/// Outcome of running the guard chain for one sign-in attempt.
///
/// Built once by a guard and not mutated afterwards; the `with_*` helpers
/// consume the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardStatus {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_message: Option<String>,
}

impl GuardStatus {
    pub fn success() -> Self {
        Self {
            success: true,
            redirect: None,
            failure_message: None,
        }
    }

    /// Reject the sign-in with a human-readable reason.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            redirect: None,
            failure_message: Some(message.into()),
        }
    }

    /// Reject the sign-in without a reason.
    pub fn denied() -> Self {
        Self {
            success: false,
            redirect: None,
            failure_message: None,
        }
    }

    /// Attach a redirect target for the caller to send the client to.
    pub fn with_redirect(mut self, uri: impl Into<String>) -> Self {
        self.redirect = Some(uri.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }

    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.failure_message.as_deref()
    }
}

/// A guard that could not reach a decision.
///
/// This is a defect (misconfiguration, broken dependency), not a denial, and
/// propagates out of `sign_in` instead of becoming a failed status.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("principal store failed during sign-in guard: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One link in the sign-in guard chain.
pub trait SignInGuard<P: Principal> {
    /// Decide on the sign-in of `session.current_user()`.
    ///
    /// Implementations may read session state but must not assume a cookie has
    /// been written yet: the principal is only tentatively adopted while the
    /// chain runs.
    fn call(&self, session: &Session<'_, P>) -> Result<GuardStatus, GuardError>;
}

/// Terminal guard: approves unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSignInGuard;

impl<P: Principal> SignInGuard<P> for DefaultSignInGuard {
    fn call(&self, _session: &Session<'_, P>) -> Result<GuardStatus, GuardError> {
        Ok(GuardStatus::success())
    }
}

type BuildGuard<P> = dyn Fn(Box<dyn SignInGuard<P>>) -> Box<dyn SignInGuard<P>> + Send + Sync;

/// Configured constructor for a guard, given the guard it wraps.
pub struct GuardFactory<P: Principal> {
    name: Cow<'static, str>,
    build: Arc<BuildGuard<P>>,
}

impl<P: Principal> GuardFactory<P> {
    pub fn new<F, G>(name: impl Into<Cow<'static, str>>, build: F) -> Self
    where
        F: Fn(Box<dyn SignInGuard<P>>) -> G + Send + Sync + 'static,
        G: SignInGuard<P> + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(move |next: Box<dyn SignInGuard<P>>| {
                Box::new(build(next)) as Box<dyn SignInGuard<P>>
            }),
        }
    }

    /// A guard expressed as a closure over the session and the next guard.
    pub fn from_fn<F>(name: impl Into<Cow<'static, str>>, check: F) -> Self
    where
        F: Fn(&Session<'_, P>, &dyn SignInGuard<P>) -> Result<GuardStatus, GuardError>
            + Send
            + Sync
            + 'static,
    {
        let check = Arc::new(check);
        Self::new(name, move |next| FnGuard {
            check: Arc::clone(&check),
            next,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn wrap(&self, next: Box<dyn SignInGuard<P>>) -> Box<dyn SignInGuard<P>> {
        (self.build)(next)
    }
}

impl<P: Principal> Clone for GuardFactory<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            build: Arc::clone(&self.build),
        }
    }
}

impl<P: Principal> core::fmt::Debug for GuardFactory<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GuardFactory").field("name", &self.name).finish()
    }
}

struct FnGuard<P: Principal, F> {
    check: Arc<F>,
    next: Box<dyn SignInGuard<P>>,
}

impl<P, F> SignInGuard<P> for FnGuard<P, F>
where
    P: Principal,
    F: Fn(&Session<'_, P>, &dyn SignInGuard<P>) -> Result<GuardStatus, GuardError>,
{
    fn call(&self, session: &Session<'_, P>) -> Result<GuardStatus, GuardError> {
        (self.check)(session, self.next.as_ref())
    }
}

/// Compose the configured guards around the terminal guard.
///
/// The first factory becomes the outermost guard and therefore runs first.
pub(crate) fn build_chain<P: Principal>(factories: &[GuardFactory<P>]) -> Box<dyn SignInGuard<P>> {
    let terminal: Box<dyn SignInGuard<P>> = Box::new(DefaultSignInGuard);
    factories
        .iter()
        .rev()
        .fold(terminal, |next, factory| factory.wrap(next))
}
