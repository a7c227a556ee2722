//! Request-scoped remember-me session.
//!
//! A [`Session`] lives for one request. It resolves the current principal from
//! the remember cookie (at most one store lookup), runs the sign-in guard chain
//! before committing a cookie, and revokes the token before clearing the
//! cookie on sign-out.

use std::cell::{OnceCell, RefCell};
use std::sync::Arc;

use thiserror::Error;

use crate::config::Configuration;
use crate::cookies::{CookieJar, CookieOptions, DeleteOptions};
use crate::guard::{build_chain, GuardError, GuardStatus, SignInGuard};
use crate::principal::Principal;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("sign-in guard failed: {0}")]
    Guard(#[from] GuardError),
}

enum CurrentUser<P> {
    /// Not yet looked up from the cookie.
    Unresolved,
    /// Looked up (possibly finding nothing) or adopted by `sign_in`.
    Resolved(Option<P>),
}

pub struct Session<'j, P: Principal> {
    config: Arc<Configuration<P>>,
    cookies: &'j mut dyn CookieJar,
    current_user: RefCell<CurrentUser<P>>,
    stack: OnceCell<Box<dyn SignInGuard<P>>>,
}

impl<'j, P: Principal> Session<'j, P> {
    pub fn new(config: Arc<Configuration<P>>, cookies: &'j mut dyn CookieJar) -> Self {
        Self {
            config,
            cookies,
            current_user: RefCell::new(CurrentUser::Unresolved),
            stack: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Configuration<P> {
        &self.config
    }

    /// Read access to the underlying jar (guards may inspect other cookies).
    pub fn cookies(&self) -> &dyn CookieJar {
        &*self.cookies
    }

    /// The signed-in principal, if any.
    ///
    /// The first call with a remember cookie present resolves it through the
    /// configured store; the outcome (including a miss) is cached for the rest
    /// of the session.
    pub fn current_user(&self) -> Option<P> {
        if let CurrentUser::Resolved(user) = &*self.current_user.borrow() {
            return user.clone();
        }

        let token = self.remember_token()?;
        let user = self.user_from_remember_token(token);
        *self.current_user.borrow_mut() = CurrentUser::Resolved(user.clone());
        user
    }

    pub fn signed_in(&self) -> bool {
        self.current_user().is_some()
    }

    pub fn signed_out(&self) -> bool {
        !self.signed_in()
    }

    /// Attempt to establish a session for an already-authenticated principal.
    ///
    /// The remember cookie is written only if every guard approves and the
    /// principal has a non-blank token; otherwise the principal is discarded
    /// and no cookie is written. Guard denial is reported through the returned
    /// status. `Err` means a guard malfunctioned.
    pub fn sign_in(&mut self, principal: P) -> Result<GuardStatus, SessionError> {
        // Adopt tentatively: guards decide based on `current_user()`.
        *self.current_user.get_mut() = CurrentUser::Resolved(Some(principal.clone()));

        let status = match self.run_sign_in_stack() {
            Ok(status) => status,
            Err(err) => {
                *self.current_user.get_mut() = CurrentUser::Unresolved;
                return Err(err.into());
            }
        };

        let token = principal
            .remember_token()
            .filter(|token| !token.trim().is_empty());

        match token {
            Some(token) if status.is_success() => {
                let options = self.cookie_options();
                self.cookies.set(&self.config.cookie.cookie_name, token, &options);
                tracing::info!(
                    cookie = %self.config.cookie.cookie_name,
                    expires = %options.expires,
                    "sign-in committed"
                );
            }
            _ => {
                *self.current_user.get_mut() = CurrentUser::Unresolved;
                if status.is_success() {
                    tracing::warn!("sign-in approved but principal has no remember token; no cookie written");
                } else {
                    tracing::info!(
                        redirect = status.redirect(),
                        reason = status.failure_message(),
                        "sign-in rejected by guard"
                    );
                }
            }
        }

        Ok(status)
    }

    /// [`Session::sign_in`], then hand the status to `on_complete`.
    ///
    /// `on_complete` runs exactly once whenever the chain reaches a decision,
    /// approved or not. It does not run if a guard malfunctions.
    pub fn sign_in_with<F, R>(&mut self, principal: P, on_complete: F) -> Result<R, SessionError>
    where
        F: FnOnce(&GuardStatus) -> R,
    {
        let status = self.sign_in(principal)?;
        Ok(on_complete(&status))
    }

    /// Tear the session down.
    ///
    /// The principal's token is rotated *before* the cookie is removed so a
    /// concurrent request replaying the old cookie misses the lookup. Never
    /// fails: a rotation error is logged and the cookie is still removed.
    pub fn sign_out(&mut self) {
        if let Some(mut user) = self.current_user() {
            match user.reset_remember_token() {
                Ok(()) => tracing::debug!("remember token rotated"),
                Err(err) => tracing::error!("failed to rotate remember token on sign-out: {err}"),
            }
        }

        *self.current_user.get_mut() = CurrentUser::Unresolved;

        let options = self.delete_options();
        self.cookies.delete(&self.config.cookie.cookie_name, &options);
        tracing::info!(cookie = %self.config.cookie.cookie_name, "signed out");
    }

    fn remember_token(&self) -> Option<&str> {
        self.cookies
            .get(&self.config.cookie.cookie_name)
            .filter(|token| !token.trim().is_empty())
    }

    fn user_from_remember_token(&self, token: &str) -> Option<P> {
        match self.config.user_model.find_by_remember_token(token) {
            Ok(user) => {
                tracing::debug!(found = user.is_some(), "resolved remember token");
                user
            }
            Err(err) => {
                tracing::warn!("remember token lookup failed; treating as signed out: {err}");
                None
            }
        }
    }

    fn run_sign_in_stack(&self) -> Result<GuardStatus, GuardError> {
        let stack = self.stack.get_or_init(|| {
            let guards: Vec<&str> = self.config.sign_in_guards.iter().map(|g| g.name()).collect();
            tracing::debug!(?guards, "building sign-in guard chain");
            build_chain(&self.config.sign_in_guards)
        });
        stack.call(self)
    }

    fn cookie_options(&self) -> CookieOptions {
        let settings = &self.config.cookie;
        CookieOptions {
            expires: self
                .config
                .cookie_expiration
                .expires_at(&self.cookies.snapshot()),
            httponly: settings.httponly,
            path: settings.cookie_path.clone(),
            secure: settings.secure_cookie,
            domain: settings.domain().map(str::to_owned),
        }
    }

    fn delete_options(&self) -> DeleteOptions {
        DeleteOptions {
            domain: self.config.cookie.domain().map(str::to_owned),
            path: self.config.cookie.cookie_path.clone(),
        }
    }
}

impl<P: Principal> core::fmt::Debug for Session<'_, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = match &*self.current_user.borrow() {
            CurrentUser::Unresolved => "unresolved",
            CurrentUser::Resolved(Some(_)) => "signed_in",
            CurrentUser::Resolved(None) => "signed_out",
        };
        f.debug_struct("Session")
            .field("cookie_name", &self.config.cookie.cookie_name)
            .field("current_user", &state)
            .field("guard_chain_built", &self.stack.get().is_some())
            .finish()
    }
}
