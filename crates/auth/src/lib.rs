//! `tollgate-auth` — cookie-backed "remember me" sessions.
//!
//! This crate is intentionally decoupled from HTTP and storage: cookies and
//! principals are reached through the [`CookieJar`], [`PrincipalStore`] and
//! [`Principal`] traits. It assumes credentials were already verified and only
//! manages the remember token's lifecycle plus the sign-in guard chain.

pub mod config;
pub mod cookies;
pub mod expiration;
pub mod guard;
pub mod principal;
pub mod session;
pub mod token;
pub mod user;

pub use config::{ConfigError, Configuration, CookieSettings};
pub use cookies::{CookieJar, CookieOptions, CookieSnapshot, DeleteOptions, MemoryCookieJar};
pub use expiration::{CookieExpiration, DEPRECATION_TARGET};
pub use guard::{DefaultSignInGuard, GuardError, GuardFactory, GuardStatus, SignInGuard};
pub use principal::{Principal, PrincipalStore};
pub use session::{Session, SessionError};
pub use token::RememberToken;
pub use user::{MemoryUserStore, User, UserRecord};
