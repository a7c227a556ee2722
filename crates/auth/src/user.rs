//! In-memory user model implementing the principal contracts.
//!
//! Intended for tests/dev and as a reference for real stores: records are
//! keyed by id with a unique index on the remember token, and rotating a token
//! updates both under one write lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tollgate_core::{Entity, StoreError, StoreResult, UserId};

use crate::principal::{Principal, PrincipalStore};
use crate::token::RememberToken;

/// Persisted user state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub remember_token: Option<RememberToken>,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            email: email.into().trim().to_lowercase(),
            remember_token: Some(RememberToken::generate()),
            email_confirmed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_remember_token(mut self, token: impl Into<RememberToken>) -> Self {
        self.remember_token = Some(token.into());
        self
    }

    fn indexed_token(&self) -> Option<&str> {
        self.remember_token
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(RememberToken::as_str)
    }
}

#[derive(Debug, Default)]
struct Users {
    by_id: HashMap<UserId, UserRecord>,
    by_token: HashMap<String, UserId>,
}

/// Shared, thread-safe user table.
///
/// Cloning yields another handle to the same table.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<Users>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with a freshly minted remember token.
    pub fn create(&self, email: impl Into<String>) -> StoreResult<User> {
        self.insert(UserRecord::new(email))
    }

    /// Insert a prepared record (e.g. one carrying a known token).
    pub fn insert(&self, record: UserRecord) -> StoreResult<User> {
        let mut users = self.write()?;

        if users.by_id.contains_key(&record.id) {
            return Err(StoreError::conflict(format!("user {} already exists", record.id)));
        }
        if users.by_id.values().any(|u| u.email == record.email) {
            return Err(StoreError::conflict(format!("email {} already taken", record.email)));
        }
        if let Some(token) = record.indexed_token() {
            if users.by_token.contains_key(token) {
                return Err(StoreError::conflict("remember token already in use"));
            }
            users.by_token.insert(token.to_owned(), record.id);
        }

        users.by_id.insert(record.id, record.clone());
        Ok(self.handle(record))
    }

    pub fn find(&self, id: UserId) -> StoreResult<Option<User>> {
        let users = self.read()?;
        Ok(users.by_id.get(&id).cloned().map(|r| self.handle(r)))
    }

    pub fn confirm_email(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<User> {
        let mut users = self.write()?;
        let record = users.by_id.get_mut(&id).ok_or_else(StoreError::not_found)?;
        record.email_confirmed_at = Some(at);
        let record = record.clone();
        Ok(self.handle(record))
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.by_id.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn rotate_token(&self, id: UserId) -> StoreResult<RememberToken> {
        let mut users = self.write()?;
        let Users { by_id, by_token } = &mut *users;

        let record = by_id.get_mut(&id).ok_or_else(StoreError::not_found)?;
        if let Some(old) = record.indexed_token() {
            by_token.remove(old);
        }

        let mut token = RememberToken::generate();
        while by_token.contains_key(token.as_str()) {
            token = RememberToken::generate();
        }

        by_token.insert(token.as_str().to_owned(), id);
        record.remember_token = Some(token.clone());
        Ok(token)
    }

    fn handle(&self, record: UserRecord) -> User {
        User {
            record,
            store: self.clone(),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Users>> {
        self.users
            .read()
            .map_err(|_| StoreError::unavailable("lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Users>> {
        self.users
            .write()
            .map_err(|_| StoreError::unavailable("lock poisoned"))
    }
}

impl PrincipalStore for MemoryUserStore {
    type Principal = User;

    fn find_by_remember_token(&self, token: &str) -> StoreResult<Option<User>> {
        let users = self.read()?;
        let record = users
            .by_token
            .get(token)
            .and_then(|id| users.by_id.get(id))
            .cloned();
        Ok(record.map(|r| self.handle(r)))
    }
}

/// A user loaded from a [`MemoryUserStore`].
///
/// Holds a snapshot of the record plus a handle to the store, so rotating the
/// token persists immediately.
#[derive(Debug, Clone)]
pub struct User {
    record: UserRecord,
    store: MemoryUserStore,
}

impl User {
    pub fn email(&self) -> &str {
        &self.record.email
    }

    pub fn is_email_confirmed(&self) -> bool {
        self.record.email_confirmed_at.is_some()
    }

    pub fn record(&self) -> &UserRecord {
        &self.record
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Eq for User {}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.record.id
    }
}

impl Principal for User {
    fn remember_token(&self) -> Option<&str> {
        self.record.remember_token.as_ref().map(RememberToken::as_str)
    }

    fn reset_remember_token(&mut self) -> StoreResult<()> {
        let token = self.store.rotate_token(self.record.id)?;
        self.record.remember_token = Some(token);
        Ok(())
    }
}
