//! In-memory authentication provider for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use siteforge_auth::{AuthService, AuthServiceError, Principal, Secret};
use siteforge_core::PrincipalId;

pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Debug)]
struct Account {
    password: String,
    failed_attempts: u32,
}

/// Password accounts with a per-principal failed-attempt limit.
#[derive(Debug)]
pub struct InMemoryAuthService {
    accounts: RwLock<HashMap<PrincipalId, Account>>,
    max_failed_attempts: u32,
    unavailable: AtomicBool,
}

impl Default for InMemoryAuthService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthService {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn with_max_failed_attempts(mut self, max: u32) -> Self {
        self.max_failed_attempts = max;
        self
    }

    pub fn register(&self, principal: PrincipalId, password: impl Into<String>) {
        if let Ok(mut accounts) = self.accounts.write() {
            accounts.insert(
                principal,
                Account {
                    password: password.into(),
                    failed_attempts: 0,
                },
            );
        }
    }

    pub fn exists(&self, principal: &PrincipalId) -> bool {
        self.accounts
            .read()
            .map(|a| a.contains_key(principal))
            .unwrap_or(false)
    }

    /// Simulate a provider outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), AuthServiceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthServiceError::Unavailable("provider offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthService for InMemoryAuthService {
    async fn reauthenticate(&self, principal: &Principal, secret: &Secret) -> Result<(), AuthServiceError> {
        self.ensure_available()?;
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| AuthServiceError::Unavailable("lock poisoned".to_string()))?;
        let account = accounts.get_mut(&principal.id).ok_or(AuthServiceError::NotFound)?;

        if account.failed_attempts >= self.max_failed_attempts {
            return Err(AuthServiceError::RateLimited);
        }
        if account.password != secret.expose() {
            account.failed_attempts += 1;
            debug!(principal_id = %principal.id, attempts = account.failed_attempts, "wrong credential");
            return Err(AuthServiceError::WrongCredential);
        }
        account.failed_attempts = 0;
        Ok(())
    }

    async fn delete_principal(&self, principal: &PrincipalId) -> Result<(), AuthServiceError> {
        self.ensure_available()?;
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| AuthServiceError::Unavailable("lock poisoned".to_string()))?;
        accounts.remove(principal).map(|_| ()).ok_or(AuthServiceError::NotFound)
    }
}
