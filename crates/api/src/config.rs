//! Process configuration read from `SITEFORGE_*` environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use siteforge_accounts::OrchestratorConfig;
use siteforge_auth::{AdminPolicy, TenantResolver};

pub const DEV_SESSION_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: cannot parse '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// HS256 key for session tokens.
    pub session_secret: String,
    /// First path segment of storefront URLs (`/{prefix}/{tenant}/...`).
    pub site_prefix: String,
    pub admin: AdminPolicy,
    pub delete_concurrency: usize,
    pub store_timeout: Duration,
    pub proof_ttl: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            session_secret: DEV_SESSION_SECRET.to_string(),
            site_prefix: "site".to_string(),
            admin: AdminPolicy::default(),
            delete_concurrency: 8,
            store_timeout: Duration::from_millis(10_000),
            proof_ttl: Duration::from_secs(300),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let session_secret = match lookup("SITEFORGE_SESSION_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("SITEFORGE_SESSION_SECRET not set; using insecure dev default");
                defaults.session_secret
            }
        };

        let admin = AdminPolicy::from_lists(
            &lookup("SITEFORGE_ADMIN_EMAILS").unwrap_or_default(),
            &lookup("SITEFORGE_ADMIN_DOMAINS").unwrap_or_default(),
        );
        if admin.is_empty() {
            warn!("admin allow-list is empty; nobody can enter the admin area");
        }

        let delete_concurrency = parse(&lookup, "SITEFORGE_DELETE_CONCURRENCY")?.unwrap_or(defaults.delete_concurrency);
        if delete_concurrency == 0 {
            return Err(ConfigError::Zero {
                var: "SITEFORGE_DELETE_CONCURRENCY",
            });
        }

        Ok(Self {
            bind_addr: parse(&lookup, "SITEFORGE_BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            session_secret,
            site_prefix: lookup("SITEFORGE_SITE_PREFIX").unwrap_or(defaults.site_prefix),
            admin,
            delete_concurrency,
            store_timeout: parse(&lookup, "SITEFORGE_STORE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            proof_ttl: parse(&lookup, "SITEFORGE_PROOF_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.proof_ttl),
        })
    }

    pub fn resolver(&self) -> TenantResolver {
        TenantResolver::new(self.site_prefix.clone())
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_max_concurrency(self.delete_concurrency)
            .with_call_timeout(self.store_timeout)
    }

    pub fn proof_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.proof_ttl).unwrap_or_else(|_| chrono::Duration::seconds(300))
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
