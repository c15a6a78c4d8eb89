//! Admin eligibility policy.
//!
//! An email allow-list of exact addresses and domain suffixes. An empty policy
//! admits nobody; being authenticated is never enough on its own.

use serde::{Deserialize, Serialize};

use crate::Principal;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPolicy {
    /// Exact addresses (compared case-insensitively).
    #[serde(default)]
    pub emails: Vec<String>,
    /// Domain suffixes such as `example.com`; matches `a@example.com` and
    /// `a@shop.example.com`, never `a@badexample.com`.
    #[serde(default)]
    pub domains: Vec<String>,
}

impl AdminPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.emails.push(email.into().trim().to_ascii_lowercase());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        let domain: String = domain.into();
        self.domains
            .push(domain.trim().trim_start_matches(['@', '.']).to_ascii_lowercase());
        self
    }

    /// Parse comma-separated allow-lists (as found in environment variables).
    pub fn from_lists(emails: &str, domains: &str) -> Self {
        let split = |s: &str| {
            s.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        let policy = split(emails)
            .into_iter()
            .fold(Self::new(), |p, email| p.with_email(email));
        split(domains)
            .into_iter()
            .fold(policy, |p, domain| p.with_domain(domain))
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.domains.is_empty()
    }

    pub fn is_eligible(&self, principal: &Principal) -> bool {
        let email = principal.normalized_email();
        let Some((local, host)) = email.rsplit_once('@') else {
            return false;
        };
        if local.is_empty() || host.is_empty() {
            return false;
        }

        if self.emails.iter().any(|e| e.eq_ignore_ascii_case(&email)) {
            return true;
        }

        self.domains.iter().any(|d| {
            let d = d.as_str();
            host == d || host.strip_suffix(d).is_some_and(|head| head.ends_with('.'))
        })
    }
}
