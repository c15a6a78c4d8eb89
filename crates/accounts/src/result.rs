//! Audit artifact of one deletion run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use siteforge_core::{PrincipalId, TenantName};

use crate::AccountError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    GlobalDirect,
    GlobalFieldSearch,
    TenantDiscovery,
    TenantScoped,
    Blobs,
    WidenedSearch,
    Verification,
    TenantPointers,
    Principal,
}

/// Outcome for one target (collection or blob prefix) within one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { deleted: usize },
    Failed { deleted: usize, errors: Vec<AccountError> },
    Skipped { reason: String },
}

impl Outcome {
    pub fn from_tally(deleted: usize, errors: Vec<AccountError>) -> Self {
        if errors.is_empty() {
            Outcome::Success { deleted }
        } else {
            Outcome::Failed { deleted, errors }
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped { reason: reason.into() }
    }

    pub fn deleted(&self) -> usize {
        match self {
            Outcome::Success { deleted } | Outcome::Failed { deleted, .. } => *deleted,
            Outcome::Skipped { .. } => 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn errors(&self) -> &[AccountError] {
        match self {
            Outcome::Failed { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub targets: BTreeMap<String, Outcome>,
}

impl PhaseReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            targets: BTreeMap::new(),
        }
    }

    /// Record an outcome, merging with an earlier one for the same target.
    pub fn record(&mut self, target: impl Into<String>, outcome: Outcome) {
        let target = target.into();
        let merged = match self.targets.remove(&target) {
            None => outcome,
            Some(Outcome::Skipped { .. }) => outcome,
            Some(previous) => match outcome {
                Outcome::Skipped { .. } => previous,
                next => {
                    let deleted = previous.deleted() + next.deleted();
                    let mut errors = previous.errors().to_vec();
                    errors.extend_from_slice(next.errors());
                    Outcome::from_tally(deleted, errors)
                }
            },
        };
        self.targets.insert(target, merged);
    }

    pub fn deleted(&self) -> usize {
        self.targets.values().map(Outcome::deleted).sum()
    }

    pub fn failed_targets(&self) -> impl Iterator<Item = &str> {
        self.targets
            .iter()
            .filter(|(_, o)| o.is_failed())
            .map(|(t, _)| t.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRelation {
    /// The principal owns the storefront: every tenant-scoped document goes.
    Owner,
    /// The principal is a site user: only its own documents go.
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantBinding {
    pub tenant: TenantName,
    pub relation: TenantRelation,
}

/// Result of the final re-scan.
///
/// Anything found here should have been removed by earlier phases; it is
/// deleted during the scan and recorded as an anomaly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub documents_still_found: usize,
    pub blobs_still_found: usize,
    /// Leftovers per scanned collection or blob prefix (zero entries included).
    pub per_target: BTreeMap<String, usize>,
    pub anomalies: Vec<AccountError>,
    /// Targets that could not be scanned; completeness is unproven for them.
    pub unscanned: Vec<String>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.documents_still_found == 0 && self.blobs_still_found == 0 && self.unscanned.is_empty()
    }
}

/// Immutable evidence of one `delete_account` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionResult {
    pub run_id: Uuid,
    pub principal_id: PrincipalId,
    pub plan_version: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tenants: Vec<TenantBinding>,
    pub phases: Vec<PhaseReport>,
    pub verification: VerificationReport,
    pub principal: Outcome,
}

impl DeletionResult {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn outcome(&self, phase: Phase, target: &str) -> Option<&Outcome> {
        self.phase(phase).and_then(|p| p.targets.get(target))
    }

    /// All per-item errors recorded during the run, verification anomalies
    /// included.
    pub fn errors(&self) -> impl Iterator<Item = &AccountError> {
        self.phases
            .iter()
            .flat_map(|p| p.targets.values())
            .chain(std::iter::once(&self.principal))
            .flat_map(Outcome::errors)
    }

    pub fn total_deleted(&self) -> usize {
        self.phases.iter().map(PhaseReport::deleted).sum()
    }

    /// Full success: no failed target, a clean verification, principal removed.
    pub fn is_complete(&self) -> bool {
        self.errors().next().is_none()
            && self.verification.is_clean()
            && !matches!(self.principal, Outcome::Skipped { .. })
    }
}
