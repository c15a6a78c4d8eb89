//! Phase-ordered, best-effort cascading deletion.
//!
//! ## Phases
//!
//! 1. Global direct-key: documents whose id is the principal id. Each is read
//!    before it is deleted. Tenant pointers (`siteData`, `siteUserIndex`) are
//!    only read here.
//! 2. Global field-search: documents whose nominal owner field matches.
//! 3. Tenant discovery: owned tenant (`siteData`) and member tenant
//!    (`siteUserIndex`).
//! 4. Tenant-scoped: owned tenant collections are emptied; in a member
//!    tenant only the principal's own documents go.
//! 5. Blobs under each prefix template.
//! 6. Widened re-search of every resolved collection with the full alias set.
//! 7. Verification: exhaustive re-scan; leftovers are deleted and reported.
//! 8. Tenant pointers: a pointer is deleted once its tenant's collections
//!    verified clean. An unresolved pointer, or one whose tenant still holds
//!    data, is kept so a repeated run can find the tenant again.
//! 9. Removal of the principal from the authentication provider, only when
//!    every earlier phase succeeded and verification is clean. Otherwise the
//!    principal is kept and the user can repeat the request.
//!
//! Phases run strictly in order. Within a phase, deletes fan out with a
//! bounded number of in-flight calls. Every collaborator call has a timeout;
//! a failure is recorded against its target and the run continues.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use siteforge_auth::{AuthService, AuthServiceError, DeletionProof, Principal};
use siteforge_core::{CollectionName, Document, DocumentId, PrincipalId, TenantName};
use siteforge_infra::{BlobRef, BlobStore, DocumentStore};

use crate::plan::{DeletionPlan, DeletionPlanner, MatchKind, TenantPointer};
use crate::result::{
    DeletionResult, Outcome, Phase, PhaseReport, TenantBinding, TenantRelation, VerificationReport,
};
use crate::AccountError;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum in-flight deletes within one phase.
    pub max_concurrency: usize,
    /// Upper bound for every store, blob and auth call.
    pub call_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

async fn timed<T, E: core::fmt::Display>(
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, String> {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(timeout_reason(limit)),
    }
}

fn timeout_reason(limit: Duration) -> String {
    format!("timed out after {}ms", limit.as_millis())
}

/// A collection resolved for this run, with how leftovers are recognised.
#[derive(Debug, Clone)]
struct Resolved {
    collection: CollectionName,
    /// Owned tenant collections must end up empty.
    wipe: bool,
}

/// Per-target count of successful deletes and failures.
#[derive(Debug, Default)]
struct Tally {
    deleted: usize,
    errors: Vec<AccountError>,
}

impl Tally {
    fn into_outcome(self) -> Outcome {
        Outcome::from_tally(self.deleted, self.errors)
    }
}

/// What tenant discovery learned from one pointer document.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PointerState {
    Absent,
    Points(TenantName),
    /// Unreadable or corrupt; the document must stay.
    Unresolved,
}

/// Mutable state of one run.
struct Run {
    principal: PrincipalId,
    id: DocumentId,
    /// Documents read in phase 1, by collection.
    captured: BTreeMap<&'static str, Result<Option<Document>, String>>,
    pointers: Vec<(TenantPointer, PointerState)>,
    tenants: Vec<TenantBinding>,
    phases: Vec<PhaseReport>,
}

/// Executes the deletion plan against the store, blob storage and the
/// authentication provider.
#[derive(Clone)]
pub struct DeletionOrchestrator {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    auth: Arc<dyn AuthService>,
    plan: DeletionPlan,
    config: OrchestratorConfig,
}

impl DeletionOrchestrator {
    pub fn new(store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>, auth: Arc<dyn AuthService>) -> Self {
        Self {
            store,
            blobs,
            auth,
            plan: DeletionPlanner::plan(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_plan(mut self, plan: DeletionPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn plan(&self) -> &DeletionPlan {
        &self.plan
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run the full cascade for `principal`.
    ///
    /// Requires a proof issued by the re-authentication gate; the proof is
    /// consumed. Proof errors are the only `Err`: once the proof is redeemed
    /// the run always completes and reports every phase.
    ///
    /// A run that leaves anything behind keeps the principal and the tenant
    /// pointers, so repeating the request picks up where this one stopped.
    pub async fn delete_account(&self, principal: &Principal, proof: DeletionProof) -> Result<DeletionResult, AccountError> {
        let proof_id = proof.redeem(&principal.id, Utc::now())?;
        let started_at = Utc::now();
        let run_id = Uuid::now_v7();

        info!(
            %run_id,
            %proof_id,
            principal_id = %principal.id,
            plan_version = self.plan.version,
            "account deletion started"
        );

        let mut run = Run {
            principal: principal.id.clone(),
            id: DocumentId::from(principal.id.clone()),
            captured: BTreeMap::new(),
            pointers: Vec::new(),
            tenants: Vec::new(),
            phases: Vec::new(),
        };

        self.global_direct(&mut run).await;
        self.global_field_search(&mut run).await;
        self.discover_tenants(&mut run).await;
        self.tenant_scoped(&mut run).await;
        self.delete_blobs(&mut run).await;

        let resolved = self.resolved_collections(&run);
        self.widened_search(&mut run, &resolved).await;
        let verification = self.verify(&mut run, &resolved).await;
        let pointers_kept = self.release_pointers(&mut run, &verification).await;

        let settled = pointers_kept == 0
            && verification.is_clean()
            && run.phases.iter().all(|p| p.failed_targets().next().is_none());
        let principal_outcome = if settled {
            self.remove_principal(&run).await
        } else {
            warn!(
                principal_id = %run.principal,
                pointers_kept,
                "deletion incomplete; principal kept so the request can be repeated"
            );
            Outcome::skipped("deletion incomplete; principal kept so the request can be repeated")
        };

        let result = DeletionResult {
            run_id,
            principal_id: run.principal,
            plan_version: self.plan.version,
            started_at,
            finished_at: Utc::now(),
            tenants: run.tenants,
            phases: run.phases,
            verification,
            principal: principal_outcome,
        };

        let failures = result.errors().count();
        if result.is_complete() {
            info!(%run_id, deleted = result.total_deleted(), "account deletion complete");
        } else {
            warn!(
                %run_id,
                deleted = result.total_deleted(),
                failures,
                still_found = result.verification.documents_still_found,
                blobs_still_found = result.verification.blobs_still_found,
                "account deletion finished with partial failures"
            );
        }
        Ok(result)
    }

    // ── Phase 1 ──────────────────────────────────────────────────────────────

    async fn global_direct(&self, run: &mut Run) {
        let mut report = PhaseReport::new(Phase::GlobalDirect);
        let mut targets = Vec::new();

        for rule in self.plan.global_direct() {
            let collection = CollectionName::global(rule.collection);
            let read = timed(self.config.call_timeout, self.store.get(&collection, &run.id)).await;
            match &read {
                Ok(None) => report.record(collection.as_str(), Outcome::Success { deleted: 0 }),
                // Tenant pointers are released after verification.
                Ok(Some(_)) if self.is_tenant_pointer(rule.collection) => {
                    report.record(collection.as_str(), Outcome::skipped("tenant pointer; kept until its tenant is cleared"));
                }
                Err(reason) if self.is_tenant_pointer(rule.collection) => {
                    debug!(collection = rule.collection, %reason, "tenant pointer unreadable; retrying at discovery");
                    report.record(collection.as_str(), Outcome::skipped("unreadable; retried at tenant discovery"));
                }
                Ok(Some(_)) => targets.push((collection, run.id.clone())),
                // Deleting a missing document is a no-op, so delete blind.
                Err(reason) => {
                    debug!(collection = rule.collection, %reason, "pre-delete read failed; deleting blind");
                    targets.push((collection, run.id.clone()));
                }
            }
            run.captured.insert(rule.collection, read);
        }

        self.apply_deletes(&mut report, targets).await;
        self.finish_phase(run, report);
    }

    // ── Phase 2 ──────────────────────────────────────────────────────────────

    async fn global_field_search(&self, run: &mut Run) {
        let mut report = PhaseReport::new(Phase::GlobalFieldSearch);
        let mut targets = Vec::new();

        for (rule, field) in self.plan.global_by_field() {
            let collection = CollectionName::global(rule.collection);
            self.collect_matches(&mut report, &mut targets, &collection, field, &run.principal)
                .await;
        }

        self.apply_deletes(&mut report, targets).await;
        self.finish_phase(run, report);
    }

    // ── Phase 3 ──────────────────────────────────────────────────────────────

    async fn discover_tenants(&self, run: &mut Run) {
        let mut report = PhaseReport::new(Phase::TenantDiscovery);

        let owned = self.read_pointer(run, self.plan.owned_site).await;
        let member = self.read_pointer(run, self.plan.member_site).await;

        for (pointer, relation, found) in [
            (self.plan.owned_site, TenantRelation::Owner, owned),
            (self.plan.member_site, TenantRelation::Member, member),
        ] {
            let state = match found {
                Ok(Some(tenant)) => {
                    info!(principal_id = %run.principal, %tenant, ?relation, "tenant discovered");
                    report.record(pointer.collection, Outcome::Success { deleted: 0 });
                    if !run.tenants.iter().any(|b| b.tenant == tenant) {
                        run.tenants.push(TenantBinding {
                            tenant: tenant.clone(),
                            relation,
                        });
                    }
                    PointerState::Points(tenant)
                }
                Ok(None) => {
                    report.record(pointer.collection, Outcome::skipped("no tenant recorded"));
                    PointerState::Absent
                }
                Err(reason) => {
                    warn!(principal_id = %run.principal, collection = pointer.collection, %reason, "tenant pointer unresolved");
                    report.record(
                        pointer.collection,
                        Outcome::from_tally(
                            0,
                            vec![AccountError::LookupUnavailable {
                                target: pointer.collection.to_string(),
                                reason,
                            }],
                        ),
                    );
                    PointerState::Unresolved
                }
            };
            run.pointers.push((pointer, state));
        }

        self.finish_phase(run, report);
    }

    fn is_tenant_pointer(&self, collection: &str) -> bool {
        collection == self.plan.owned_site.collection || collection == self.plan.member_site.collection
    }

    /// The principal's own pointer documents; only phase 8 deletes them.
    fn is_pointer_document(&self, run: &Run, collection: &CollectionName, id: &DocumentId) -> bool {
        *id == run.id && self.is_tenant_pointer(collection.as_str())
    }

    /// Tenant named by a pointer document, preferring the phase-1 capture.
    async fn read_pointer(&self, run: &Run, pointer: TenantPointer) -> Result<Option<TenantName>, String> {
        let document = match run.captured.get(pointer.collection) {
            Some(Ok(doc)) => doc.clone(),
            // Not captured, or the capture failed: the document may still be there.
            _ => timed(
                self.config.call_timeout,
                self.store.get(&CollectionName::global(pointer.collection), &run.id),
            )
            .await?,
        };

        let Some(document) = document else {
            return Ok(None);
        };
        // A pointer without a tenant name is corrupt, not empty.
        let name = document
            .field_str(pointer.field)
            .ok_or_else(|| format!("{}/{}: missing {}", pointer.collection, run.id, pointer.field))?;
        TenantName::new(name)
            .map(Some)
            .map_err(|e| format!("{}.{}: {e}", pointer.collection, pointer.field))
    }

    // ── Phase 4 ──────────────────────────────────────────────────────────────

    async fn tenant_scoped(&self, run: &mut Run) {
        let mut report = PhaseReport::new(Phase::TenantScoped);
        let mut targets = Vec::new();

        if run.tenants.is_empty() {
            for rule in self.plan.tenant_scoped() {
                report.record(format!("*_{}", rule.collection), Outcome::skipped("no tenant discovered"));
            }
        }

        for binding in &run.tenants {
            for rule in self.plan.tenant_scoped() {
                let collection = CollectionName::tenant_scoped(&binding.tenant, rule.collection);
                match (binding.relation, rule.match_kind) {
                    (TenantRelation::Owner, _) => {
                        let listed = timed(self.config.call_timeout, self.store.list_all(&collection)).await;
                        match listed {
                            Ok(docs) => {
                                report.record(collection.as_str(), Outcome::Success { deleted: 0 });
                                targets.extend(docs.into_iter().map(|d| (collection.clone(), d.id)));
                            }
                            Err(reason) => record_lookup_failure(&mut report, &collection, reason),
                        }
                    }
                    (TenantRelation::Member, MatchKind::ByDocumentId) => {
                        targets.push((collection, run.id.clone()));
                    }
                    (TenantRelation::Member, MatchKind::ByField(field)) => {
                        self.collect_matches(&mut report, &mut targets, &collection, field, &run.principal)
                            .await;
                    }
                }
            }
        }

        self.apply_deletes(&mut report, targets).await;
        self.finish_phase(run, report);
    }

    // ── Phase 5 ──────────────────────────────────────────────────────────────

    async fn delete_blobs(&self, run: &mut Run) {
        let mut report = PhaseReport::new(Phase::Blobs);
        let mut targets = Vec::new();

        for prefix in self.plan.blob_prefixes_for(&run.principal) {
            match timed(self.config.call_timeout, self.blobs.list_under_prefix(&prefix)).await {
                Ok(found) => {
                    report.record(prefix.as_str(), Outcome::Success { deleted: 0 });
                    targets.extend(found.into_iter().map(|b| (prefix.clone(), b)));
                }
                Err(reason) => report.record(
                    prefix.as_str(),
                    Outcome::from_tally(
                        0,
                        vec![AccountError::LookupUnavailable {
                            target: prefix.clone(),
                            reason,
                        }],
                    ),
                ),
            }
        }

        self.apply_blob_deletes(&mut report, targets).await;
        self.finish_phase(run, report);
    }

    // ── Phase 6 ──────────────────────────────────────────────────────────────

    /// Global collections of the plan plus the collections of every
    /// discovered tenant. Nothing named for another tenant is ever included.
    fn resolved_collections(&self, run: &Run) -> Vec<Resolved> {
        let mut out: Vec<Resolved> = self
            .plan
            .global_collections()
            .into_iter()
            .map(|c| Resolved {
                collection: CollectionName::global(c),
                wipe: false,
            })
            .collect();

        for binding in &run.tenants {
            for rule in self.plan.tenant_scoped() {
                let collection = CollectionName::tenant_scoped(&binding.tenant, rule.collection);
                if out.iter().any(|r| r.collection == collection) {
                    continue;
                }
                out.push(Resolved {
                    collection,
                    wipe: binding.relation == TenantRelation::Owner,
                });
            }
        }
        out
    }

    async fn widened_search(&self, run: &mut Run, resolved: &[Resolved]) {
        let mut report = PhaseReport::new(Phase::WidenedSearch);
        let mut targets = Vec::new();

        for r in resolved {
            for field in self.plan.alias_fields() {
                self.collect_matches(&mut report, &mut targets, &r.collection, field, &run.principal)
                    .await;
            }
        }

        // A document can match several aliases; delete it once.
        targets.sort();
        targets.dedup();
        targets.retain(|(collection, id)| !self.is_pointer_document(run, collection, id));

        if !targets.is_empty() {
            info!(
                principal_id = %run.principal,
                count = targets.len(),
                "widened search found documents missed by nominal fields"
            );
        }
        self.apply_deletes(&mut report, targets).await;
        self.finish_phase(run, report);
    }

    // ── Phase 7 ──────────────────────────────────────────────────────────────

    async fn verify(&self, run: &mut Run, resolved: &[Resolved]) -> VerificationReport {
        let mut report = PhaseReport::new(Phase::Verification);
        let mut verification = VerificationReport::default();
        let aliases = self.plan.alias_fields();
        let mut targets = Vec::new();

        for r in resolved {
            let docs = match timed(self.config.call_timeout, self.store.list_all(&r.collection)).await {
                Ok(docs) => docs,
                Err(reason) => {
                    warn!(collection = %r.collection, %reason, "verification scan failed");
                    verification.unscanned.push(r.collection.to_string());
                    record_lookup_failure(&mut report, &r.collection, reason);
                    continue;
                }
            };

            let leftovers: Vec<Document> = docs
                .into_iter()
                .filter(|d| !self.is_pointer_document(run, &r.collection, &d.id))
                .filter(|d| r.wipe || d.is_owned_by(&run.principal, aliases.iter().copied()))
                .collect();

            verification
                .per_target
                .insert(r.collection.to_string(), leftovers.len());
            verification.documents_still_found += leftovers.len();
            report.record(r.collection.as_str(), Outcome::Success { deleted: 0 });

            for doc in leftovers {
                warn!(collection = %r.collection, id = %doc.id, "verification anomaly: document survived the cascade");
                verification.anomalies.push(AccountError::VerificationAnomaly {
                    collection: r.collection.to_string(),
                    id: doc.id.to_string(),
                });
                targets.push((r.collection.clone(), doc.id));
            }
        }
        self.apply_deletes(&mut report, targets).await;

        let mut blob_targets = Vec::new();
        for prefix in self.plan.blob_prefixes_for(&run.principal) {
            match timed(self.config.call_timeout, self.blobs.list_under_prefix(&prefix)).await {
                Ok(found) => {
                    verification.per_target.insert(prefix.clone(), found.len());
                    verification.blobs_still_found += found.len();
                    report.record(prefix.as_str(), Outcome::Success { deleted: 0 });
                    for blob in found {
                        warn!(%prefix, path = %blob, "verification anomaly: blob survived the cascade");
                        verification.anomalies.push(AccountError::VerificationAnomaly {
                            collection: prefix.clone(),
                            id: blob.path.clone(),
                        });
                        blob_targets.push((prefix.clone(), blob));
                    }
                }
                Err(reason) => {
                    verification.unscanned.push(prefix.clone());
                    report.record(
                        prefix.as_str(),
                        Outcome::from_tally(
                            0,
                            vec![AccountError::LookupUnavailable {
                                target: prefix.clone(),
                                reason,
                            }],
                        ),
                    );
                }
            }
        }
        self.apply_blob_deletes(&mut report, blob_targets).await;

        info!(
            principal_id = %run.principal,
            documents_still_found = verification.documents_still_found,
            blobs_still_found = verification.blobs_still_found,
            unscanned = verification.unscanned.len(),
            "verification pass finished"
        );
        self.finish_phase(run, report);
        verification
    }

    // ── Phase 8 ──────────────────────────────────────────────────────────────

    /// Delete each pointer whose tenant verified clean. Returns how many
    /// pointers were kept.
    async fn release_pointers(&self, run: &mut Run, verification: &VerificationReport) -> usize {
        let mut report = PhaseReport::new(Phase::TenantPointers);
        let mut targets = Vec::new();
        let mut kept = 0;

        for (pointer, state) in &run.pointers {
            match state {
                PointerState::Absent => report.record(pointer.collection, Outcome::Success { deleted: 0 }),
                PointerState::Unresolved => {
                    kept += 1;
                    report.record(pointer.collection, Outcome::skipped("tenant unknown; pointer kept"));
                }
                PointerState::Points(tenant) if self.tenant_cleared(run, tenant, verification) => {
                    targets.push((CollectionName::global(pointer.collection), run.id.clone()));
                }
                PointerState::Points(tenant) => {
                    kept += 1;
                    info!(principal_id = %run.principal, %tenant, collection = pointer.collection, "tenant data remains; pointer kept");
                    report.record(pointer.collection, Outcome::skipped("tenant data remains; pointer kept"));
                }
            }
        }

        self.apply_deletes(&mut report, targets).await;
        kept += report.failed_targets().count();
        self.finish_phase(run, report);
        kept
    }

    /// Every collection of `tenant` was scanned by verification and nothing
    /// found there failed to delete.
    fn tenant_cleared(&self, run: &Run, tenant: &TenantName, verification: &VerificationReport) -> bool {
        let verified = run.phases.iter().find(|p| p.phase == Phase::Verification);
        self.plan.tenant_scoped().all(|rule| {
            let collection = CollectionName::tenant_scoped(tenant, rule.collection);
            let name = collection.as_str();
            !verification.unscanned.iter().any(|u| u == name)
                && verified.is_some_and(|p| p.targets.get(name).is_some_and(|o| !o.is_failed()))
        })
    }

    // ── Phase 9 ──────────────────────────────────────────────────────────────

    async fn remove_principal(&self, run: &Run) -> Outcome {
        let limit = self.config.call_timeout;
        let reason = match tokio::time::timeout(limit, self.auth.delete_principal(&run.principal)).await {
            Ok(Ok(())) => {
                info!(principal_id = %run.principal, "principal removed from auth provider");
                return Outcome::Success { deleted: 1 };
            }
            // Already gone: a repeated run converges.
            Ok(Err(AuthServiceError::NotFound)) => return Outcome::Success { deleted: 0 },
            Ok(Err(e)) => e.to_string(),
            Err(_) => timeout_reason(limit),
        };
        warn!(principal_id = %run.principal, %reason, "principal removal failed");
        Outcome::from_tally(0, vec![AccountError::PrincipalDeleteFailed { reason }])
    }

    // ── Shared helpers ───────────────────────────────────────────────────────

    /// Query `collection` for documents whose `field` holds the principal id
    /// and queue them for deletion.
    async fn collect_matches(
        &self,
        report: &mut PhaseReport,
        targets: &mut Vec<(CollectionName, DocumentId)>,
        collection: &CollectionName,
        field: &str,
        principal: &PrincipalId,
    ) {
        let queried = timed(
            self.config.call_timeout,
            self.store.query_by_field(collection, field, principal.as_str()),
        )
        .await;
        match queried {
            Ok(docs) => {
                report.record(collection.as_str(), Outcome::Success { deleted: 0 });
                targets.extend(docs.into_iter().map(|d| (collection.clone(), d.id)));
            }
            Err(reason) => record_lookup_failure(report, collection, format!("{field}: {reason}")),
        }
    }

    /// Delete documents with bounded parallelism and record per-collection
    /// outcomes.
    async fn apply_deletes(&self, report: &mut PhaseReport, targets: Vec<(CollectionName, DocumentId)>) {
        let store = Arc::clone(&self.store);
        let results = self
            .bounded(targets, move |(collection, id)| {
                let store = Arc::clone(&store);
                async move { store.delete(&collection, &id).await }
            })
            .await;

        let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
        for ((collection, id), result) in results {
            let tally = tallies.entry(collection.to_string()).or_default();
            match result {
                Ok(()) => {
                    debug!(%collection, %id, "deleted");
                    tally.deleted += 1;
                }
                Err(reason) => {
                    warn!(%collection, %id, %reason, "delete failed");
                    tally.errors.push(AccountError::CollectionDeleteFailed {
                        collection: collection.to_string(),
                        id: id.to_string(),
                        reason,
                    });
                }
            }
        }
        for (collection, tally) in tallies {
            report.record(collection, tally.into_outcome());
        }
    }

    async fn apply_blob_deletes(&self, report: &mut PhaseReport, targets: Vec<(String, BlobRef)>) {
        let blobs = Arc::clone(&self.blobs);
        let results = self
            .bounded(targets, move |(_, blob)| {
                let blobs = Arc::clone(&blobs);
                async move { blobs.delete(&blob).await }
            })
            .await;

        let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
        for ((prefix, blob), result) in results {
            let tally = tallies.entry(prefix.clone()).or_default();
            match result {
                Ok(()) => {
                    debug!(%prefix, path = %blob, "blob deleted");
                    tally.deleted += 1;
                }
                Err(reason) => {
                    warn!(%prefix, path = %blob, %reason, "blob delete failed");
                    tally.errors.push(AccountError::BlobDeleteFailed {
                        prefix: prefix.clone(),
                        path: blob.path,
                        reason,
                    });
                }
            }
        }
        for (prefix, tally) in tallies {
            report.record(prefix, tally.into_outcome());
        }
    }

    /// Run `op` for every item with at most `max_concurrency` in flight and a
    /// timeout per call. Results come back paired with their item.
    async fn bounded<I, F, Fut, E>(&self, items: Vec<I>, op: F) -> Vec<(I, Result<(), String>)>
    where
        I: Clone + PartialEq + Send + 'static,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: core::fmt::Display + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let limit = self.config.call_timeout;
        let mut set = JoinSet::new();

        for item in items.iter().cloned() {
            let call = op(item.clone());
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                // The semaphore is never closed; the permit is held until the call ends.
                let _permit = semaphore.acquire_owned().await;
                let result = timed(limit, call).await;
                (item, result)
            });
        }

        let mut out = Vec::with_capacity(items.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(done) => out.push(done),
                Err(e) => warn!(error = %e, "delete task did not complete"),
            }
        }

        // A panicked task still counts against its target.
        if out.len() < items.len() {
            for item in items {
                if !out.iter().any(|(done, _)| *done == item) {
                    out.push((item, Err("task aborted".to_string())));
                }
            }
        }
        out
    }

    fn finish_phase(&self, run: &mut Run, report: PhaseReport) {
        let failed: Vec<&str> = report.failed_targets().collect();
        info!(
            principal_id = %run.principal,
            phase = ?report.phase,
            targets = report.targets.len(),
            deleted = report.deleted(),
            failed = failed.len(),
            "phase finished"
        );
        run.phases.push(report);
    }
}

fn record_lookup_failure(report: &mut PhaseReport, collection: &CollectionName, reason: String) {
    warn!(%collection, %reason, "lookup failed");
    report.record(
        collection.as_str(),
        Outcome::from_tally(
            0,
            vec![AccountError::LookupUnavailable {
                target: collection.to_string(),
                reason,
            }],
        ),
    );
}
