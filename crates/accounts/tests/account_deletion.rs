use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use siteforge_accounts::{
    AccountCloser, AccountError, DeletionOrchestrator, OrchestratorConfig, Outcome, Phase, TenantRelation,
};
use siteforge_auth::{AuthService, AuthServiceError, CredentialReauthGate, Principal, Secret};
use siteforge_core::{CollectionName, Document, DocumentId, PrincipalId, TenantName};
use siteforge_infra::document_store::in_memory::Fault;
use siteforge_infra::{InMemoryAuthService, InMemoryBlobStore, InMemoryDocumentStore};

const PASSWORD: &str = "correct horse";

fn pid(id: &str) -> PrincipalId {
    PrincipalId::new(id).unwrap()
}

fn did(id: &str) -> DocumentId {
    DocumentId::new(id).unwrap()
}

fn tenant(name: &str) -> TenantName {
    TenantName::new(name).unwrap()
}

fn global(name: &str) -> CollectionName {
    CollectionName::global(name)
}

fn scoped(t: &str, name: &str) -> CollectionName {
    CollectionName::tenant_scoped(&tenant(t), name)
}

fn principal(id: &str) -> Principal {
    Principal::new(pid(id), format!("{id}@mail.com"))
}

fn owned(id: &str, field: &str, owner: &str) -> Document {
    Document::new(did(id)).with_field(field, owner)
}

struct Fixture {
    store: Arc<InMemoryDocumentStore>,
    blobs: Arc<InMemoryBlobStore>,
    auth: Arc<InMemoryAuthService>,
}

impl Fixture {
    fn new() -> Self {
        let auth = InMemoryAuthService::new().with_max_failed_attempts(2);
        auth.register(pid("u1"), PASSWORD);
        auth.register(pid("u5"), PASSWORD);
        Self {
            store: Arc::new(InMemoryDocumentStore::new()),
            blobs: Arc::new(InMemoryBlobStore::new()),
            auth: Arc::new(auth),
        }
    }

    fn closer(&self) -> AccountCloser {
        AccountCloser::new(self.store.clone(), self.blobs.clone(), self.auth.clone())
    }

    /// u1 owns storefront "shopa". Tenant "shopb" reuses the same document
    /// ids and must never be touched.
    fn seed_owner(&self) {
        let s = &self.store;
        s.insert(global("siteData"), Document::new(did("u1")).with_field("siteName", "shopa"));
        s.insert(global("users"), Document::new(did("u1")).with_field("email", "u1@mail.com"));
        s.insert(global("products"), owned("p1", "ownerId", "u1"));
        s.insert(global("products"), owned("p2", "ownerId", "u2"));
        s.insert(global("categories"), owned("c1", "ownerId", "u1"));
        s.insert(global("sliders"), owned("s1", "creatorId", "u1"));
        s.insert(global("blogPosts"), owned("b1", "authorId", "u1"));
        s.insert(global("teams"), owned("t1", "managerId", "u1"));
        s.insert(global("reviews"), owned("r1", "userId", "u1"));
        s.insert(global("reviews"), owned("r2", "userId", "u2"));

        s.insert(scoped("shopa", "users"), Document::new(did("u9")));
        s.insert(scoped("shopa", "orders"), owned("o1", "userId", "u9"));
        s.insert(scoped("shopa", "carts"), owned("k1", "userId", "u9"));

        s.insert(scoped("shopb", "users"), Document::new(did("u1")));
        s.insert(scoped("shopb", "orders"), owned("o1", "userId", "u1"));

        for path in [
            "sliders/u1/hero.png",
            "products/u1/p1.png",
            "avatars/u1/me.png",
            "sites/u1/logo.svg",
            "sliders/u10/hero.png",
        ] {
            self.blobs.put(path);
        }
    }
}

#[tokio::test]
async fn owner_deletion_removes_everything_it_owns_and_nothing_else() {
    let fx = Fixture::new();
    fx.seed_owner();

    let result = fx
        .closer()
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    assert!(result.is_complete(), "unexpected errors: {:?}", result.errors().collect::<Vec<_>>());
    assert_eq!(result.tenants.len(), 1);
    assert_eq!(result.tenants[0].tenant, tenant("shopa"));
    assert_eq!(result.tenants[0].relation, TenantRelation::Owner);

    for (collection, id) in [
        ("siteData", "u1"),
        ("users", "u1"),
        ("products", "p1"),
        ("categories", "c1"),
        ("sliders", "s1"),
        ("blogPosts", "b1"),
        ("teams", "t1"),
        ("reviews", "r1"),
    ] {
        assert!(!fx.store.contains(&global(collection), &did(id)), "{collection}/{id} survived");
    }
    assert_eq!(fx.store.count(&scoped("shopa", "users")), 0);
    assert_eq!(fx.store.count(&scoped("shopa", "orders")), 0);
    assert_eq!(fx.store.count(&scoped("shopa", "carts")), 0);

    // Other principals and other tenants.
    assert!(fx.store.contains(&global("products"), &did("p2")));
    assert!(fx.store.contains(&global("reviews"), &did("r2")));
    assert!(fx.store.contains(&scoped("shopb", "users"), &did("u1")));
    assert!(fx.store.contains(&scoped("shopb", "orders"), &did("o1")));

    // Only the neighbouring prefix's blob is left.
    assert_eq!(fx.blobs.len(), 1);
    assert_eq!(result.outcome(Phase::Blobs, "sliders/u1/").map(Outcome::deleted), Some(1));

    assert!(!fx.auth.exists(&pid("u1")));
    assert_eq!(result.principal, Outcome::Success { deleted: 1 });
}

#[tokio::test]
async fn phases_are_reported_in_order() {
    let fx = Fixture::new();
    fx.seed_owner();

    let result = fx
        .closer()
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    let phases: Vec<Phase> = result.phases.iter().map(|p| p.phase).collect();
    assert_eq!(
        phases,
        vec![
            Phase::GlobalDirect,
            Phase::GlobalFieldSearch,
            Phase::TenantDiscovery,
            Phase::TenantScoped,
            Phase::Blobs,
            Phase::WidenedSearch,
            Phase::Verification,
            Phase::TenantPointers,
        ]
    );
    // The site pointer outlives the tenant data it points to.
    assert!(matches!(
        result.outcome(Phase::GlobalDirect, "siteData"),
        Some(Outcome::Skipped { .. })
    ));
    assert_eq!(result.outcome(Phase::TenantPointers, "siteData").map(Outcome::deleted), Some(1));
    assert_eq!(result.outcome(Phase::TenantScoped, "shopa_users").map(Outcome::deleted), Some(1));
    assert!(result.finished_at >= result.started_at);
}

#[tokio::test]
async fn wrong_credential_mutates_nothing_and_stays_pending() {
    let fx = Fixture::new();
    fx.seed_owner();

    let err = fx
        .closer()
        .delete_account(&principal("u1"), &Secret::new("guess"))
        .await
        .unwrap_err();

    assert_eq!(err, AccountError::WrongCredential);
    assert!(err.keeps_action_pending());
    assert!(err.is_pre_mutation());
    assert_eq!(fx.store.mutation_count(), 0);
    assert_eq!(fx.blobs.mutation_count(), 0);
    assert!(fx.auth.exists(&pid("u1")));
}

#[tokio::test]
async fn rate_limited_reauth_aborts_without_mutation() {
    let fx = Fixture::new();
    fx.seed_owner();
    let closer = fx.closer();

    for _ in 0..2 {
        let err = closer
            .delete_account(&principal("u1"), &Secret::new("guess"))
            .await
            .unwrap_err();
        assert_eq!(err, AccountError::WrongCredential);
    }

    let err = closer
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(err, AccountError::RateLimited);
    assert!(!err.keeps_action_pending());
    assert_eq!(fx.store.mutation_count(), 0);
}

#[tokio::test]
async fn auth_outage_aborts_without_mutation() {
    let fx = Fixture::new();
    fx.seed_owner();
    fx.auth.set_unavailable(true);

    let err = fx
        .closer()
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap_err();

    assert!(matches!(err, AccountError::ReauthUnavailable { .. }));
    assert_eq!(fx.store.mutation_count(), 0);
}

#[tokio::test]
async fn proof_for_another_principal_is_rejected() {
    let fx = Fixture::new();
    fx.seed_owner();

    let gate = CredentialReauthGate::new(fx.auth.clone());
    let proof = gate
        .reauthenticate(&principal("u5"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    let orchestrator = DeletionOrchestrator::new(fx.store.clone(), fx.blobs.clone(), fx.auth.clone());
    let err = orchestrator.delete_account(&principal("u1"), proof).await.unwrap_err();

    assert!(matches!(err, AccountError::ProofRejected { .. }));
    assert_eq!(fx.store.mutation_count(), 0);
}

/// Accepts every credential; forgets the principal on first delete.
#[derive(Default)]
struct PermissiveAuth {
    deleted: AtomicBool,
}

#[async_trait]
impl AuthService for PermissiveAuth {
    async fn reauthenticate(&self, _principal: &Principal, _secret: &Secret) -> Result<(), AuthServiceError> {
        Ok(())
    }

    async fn delete_principal(&self, _principal: &PrincipalId) -> Result<(), AuthServiceError> {
        if self.deleted.swap(true, Ordering::SeqCst) {
            Err(AuthServiceError::NotFound)
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn second_run_is_a_clean_no_op() {
    let fx = Fixture::new();
    fx.seed_owner();
    let closer = AccountCloser::new(fx.store.clone(), fx.blobs.clone(), Arc::new(PermissiveAuth::default()));

    let first = closer.delete_account(&principal("u1"), &Secret::new("x")).await.unwrap();
    assert!(first.is_complete());
    let mutations = fx.store.mutation_count();
    let remaining = fx.store.collection_names();

    let second = closer.delete_account(&principal("u1"), &Secret::new("x")).await.unwrap();
    assert!(second.is_complete());
    assert_eq!(second.total_deleted(), 0);
    assert_eq!(second.principal, Outcome::Success { deleted: 0 });
    assert_eq!(fx.store.mutation_count(), mutations);
    assert_eq!(fx.store.collection_names(), remaining);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn widened_search_catches_documents_under_alias_fields() {
    let fx = Fixture::new();
    fx.seed_owner();
    // Written by an older client that used a different ownership field.
    fx.store.insert(global("products"), owned("p3", "creatorId", "u1"));
    fx.store.insert(scoped("shopa", "orders"), owned("o2", "ownerId", "u1"));

    let result = fx
        .closer()
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    assert!(!fx.store.contains(&global("products"), &did("p3")));
    assert_eq!(result.outcome(Phase::WidenedSearch, "products").map(Outcome::deleted), Some(1));
    assert!(result.verification.is_clean());
}

#[tokio::test]
async fn verification_deletes_and_reports_what_queries_missed() {
    let fx = Fixture::new();
    fx.seed_owner();
    fx.store.inject(global("sliders"), Fault::UnindexedField("creatorId".into()));

    let result = fx
        .closer()
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    assert!(!result.is_complete());
    assert_eq!(result.verification.documents_still_found, 1);
    assert_eq!(result.verification.per_target.get("sliders"), Some(&1));
    assert_eq!(
        result.verification.anomalies,
        vec![AccountError::VerificationAnomaly {
            collection: "sliders".into(),
            id: "s1".into(),
        }]
    );
    // The anomaly was cleaned up by the verification pass itself.
    assert!(!fx.store.contains(&global("sliders"), &did("s1")));
    assert_eq!(result.outcome(Phase::Verification, "sliders").map(Outcome::deleted), Some(1));
}

#[tokio::test]
async fn failures_are_recorded_and_the_run_continues() {
    let fx = Fixture::new();
    fx.seed_owner();
    fx.store.inject(global("categories"), Fault::FailDeletes);
    fx.blobs.fail_deletes_under("avatars/u1/");

    let result = fx
        .closer()
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    assert!(!result.is_complete());
    let categories = result.outcome(Phase::GlobalFieldSearch, "categories").unwrap();
    assert!(categories.is_failed());
    assert!(matches!(
        categories.errors()[0],
        AccountError::CollectionDeleteFailed { ref id, .. } if id == "c1"
    ));
    assert!(result.outcome(Phase::Blobs, "avatars/u1/").unwrap().is_failed());

    // Everything else still went.
    assert!(!fx.store.contains(&global("products"), &did("p1")));
    assert!(!fx.store.contains(&global("teams"), &did("t1")));
    assert_eq!(fx.store.count(&scoped("shopa", "orders")), 0);

    assert!(fx.store.contains(&global("categories"), &did("c1")));
    assert_eq!(result.verification.per_target.get("categories"), Some(&1));
    assert_eq!(result.verification.blobs_still_found, 1);
    assert!(
        result
            .errors()
            .any(|e| matches!(e, AccountError::BlobDeleteFailed { path, .. } if path == "avatars/u1/me.png"))
    );

    // The login stays so the user can finish the job later.
    assert!(fx.auth.exists(&pid("u1")));
    assert!(matches!(result.principal, Outcome::Skipped { .. }));
}

#[tokio::test]
async fn stalled_collection_times_out_instead_of_hanging() {
    let fx = Fixture::new();
    fx.seed_owner();
    fx.store.inject(global("teams"), Fault::Stall);

    let closer = fx
        .closer()
        .with_config(OrchestratorConfig::default().with_call_timeout(Duration::from_millis(100)));

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        closer.delete_account(&principal("u1"), &Secret::new(PASSWORD)),
    )
    .await
    .expect("deletion must not hang")
    .unwrap();

    let teams = result.outcome(Phase::GlobalFieldSearch, "teams").unwrap();
    assert!(matches!(
        &teams.errors()[0],
        AccountError::LookupUnavailable { reason, .. } if reason.contains("timed out")
    ));
    assert!(result.verification.unscanned.contains(&"teams".to_string()));
    assert!(!fx.store.contains(&global("products"), &did("p1")));
}

#[tokio::test]
async fn member_deletion_only_removes_own_rows_in_the_tenant() {
    let fx = Fixture::new();
    fx.seed_owner();
    fx.store
        .insert(global("siteUserIndex"), Document::new(did("u5")).with_field("siteName", "shopa"));
    fx.store.insert(scoped("shopa", "users"), Document::new(did("u5")));
    fx.store.insert(scoped("shopa", "orders"), owned("o5", "userId", "u5"));
    fx.store.insert(scoped("shopa", "carts"), owned("k5", "userId", "u5"));

    let result = fx
        .closer()
        .delete_account(&principal("u5"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(result.tenants.len(), 1);
    assert_eq!(result.tenants[0].relation, TenantRelation::Member);

    assert!(!fx.store.contains(&global("siteUserIndex"), &did("u5")));
    assert!(!fx.store.contains(&scoped("shopa", "users"), &did("u5")));
    assert!(!fx.store.contains(&scoped("shopa", "orders"), &did("o5")));
    assert!(!fx.store.contains(&scoped("shopa", "carts"), &did("k5")));

    // The storefront and its other customers stay.
    assert!(fx.store.contains(&scoped("shopa", "users"), &did("u9")));
    assert!(fx.store.contains(&scoped("shopa", "orders"), &did("o1")));
    assert!(fx.store.contains(&global("siteData"), &did("u1")));
    assert!(fx.auth.exists(&pid("u1")));
}

#[tokio::test]
async fn principal_without_tenant_skips_tenant_rules() {
    let fx = Fixture::new();
    fx.store.insert(global("reviews"), owned("r1", "userId", "u1"));

    let result = fx
        .closer()
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    assert!(result.tenants.is_empty());
    assert!(matches!(
        result.outcome(Phase::TenantScoped, "*_users"),
        Some(Outcome::Skipped { .. })
    ));
    assert!(!fx.store.contains(&global("reviews"), &did("r1")));
    assert!(result.is_complete());
}

#[tokio::test]
async fn unreadable_site_pointer_keeps_the_tenant_reachable() {
    let fx = Fixture::new();
    fx.seed_owner();
    fx.store.inject(global("siteData"), Fault::FailReads);
    let closer = fx.closer();

    let first = closer
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    // The tenant is unknown, so its collections are left alone and the
    // failed lookup is on record.
    assert!(first.tenants.is_empty());
    assert!(first.outcome(Phase::TenantDiscovery, "siteData").unwrap().is_failed());
    assert!(matches!(
        first.outcome(Phase::TenantPointers, "siteData"),
        Some(Outcome::Skipped { .. })
    ));
    assert!(!first.is_complete());
    assert!(fx.store.contains(&scoped("shopa", "orders"), &did("o1")));
    assert!(fx.store.contains(&global("siteData"), &did("u1")));
    assert!(fx.auth.exists(&pid("u1")));
    assert!(matches!(first.principal, Outcome::Skipped { .. }));

    fx.store.clear_faults();
    let second = closer
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    assert!(second.is_complete(), "unexpected errors: {:?}", second.errors().collect::<Vec<_>>());
    assert_eq!(second.tenants[0].tenant, tenant("shopa"));
    assert_eq!(fx.store.count(&scoped("shopa", "orders")), 0);
    assert!(!fx.store.contains(&global("siteData"), &did("u1")));
    assert!(fx.store.contains(&scoped("shopb", "orders"), &did("o1")));
    assert!(!fx.auth.exists(&pid("u1")));
}

#[tokio::test]
async fn failed_tenant_delete_is_finished_by_a_repeated_run() {
    let fx = Fixture::new();
    fx.seed_owner();
    fx.store.inject(scoped("shopa", "orders"), Fault::FailDeletes);
    let closer = fx.closer();

    let first = closer
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    assert!(!first.is_complete());
    assert!(first.outcome(Phase::TenantScoped, "shopa_orders").unwrap().is_failed());
    assert_eq!(first.verification.per_target.get("shopa_orders"), Some(&1));
    // Other tenant collections still went.
    assert_eq!(fx.store.count(&scoped("shopa", "carts")), 0);
    // Pointer and login survive, so the orders can still be found.
    assert!(fx.store.contains(&global("siteData"), &did("u1")));
    assert!(fx.auth.exists(&pid("u1")));
    assert!(matches!(first.principal, Outcome::Skipped { .. }));

    fx.store.clear_faults();
    let second = closer
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    assert!(second.is_complete(), "unexpected errors: {:?}", second.errors().collect::<Vec<_>>());
    assert_eq!(second.outcome(Phase::TenantScoped, "shopa_orders").map(Outcome::deleted), Some(1));
    assert_eq!(fx.store.count(&scoped("shopa", "orders")), 0);
    assert!(!fx.store.contains(&global("siteData"), &did("u1")));
    assert!(!fx.auth.exists(&pid("u1")));
    assert_eq!(second.principal, Outcome::Success { deleted: 1 });
}

#[tokio::test]
async fn site_pointer_without_tenant_name_is_a_lookup_failure() {
    let fx = Fixture::new();
    fx.seed_owner();
    fx.store
        .insert(global("siteData"), Document::new(did("u1")).with_field("theme", "dark"));

    let result = fx
        .closer()
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    let discovery = result.outcome(Phase::TenantDiscovery, "siteData").unwrap();
    assert!(matches!(
        &discovery.errors()[0],
        AccountError::LookupUnavailable { reason, .. } if reason.contains("missing siteName")
    ));
    assert!(result.tenants.is_empty());
    assert!(fx.store.contains(&global("siteData"), &did("u1")));
    assert!(fx.store.contains(&scoped("shopa", "orders"), &did("o1")));
    assert!(fx.auth.exists(&pid("u1")));
    assert!(!result.is_complete());
}

#[tokio::test]
async fn result_is_serializable_audit_evidence() {
    let fx = Fixture::new();
    fx.seed_owner();

    let result = fx
        .closer()
        .delete_account(&principal("u1"), &Secret::new(PASSWORD))
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["principal_id"], "u1");
    assert_eq!(json["plan_version"], 3);
    assert_eq!(json["tenants"][0]["relation"], "owner");
    assert_eq!(json["phases"][0]["phase"], "global_direct");
    assert_eq!(json["principal"]["status"], "success");
}
