//! Realm-based permission classification.
//!
//! A principal is classified as exactly one of: unauthenticated, platform
//! admin, or a specific tenant's site user. The classification is a closed
//! state machine driven by the membership evidence gathered for one
//! evaluation:
//!
//! ```text
//! Unauthenticated ──(principal present)──▶ { Admin, TenantUser, Denied }
//! ```
//!
//! `Admin` is only reachable when the membership evidence says the principal
//! is *not* a site user (or the directory cannot tell). Any tenant membership
//! or lookup failure ends in `TenantUser` or `Denied`, never in `Admin`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use siteforge_core::TenantName;

use crate::{AdminPolicy, LookupError, MembershipDirectory, MembershipProbe, Principal, Realm};

/// Role a principal was classified into for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Unauthenticated,
    Admin,
    TenantUser,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Granted,
    NotLoggedIn,
    NotSiteUser,
    NotAdmin,
    LookupUnavailable,
}

/// Result of one classification. Never persisted or cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub can_access: bool,
    pub role: Role,
    pub reason: DecisionReason,
}

/// Membership evidence gathered for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Evidence {
    Member(TenantName),
    NotMember,
    Unknowable,
    Unavailable,
}

/// Terminal states of the classification machine.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Classification {
    Unauthenticated,
    Admin,
    TenantUser(TenantName),
    Denied { role: Role, reason: DecisionReason },
}

impl Classification {
    fn transition(realm: &Realm, admin_eligible: bool, evidence: Evidence) -> Self {
        match (realm, evidence) {
            (Realm::UnknownTenant(_), _) => Self::Denied {
                role: Role::Unknown,
                reason: DecisionReason::NotSiteUser,
            },

            (_, Evidence::Unavailable) => Self::Denied {
                role: Role::Unknown,
                reason: DecisionReason::LookupUnavailable,
            },

            (Realm::Tenant(tenant), Evidence::Member(found)) if &found == tenant => Self::TenantUser(found),
            (Realm::Tenant(_), _) => Self::Denied {
                role: Role::Unknown,
                reason: DecisionReason::NotSiteUser,
            },

            (Realm::AdminArea, Evidence::Member(_)) => Self::Denied {
                role: Role::TenantUser,
                reason: DecisionReason::NotAdmin,
            },
            (Realm::AdminArea, Evidence::NotMember | Evidence::Unknowable) if admin_eligible => Self::Admin,
            (Realm::AdminArea, Evidence::NotMember | Evidence::Unknowable) => Self::Denied {
                role: Role::Unknown,
                reason: DecisionReason::NotAdmin,
            },
        }
    }

    fn into_decision(self) -> PermissionDecision {
        let (can_access, role, reason) = match self {
            Self::Unauthenticated => (false, Role::Unauthenticated, DecisionReason::NotLoggedIn),
            Self::Admin => (true, Role::Admin, DecisionReason::Granted),
            Self::TenantUser(_) => (true, Role::TenantUser, DecisionReason::Granted),
            Self::Denied { role, reason } => (false, role, reason),
        };
        PermissionDecision {
            can_access,
            role,
            reason,
        }
    }
}

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Decides whether a principal may use the realm implied by the current path.
pub struct PermissionClassifier<D> {
    policy: AdminPolicy,
    directory: D,
    lookup_timeout: Duration,
}

impl<D: MembershipDirectory> PermissionClassifier<D> {
    pub fn new(policy: AdminPolicy, directory: D) -> Self {
        Self {
            policy,
            directory,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &AdminPolicy {
        &self.policy
    }

    /// Classify `principal` against `realm`.
    ///
    /// - Recomputed on every call (roster and allow-list may change).
    /// - Lookup failures and timeouts deny access; they never admit as admin.
    pub async fn classify(&self, principal: Option<&Principal>, realm: &Realm) -> PermissionDecision {
        let Some(principal) = principal else {
            return Classification::Unauthenticated.into_decision();
        };

        let admin_eligible = self.policy.is_eligible(principal);
        let evidence = self.gather(principal, realm).await;
        let classification = Classification::transition(realm, admin_eligible, evidence);
        let decision = classification.into_decision();

        debug!(
            principal_id = %principal.id,
            realm = ?realm,
            admin_eligible,
            can_access = decision.can_access,
            role = ?decision.role,
            reason = ?decision.reason,
            "classified principal"
        );

        decision
    }

    async fn gather(&self, principal: &Principal, realm: &Realm) -> Evidence {
        let looked_up = match realm {
            Realm::Tenant(tenant) => self
                .with_timeout(self.directory.is_member(tenant, &principal.id))
                .await
                .map(|member| {
                    if member {
                        MembershipProbe::Member(tenant.clone())
                    } else {
                        MembershipProbe::NotMember
                    }
                }),
            Realm::AdminArea => self.with_timeout(self.directory.tenant_of(&principal.id)).await,
            // No tenant has this name, so nobody is a member.
            Realm::UnknownTenant(_) => Ok(MembershipProbe::NotMember),
        };

        match looked_up {
            Ok(MembershipProbe::Member(t)) => Evidence::Member(t),
            Ok(MembershipProbe::NotMember) => Evidence::NotMember,
            Ok(MembershipProbe::Unknowable) => Evidence::Unknowable,
            Err(e) => {
                debug!(principal_id = %principal.id, error = %e, "membership lookup failed; denying");
                Evidence::Unavailable
            }
        }
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, LookupError>>,
    ) -> Result<T, LookupError> {
        tokio::time::timeout(self.lookup_timeout, fut)
            .await
            .unwrap_or(Err(LookupError::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use proptest::prelude::*;

    use siteforge_core::PrincipalId;

    use super::*;

    #[derive(Default)]
    struct FakeDirectory {
        members: HashMap<PrincipalId, TenantName>,
        cross_tenant_unknowable: bool,
        broken: bool,
        hang: bool,
    }

    #[async_trait]
    impl MembershipDirectory for FakeDirectory {
        async fn is_member(&self, tenant: &TenantName, principal: &PrincipalId) -> Result<bool, LookupError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.broken {
                return Err(LookupError::Unavailable("store down".into()));
            }
            Ok(self.members.get(principal) == Some(tenant))
        }

        async fn tenant_of(&self, principal: &PrincipalId) -> Result<MembershipProbe, LookupError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.broken {
                return Err(LookupError::Unavailable("store down".into()));
            }
            if self.cross_tenant_unknowable {
                return Ok(MembershipProbe::Unknowable);
            }
            Ok(match self.members.get(principal) {
                Some(t) => MembershipProbe::Member(t.clone()),
                None => MembershipProbe::NotMember,
            })
        }
    }

    fn tenant(name: &str) -> TenantName {
        TenantName::new(name).unwrap()
    }

    fn principal(id: &str, email: &str) -> Principal {
        Principal::new(PrincipalId::new(id).unwrap(), email)
    }

    fn admin_policy() -> AdminPolicy {
        AdminPolicy::new().with_domain("siteforge.dev")
    }

    fn directory_with(id: &str, t: &str) -> FakeDirectory {
        let mut dir = FakeDirectory::default();
        dir.members.insert(PrincipalId::new(id).unwrap(), tenant(t));
        dir
    }

    #[tokio::test]
    async fn absent_principal_is_not_logged_in() {
        let c = PermissionClassifier::new(admin_policy(), FakeDirectory::default());
        let d = c.classify(None, &Realm::AdminArea).await;
        assert_eq!(
            d,
            PermissionDecision {
                can_access: false,
                role: Role::Unauthenticated,
                reason: DecisionReason::NotLoggedIn
            }
        );
    }

    #[tokio::test]
    async fn site_user_of_the_tenant_is_granted() {
        let c = PermissionClassifier::new(admin_policy(), directory_with("s1", "acme"));
        let d = c
            .classify(Some(&principal("s1", "shopper@mail.com")), &Realm::Tenant(tenant("acme")))
            .await;
        assert!(d.can_access);
        assert_eq!(d.role, Role::TenantUser);
        assert_eq!(d.reason, DecisionReason::Granted);
    }

    #[tokio::test]
    async fn site_user_of_another_tenant_is_not_site_user() {
        let c = PermissionClassifier::new(admin_policy(), directory_with("s1", "acme"));
        let d = c
            .classify(Some(&principal("s1", "shopper@mail.com")), &Realm::Tenant(tenant("globex")))
            .await;
        assert!(!d.can_access);
        assert_eq!(d.reason, DecisionReason::NotSiteUser);
    }

    #[tokio::test]
    async fn eligible_admin_is_granted_admin_area() {
        let c = PermissionClassifier::new(admin_policy(), FakeDirectory::default());
        let d = c
            .classify(Some(&principal("a1", "ops@siteforge.dev")), &Realm::AdminArea)
            .await;
        assert_eq!(d.role, Role::Admin);
        assert!(d.can_access);
    }

    #[tokio::test]
    async fn non_allow_listed_email_is_not_admin() {
        let c = PermissionClassifier::new(admin_policy(), FakeDirectory::default());
        let d = c
            .classify(Some(&principal("a1", "someone@gmail.com")), &Realm::AdminArea)
            .await;
        assert!(!d.can_access);
        assert_eq!(d.reason, DecisionReason::NotAdmin);
        assert_eq!(d.role, Role::Unknown);
    }

    #[tokio::test]
    async fn site_user_with_admin_email_is_refused_admin_area() {
        let c = PermissionClassifier::new(admin_policy(), directory_with("s1", "acme"));
        let d = c
            .classify(Some(&principal("s1", "ops@siteforge.dev")), &Realm::AdminArea)
            .await;
        assert_eq!(
            d,
            PermissionDecision {
                can_access: false,
                role: Role::TenantUser,
                reason: DecisionReason::NotAdmin
            }
        );
    }

    #[tokio::test]
    async fn unknowable_cross_tenant_membership_falls_back_to_policy() {
        let mut dir = directory_with("s1", "acme");
        dir.cross_tenant_unknowable = true;
        let c = PermissionClassifier::new(admin_policy(), dir);
        let d = c
            .classify(Some(&principal("a1", "ops@siteforge.dev")), &Realm::AdminArea)
            .await;
        assert_eq!(d.role, Role::Admin);
    }

    #[tokio::test]
    async fn unknown_tenant_denies_admins_and_site_users() {
        let c = PermissionClassifier::new(admin_policy(), directory_with("s1", "acme"));
        let realm = Realm::UnknownTenant("Acme".into());

        for p in [principal("a1", "ops@siteforge.dev"), principal("s1", "shopper@mail.com")] {
            let d = c.classify(Some(&p), &realm).await;
            assert_eq!(
                d,
                PermissionDecision {
                    can_access: false,
                    role: Role::Unknown,
                    reason: DecisionReason::NotSiteUser
                }
            );
        }
    }

    #[tokio::test]
    async fn lookup_failure_fails_closed_in_both_realms() {
        let dir = FakeDirectory {
            broken: true,
            ..Default::default()
        };
        let c = PermissionClassifier::new(admin_policy(), dir);
        let p = principal("a1", "ops@siteforge.dev");

        for realm in [Realm::AdminArea, Realm::Tenant(tenant("acme"))] {
            let d = c.classify(Some(&p), &realm).await;
            assert!(!d.can_access);
            assert_ne!(d.role, Role::Admin);
            assert_eq!(d.reason, DecisionReason::LookupUnavailable);
        }
    }

    #[tokio::test]
    async fn hanging_lookup_times_out_closed() {
        let dir = FakeDirectory {
            hang: true,
            ..Default::default()
        };
        let c = PermissionClassifier::new(admin_policy(), dir).with_lookup_timeout(Duration::from_millis(50));
        let d = c
            .classify(Some(&principal("a1", "ops@siteforge.dev")), &Realm::AdminArea)
            .await;
        assert!(!d.can_access);
        assert_eq!(d.reason, DecisionReason::LookupUnavailable);
    }

    fn evidence() -> impl Strategy<Value = Evidence> {
        prop_oneof![
            "[a-c]".prop_map(|t| Evidence::Member(tenant(&t))),
            Just(Evidence::NotMember),
            Just(Evidence::Unknowable),
            Just(Evidence::Unavailable),
        ]
    }

    fn realm() -> impl Strategy<Value = Realm> {
        prop_oneof![
            Just(Realm::AdminArea),
            "[a-c]".prop_map(|t| Realm::Tenant(tenant(&t))),
            "[A-C_]{1,3}".prop_map(Realm::UnknownTenant),
        ]
    }

    proptest! {
        #[test]
        fn admin_requires_no_membership_and_no_failure(realm in realm(), eligible in any::<bool>(), ev in evidence()) {
            let decision = Classification::transition(&realm, eligible, ev.clone()).into_decision();
            if decision.role == Role::Admin {
                prop_assert!(eligible);
                prop_assert_eq!(realm, Realm::AdminArea);
                prop_assert!(matches!(ev, Evidence::NotMember | Evidence::Unknowable));
            }
        }

        #[test]
        fn members_never_enter_the_admin_area(eligible in any::<bool>(), t in "[a-c]") {
            let decision = Classification::transition(&Realm::AdminArea, eligible, Evidence::Member(tenant(&t))).into_decision();
            prop_assert!(!decision.can_access);
            prop_assert_eq!(decision.reason, DecisionReason::NotAdmin);
        }

        #[test]
        fn access_implies_granted_reason(realm in realm(), eligible in any::<bool>(), ev in evidence()) {
            let decision = Classification::transition(&realm, eligible, ev).into_decision();
            prop_assert_eq!(decision.can_access, decision.reason == DecisionReason::Granted);
        }
    }
}
