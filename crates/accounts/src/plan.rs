//! The deletion plan: which collections a principal can own data in, and how
//! ownership is expressed in each.
//!
//! This is a static, versioned table. Adding a collection to the storefront
//! builder means adding a rule here; the orchestrator and the tests enumerate
//! the table instead of hand-writing one block per collection.

use serde::Serialize;

use siteforge_core::PrincipalId;
use siteforge_core::layout::{ADMIN_PROFILES, SITE_DATA, SITE_NAME_FIELD, SITE_USER_INDEX, TENANT_USERS};

/// Bump when rules are added, removed or reordered.
pub const PLAN_VERSION: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// One collection shared by all tenants.
    Global,
    /// One collection per tenant, named `"{tenant}_{collection}"`.
    TenantScoped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum MatchKind {
    /// The document id is the principal id.
    ByDocumentId,
    /// The named field holds the principal id.
    ByField(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OwnershipRule {
    pub collection: &'static str,
    pub scope: Scope,
    pub match_kind: MatchKind,
}

impl OwnershipRule {
    pub const fn global_by_id(collection: &'static str) -> Self {
        Self {
            collection,
            scope: Scope::Global,
            match_kind: MatchKind::ByDocumentId,
        }
    }

    pub const fn global_by_field(collection: &'static str, field: &'static str) -> Self {
        Self {
            collection,
            scope: Scope::Global,
            match_kind: MatchKind::ByField(field),
        }
    }

    pub const fn tenant_by_id(collection: &'static str) -> Self {
        Self {
            collection,
            scope: Scope::TenantScoped,
            match_kind: MatchKind::ByDocumentId,
        }
    }

    pub const fn tenant_by_field(collection: &'static str, field: &'static str) -> Self {
        Self {
            collection,
            scope: Scope::TenantScoped,
            match_kind: MatchKind::ByField(field),
        }
    }
}

/// Storage path template; `{id}` is replaced by the principal id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BlobPrefixTemplate(pub &'static str);

impl BlobPrefixTemplate {
    pub fn render(&self, principal: &PrincipalId) -> String {
        self.0.replace("{id}", principal.as_str())
    }
}

/// Field names different writers used for "this principal owns the document".
pub const OWNERSHIP_ALIASES: &[&str] = &["ownerId", "creatorId", "authorId", "managerId", "userId"];

const RULES: &[OwnershipRule] = &[
    // Global, keyed by principal id.
    OwnershipRule::global_by_id(SITE_DATA),
    OwnershipRule::global_by_id(ADMIN_PROFILES),
    OwnershipRule::global_by_id(SITE_USER_INDEX),
    // Global, owner stored in a field.
    OwnershipRule::global_by_field("products", "ownerId"),
    OwnershipRule::global_by_field("categories", "ownerId"),
    OwnershipRule::global_by_field("sliders", "creatorId"),
    OwnershipRule::global_by_field("blogPosts", "authorId"),
    OwnershipRule::global_by_field("teams", "managerId"),
    OwnershipRule::global_by_field("reviews", "userId"),
    // Per tenant; resolved last because the tenant name comes from `siteData`.
    OwnershipRule::tenant_by_id(TENANT_USERS),
    OwnershipRule::tenant_by_field("carts", "userId"),
    OwnershipRule::tenant_by_field("orders", "userId"),
];

const BLOB_PREFIXES: &[BlobPrefixTemplate] = &[
    BlobPrefixTemplate("sliders/{id}/"),
    BlobPrefixTemplate("products/{id}/"),
    BlobPrefixTemplate("avatars/{id}/"),
    BlobPrefixTemplate("sites/{id}/"),
];

/// Where the tenant name of a principal is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TenantPointer {
    pub collection: &'static str,
    pub field: &'static str,
}

/// Ordered ownership rules plus everything needed to resolve them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionPlan {
    pub version: u32,
    pub rules: &'static [OwnershipRule],
    pub blob_prefixes: &'static [BlobPrefixTemplate],
    pub aliases: &'static [&'static str],
    /// Global document naming the tenant the principal owns.
    pub owned_site: TenantPointer,
    /// Global document naming the tenant whose user table holds the principal.
    pub member_site: TenantPointer,
}

impl DeletionPlan {
    pub fn global_direct(&self) -> impl Iterator<Item = &OwnershipRule> {
        self.rules
            .iter()
            .filter(|r| r.scope == Scope::Global && r.match_kind == MatchKind::ByDocumentId)
    }

    pub fn global_by_field(&self) -> impl Iterator<Item = (&OwnershipRule, &'static str)> {
        self.rules.iter().filter_map(|r| match (r.scope, r.match_kind) {
            (Scope::Global, MatchKind::ByField(field)) => Some((r, field)),
            _ => None,
        })
    }

    pub fn tenant_scoped(&self) -> impl Iterator<Item = &OwnershipRule> {
        self.rules.iter().filter(|r| r.scope == Scope::TenantScoped)
    }

    /// Distinct global collection names, in plan order.
    pub fn global_collections(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for rule in self.rules.iter().filter(|r| r.scope == Scope::Global) {
            if !out.contains(&rule.collection) {
                out.push(rule.collection);
            }
        }
        out
    }

    /// Every field that may hold an owner id: the aliases plus each field the
    /// rules name, deduplicated, aliases first.
    pub fn alias_fields(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = self.aliases.to_vec();
        for rule in self.rules {
            if let MatchKind::ByField(field) = rule.match_kind {
                if !out.contains(&field) {
                    out.push(field);
                }
            }
        }
        out
    }

    pub fn blob_prefixes_for(&self, principal: &PrincipalId) -> Vec<String> {
        self.blob_prefixes.iter().map(|t| t.render(principal)).collect()
    }
}

/// Produces the static plan.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeletionPlanner;

impl DeletionPlanner {
    pub fn plan() -> DeletionPlan {
        DeletionPlan {
            version: PLAN_VERSION,
            rules: RULES,
            blob_prefixes: BLOB_PREFIXES,
            aliases: OWNERSHIP_ALIASES,
            owned_site: TenantPointer {
                collection: SITE_DATA,
                field: SITE_NAME_FIELD,
            },
            member_site: TenantPointer {
                collection: SITE_USER_INDEX,
                field: SITE_NAME_FIELD,
            },
        }
    }
}
