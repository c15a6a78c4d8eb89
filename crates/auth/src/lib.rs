//! `siteforge-auth` — realm resolution, classification and re-authentication.
//!
//! This crate is intentionally decoupled from HTTP and storage: collaborators
//! (membership lookups, the authentication provider) are traits.

pub mod authorize;
pub mod claims;
pub mod membership;
pub mod policy;
pub mod principal;
pub mod reauth;
pub mod tenant;

pub use authorize::{DecisionReason, PermissionClassifier, PermissionDecision, Role};
pub use claims::{Hs256SessionValidator, SessionClaims, SessionValidator, TokenValidationError, validate_claims};
pub use membership::{LookupError, MembershipDirectory, MembershipProbe};
pub use policy::AdminPolicy;
pub use principal::Principal;
pub use reauth::{
    AuthService, AuthServiceError, CredentialReauthGate, DeletionProof, ProofError, ReauthError, Secret,
};
pub use tenant::{Realm, TenantResolver};
