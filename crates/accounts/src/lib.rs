//! `siteforge-accounts` — cascading account deletion.
//!
//! The store has no foreign keys and no multi-document transactions, and
//! writers never agreed on one ownership field name. Deletion therefore runs a
//! static plan of ownership rules, phase by phase and best-effort, and then
//! re-scans everything it touched to prove (or disprove) completeness.
//!
//! ## Components
//!
//! - `DeletionPlanner`: the versioned rule table
//! - `DeletionOrchestrator`: runs the phases and the verification pass
//! - `AccountCloser`: re-authentication chained with orchestration
//! - `DeletionResult`: immutable audit artifact of one run

pub mod closer;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod result;

pub use closer::AccountCloser;
pub use error::AccountError;
pub use orchestrator::{DeletionOrchestrator, OrchestratorConfig};
pub use plan::{BlobPrefixTemplate, DeletionPlan, DeletionPlanner, MatchKind, OwnershipRule, Scope};
pub use result::{DeletionResult, Outcome, Phase, PhaseReport, TenantBinding, TenantRelation, VerificationReport};
