//! # Tallybook - Entity Identity & Merge Resolution
//!
//! Tallybook's data layer lets two records created independently (say, by AI
//! extraction from different receipts) be declared "the same real-world
//! entity" later, without deleting history, rewriting foreign keys on
//! existing documents, or blocking concurrent writers.
//!
//! ## Core Concepts
//!
//! - **Entity row**: one record in a family (account, customer, supplier,
//!   SKU, warehouse, location), identified forever by its [`EntityId`]
//! - **Merge forest**: the `merged_into` pointers of one scope, resolved
//!   fresh per call to map any id to its canonical root
//! - **Find-or-create**: idempotent-intent ingestion resolution with
//!   race-safe creation under the store's unique constraint
//! - **Name conflict**: a structured payload carrying everything the UI
//!   needs to offer keep-separate / rename-anyway / merge-into-target
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tallybook::{
//!     ConflictMode, Family, IdentityEngine, InMemoryRowStore, Observation,
//!     RequestContext, TenantId, UserId,
//! };
//!
//! let store = Arc::new(InMemoryRowStore::new());
//! let engine = IdentityEngine::new(store.clone(), store);
//! let ctx = RequestContext::new(UserId::new(), TenantId::new());
//!
//! // Ingestion resolves or creates; later merges are reflected at read time.
//! let supplier =
//!     engine.find_or_create(&ctx, Family::Supplier, "Walmart", &Observation::none())?;
//! let canonical = engine.resolve_id(&ctx, Family::Supplier, supplier.id)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod conflict;
pub mod context;
pub mod engine;
pub mod error;
pub mod family;
pub mod forest;
pub mod normalize;
pub mod record;
pub mod store;

// Re-export primary types at crate root for convenience
pub use conflict::{ConflictMode, EntityRef, NameConflict, NAME_EXISTS};
pub use context::{CurrentUser, RequestContext, Session, TenantId, UserId};
pub use engine::{
    AttachOutcome, CreateOutcome, EngineConfig, EntityUsage, IdentityEngine, MergeFailure,
    MergeReport, RenameOutcome,
};
pub use error::{TallyError, TallyResult, ValidationError};
pub use family::{Family, FamilyDescriptor, SecondaryKey};
pub use forest::MergeForest;
pub use record::{EntityId, EntityPatch, EntityRow, Observation};
pub use store::{
    DocumentId, DocumentKind, DocumentRef, DocumentRows, EntityRows, InMemoryRowStore, StoreError,
};
