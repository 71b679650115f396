//! Phlebo Core
//!
//! Domain types for the field-staff dispatch engine of a home-collection
//! lab-test marketplace. An order paid by a patient carries a geocoded
//! collection point; a field technician must be found and atomically
//! claimed to service it.
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────┐
//! │  ORDER   │───>│  STRATEGY    │───>│  TECHNICIAN  │
//! │  (paid)  │    │  CASCADE     │    │  (claimed)   │
//! └──────────┘    └──────┬───────┘    └──────────────┘
//!                        │ exhausted
//!                        v
//!                 ┌──────────────┐
//!                 │  MANUAL      │
//!                 │  ASSIGNMENT  │
//!                 └──────────────┘
//! ```
//!
//! This crate holds only data and invariant helpers. The moving parts
//! live in `phlebo-registry` (atomic claims), `phlebo-geo` (spatial
//! queries) and `phlebo-engine` (the cascade itself).

pub mod geo;
pub mod order;
pub mod staff;

pub use geo::{rounded_km, GeoPoint};
pub use order::{AssignedStaff, Incentive, Order, OrderStatus, StrategyKind};
pub use staff::{AssignmentRecord, AssignmentRecordStatus, Technician, DEFAULT_MAX_ASSIGNMENTS};

use thiserror::Error;

/// Errors surfaced across the dispatch core.
///
/// Soft misses (no candidate found, claim lost to a concurrent order) are
/// NOT errors; they are modeled as ordinary return values and handled by
/// falling through the cascade.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("order has no resolved collection location")]
    MissingLocation,

    #[error("order not found: {0}")]
    OrderNotFound(uuid::Uuid),

    #[error("staff not found: {0}")]
    StaffNotFound(uuid::Uuid),

    #[error("order not assignable in status {status}")]
    NotAssignable { status: OrderStatus },

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("assignment deadline exceeded after {secs}s")]
    Timeout { secs: u64 },

    /// Manual-assign path only: the operator picked a technician whose
    /// claim gate rejected the order.
    #[error("claim rejected: {reason}")]
    ClaimRejected { reason: String },
}

pub type Result<T> = std::result::Result<T, DispatchError>;
