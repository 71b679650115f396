//! Phlebo Assignment Engine
//!
//! Orchestrates the cascade that turns a paid order into a committed
//! technician assignment, or an explicit manual-assignment escalation.
//! No order ever ends in between.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ASSIGNMENT ENGINE                         │
//! │                                                             │
//! │  order ──> ┌─────────┐  ┌──────────┐  ┌───────────┐        │
//! │   paid     │ NEARBY  │─>│ EXTENDED │─>│ CITY-WIDE │──┐     │
//! │            │ 0–10 km │  │ 10–25 km │  │ unbounded │  │     │
//! │            └────┬────┘  └────┬─────┘  └─────┬─────┘  │     │
//! │                 │            │              │        v     │
//! │              claim        claim          claim  ┌─────────┐│
//! │            (atomic)     (+₹/km)       (premium) │LEAST-BUSY││
//! │                                                 │(overtime)││
//! │                                                 └────┬────┘│
//! │                                     exhausted ──────>│     │
//! │                                                      v     │
//! │                                              ┌────────────┐│
//! │                                              │ ESCALATION ││
//! │                                              │ (operator) ││
//! │                                              └────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tiers are pure candidate finders over one `Strategy` shape;
//! commitment happens only through the registry's atomic claim, and a
//! lost claim race falls through to the next candidate, never aborts.

pub mod engine;
pub mod escalation;
pub mod outcome;
pub mod strategy;

pub use engine::AssignmentEngine;
pub use escalation::EscalationHandler;
pub use outcome::{AssignmentAttempt, AssignmentDecision, AssignmentOutcome};
pub use strategy::{default_chain, eta_minutes, incentive_for, CandidateOrdering, Strategy};
