//! # Table Scout Core
//!
//! Runtime-agnostic discovery engine for Table Scout: the data model, the
//! search planner, the per-step search executor, the scoped fitness
//! validator, and the orchestrator that ties them together.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. Language
//! models and the semantic search index are reached only through the
//! [`planner::PlanGenerator`], [`validator::FitnessJudge`], and
//! [`search::SearchBackend`] traits, so the whole control flow can be
//! exercised with deterministic stubs.
//!
//! ```text
//!   document + target fields
//!             │
//!             ▼
//!      ┌─────────────┐     ┌──────────────────────────────┐
//!      │   Planner   │────▶│ step 0 │ step 1 │ … │ step n │
//!      └─────────────┘     └───┬──────────────────────────┘
//!                              ▼  (per step, in order)
//!                  ┌──────────────────┐   ┌────────────────────┐
//!                  │ Search Executor  │──▶│ Fitness Validator  │
//!                  └──────────────────┘   │ (step fields only) │
//!                                         └─────────┬──────────┘
//!                                                   ▼
//!                                     DiscoveryResult per step
//! ```

pub mod cancel;
pub mod discover;
pub mod error;
pub mod models;
pub mod planner;
pub mod prompt;
pub mod search;
pub mod text;
pub mod validator;

pub use cancel::CancellationSignal;
pub use discover::{Discovery, DiscoveryReport, DiscoveryState};
pub use error::DiscoveryError;
pub use models::{
    Candidate, ColumnSchema, DiscoveryResult, SearchPlan, SearchStep, TargetField,
    ValidationResult,
};
