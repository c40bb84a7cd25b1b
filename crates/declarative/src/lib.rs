//! # Declarative
//!
//! A framework for declarative resource management.
//!
//! This crate provides the core abstractions for declaring desired state,
//! detecting current state, and converging a system to match it.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (files, links, wrappers)
//! - **ResourceState**: The current or desired state of a resource
//! - **ExecutionPlan**: Resources split into a concurrent and a sequential batch
//! - **Executor**: Applies the concurrent batch on a rayon pool, then the
//!   sequential batch in order
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecuteOptions, ExecutionPlan, execute_simple};
//!
//! let mut plan = ExecutionPlan::new();
//! plan.add(Box::new(my_file_resource));
//! plan.add(Box::new(my_link_resource)); // can_parallelize() == false
//!
//! let summary = execute_simple(plan, ExecuteOptions::default())?;
//! assert!(summary.is_success());
//! ```
//!
//! ## Callback Traits
//!
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks.

pub mod context;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback,
};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use executor::{execute, execute_simple};
pub use planner::ExecutionPlan;
pub use resource::{BoxedResource, Resource};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary, Failure, ResourceState};
