//! Reconcilers for service catalog plans
//!
//! This module contains the business logic that decides what to do with a
//! plan. It only talks to the outside world through the collaborator traits
//! defined in [`plan`], which are backed by the Kubernetes API in
//! [`crate::adapters`] and by fakes in tests.

pub mod plan;

pub use plan::{
    DependencyQuery, PlanDeleter, PlanReader, PlanReconciler, PlanSnapshot, ReconcileOutcome,
};
