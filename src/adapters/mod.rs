//! Kubernetes-backed implementations of the reconciler's collaborators

mod instances;
mod plan_cache;
mod plan_deleter;

pub use instances::*;
pub use plan_cache::*;
pub use plan_deleter::*;
