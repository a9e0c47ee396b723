//! Prometheus metrics for the Service Plan Operator
//!
//! This module exposes metrics for monitoring operator health and the work
//! queues feeding the plan reconcilers.

mod prometheus;

pub use prometheus::*;
