//! Service Plan Operator
//!
//! This operator garbage-collects service catalog plans. Once the broker
//! catalog sync marks a `ServicePlan` or `ClusterServicePlan` as removed
//! from the broker's catalog, the plan is deleted as soon as no
//! `ServiceInstance` references it any more.

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod key;
pub mod metrics;
pub mod queue;
pub mod reconcilers;

pub use error::{Error, Result};
