//! Operator configuration from command line flags and environment

use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::queue::ExponentialBackoff;

/// Runtime settings for the operator
#[derive(Parser, Debug, Clone)]
#[command(name = "serviceplan-operator")]
#[command(about = "Deletes service plans that were withdrawn from their broker catalog")]
#[command(version)]
pub struct OperatorConfig {
    /// Concurrent workers per plan kind
    #[arg(long, env = "PLAN_OPERATOR_WORKERS", default_value_t = 2)]
    pub workers: usize,

    /// Seconds between full re-enqueues of every cached plan
    #[arg(long, env = "PLAN_OPERATOR_RESYNC_PERIOD_SECS", default_value_t = 300)]
    pub resync_period_secs: u64,

    /// First retry delay after a failed reconcile, in milliseconds
    #[arg(long, env = "PLAN_OPERATOR_BACKOFF_BASE_MS", default_value_t = 5)]
    pub backoff_base_ms: u64,

    /// Upper bound for the retry delay, in seconds
    #[arg(long, env = "PLAN_OPERATOR_BACKOFF_MAX_SECS", default_value_t = 300)]
    pub backoff_max_secs: u64,

    /// Drop a key after this many consecutive failures (unbounded if unset)
    #[arg(long, env = "PLAN_OPERATOR_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Port for /metrics, /healthz and /readyz
    #[arg(long, env = "PLAN_OPERATOR_METRICS_PORT", default_value_t = 8080)]
    pub metrics_port: u16,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "PLAN_OPERATOR_LOG_FILTER", default_value = "info,kube=warn,hyper=warn")]
    pub log_filter: String,
}

impl OperatorConfig {
    /// Reject settings the controllers cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }
        if self.resync_period_secs == 0 {
            return Err(Error::config("resync period must be at least 1 second"));
        }
        if self.backoff_base() > self.backoff_max() {
            return Err(Error::config(format!(
                "backoff base {:?} exceeds backoff max {:?}",
                self.backoff_base(),
                self.backoff_max()
            )));
        }
        Ok(())
    }

    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_period_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    /// Fresh backoff state for one work queue
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.backoff_base(), self.backoff_max())
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            resync_period_secs: 300,
            backoff_base_ms: 5,
            backoff_max_secs: 300,
            max_retries: None,
            metrics_port: 8080,
            log_filter: "info,kube=warn,hyper=warn".to_string(),
        }
    }
}
