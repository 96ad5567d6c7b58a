//! Observability of the issued-account count.
//!
//! The service reports every account count it reads to an
//! [`AccountsObserver`]. [`AccountsGauge`] is the Prometheus-backed observer
//! served on `/metrics`.

use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    RegistrationFailed(#[from] prometheus::Error),

    #[error("failed to encode metrics: {0}")]
    EncodingFailed(String),
}

/// Receives the current number of issued accounts.
pub trait AccountsObserver: Send + Sync {
    fn accounts_counted(&self, count: u64);
}

/// Observer that discards every report.
pub struct NoopObserver;

impl AccountsObserver for NoopObserver {
    fn accounts_counted(&self, _count: u64) {}
}

/// Prometheus gauge of issued accounts, with its own registry.
pub struct AccountsGauge {
    registry: Registry,
    accounts: IntGauge,
}

impl AccountsGauge {
    /// Register `account_api_<network>_accounts_total` and, on Linux, the
    /// process collector.
    pub fn new(network: &str) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let accounts = IntGauge::with_opts(
            Opts::new(
                "accounts_total",
                "the number of accounts created by the service",
            )
            .namespace("account_api")
            .subsystem(metric_label(network)),
        )?;
        registry.register(Box::new(accounts.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self { registry, accounts })
    }

    pub fn current(&self) -> i64 {
        self.accounts.get()
    }

    /// Render all registered metrics in the text exposition format.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::EncodingFailed(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingFailed(e.to_string()))
    }
}

impl AccountsObserver for AccountsGauge {
    fn accounts_counted(&self, count: u64) {
        self.accounts.set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

/// Metric name components only allow `[a-zA-Z0-9_]`.
fn metric_label(value: &str) -> String {
    let label: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if label.is_empty() {
        "default".to_string()
    } else {
        label
    }
}
