//! Configuration validation.
//!
//! Checks semantic constraints serde cannot express: attempt budgets, backoff
//! windows, strategy timeouts and provider credentials.

use std::fmt;

use crate::schema::{PublishProvider, TunepressConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "acquisition.max_attempts"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
    }
}

/// Validate a loaded config. An empty result means the config is usable as-is.
pub fn validate(config: &TunepressConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let acq = &config.acquisition;

    if acq.max_attempts == 0 {
        out.push(Diagnostic::error(
            "acquisition.max_attempts",
            "must be at least 1",
        ));
    }
    if acq.backoff_min_ms > acq.backoff_max_ms {
        out.push(Diagnostic::error(
            "acquisition.backoff_min_ms",
            format!(
                "backoff window is inverted ({} > {})",
                acq.backoff_min_ms, acq.backoff_max_ms
            ),
        ));
    }
    if acq.strategies.is_empty() {
        out.push(Diagnostic::error(
            "acquisition.strategies",
            "at least one strategy is required",
        ));
    }
    for (i, strategy) in acq.strategies.iter().enumerate() {
        if strategy.formats.is_empty() {
            out.push(Diagnostic::error(
                format!("acquisition.strategies[{i}].formats"),
                format!("strategy '{}' has no format tokens", strategy.name),
            ));
        }
        if strategy.timeout_secs == 0 {
            out.push(Diagnostic::error(
                format!("acquisition.strategies[{i}].timeout_secs"),
                "must be greater than 0",
            ));
        }
    }
    if acq
        .strategies
        .windows(2)
        .any(|w| w[1].timeout_secs < w[0].timeout_secs)
    {
        out.push(Diagnostic::warning(
            "acquisition.strategies",
            "timeouts should not decrease with strategy priority",
        ));
    }
    let needs_pool = acq.strategies.iter().any(|s| s.user_agent.is_none());
    if needs_pool && acq.user_agents.is_empty() {
        out.push(Diagnostic::warning(
            "acquisition.user_agents",
            "empty pool: strategies without a user agent will use the extractor default",
        ));
    }

    let publish = &config.publish;
    if publish.chunk_size_bytes == 0 {
        out.push(Diagnostic::error(
            "publish.chunk_size_bytes",
            "must be greater than 0",
        ));
    }
    if publish.provider == PublishProvider::Cloudinary {
        let c = &publish.cloudinary;
        if c.cloud_name.is_none() || c.api_key.is_none() || c.api_secret.is_none() {
            out.push(Diagnostic::error(
                "publish.cloudinary",
                "cloud_name, api_key and api_secret are required for the cloudinary provider",
            ));
        }
    }

    if config.queue.poll_interval_secs == 0 {
        out.push(Diagnostic::error(
            "queue.poll_interval_secs",
            "must be greater than 0",
        ));
    }

    out
}
