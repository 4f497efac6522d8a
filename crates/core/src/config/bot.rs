//! Runtime configuration with profile support.
//!
//! Provides the tunables of the scan loop with support for different
//! profiles (default, testing, conservative). The loaded value is passed
//! down explicitly; there is no global instance.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure containing all bot parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Discovery and batching
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Per-call timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Transaction submission
    #[serde(default)]
    pub submission: SubmissionConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Discovery and batching parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Accounts evaluated concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Subgraph page size (clamped to 1..=1000 by the client)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Delay before retrying a failed discovery (milliseconds)
    #[serde(default = "default_discovery_retry")]
    pub discovery_retry_ms: u64,

    /// Idle delay between cycles (milliseconds, 0 = none)
    #[serde(default)]
    pub cycle_interval_ms: u64,
}

fn default_batch_size() -> usize {
    25
}
fn default_page_size() -> usize {
    1000
}
fn default_discovery_retry() -> u64 {
    3000
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            page_size: default_page_size(),
            discovery_retry_ms: default_discovery_retry(),
            cycle_interval_ms: 0,
        }
    }
}

impl ScannerConfig {
    pub fn discovery_retry(&self) -> Duration {
        Duration::from_millis(self.discovery_retry_ms)
    }
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

/// Upper bounds on external calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Read calls and dry-runs (seconds)
    #[serde(default = "default_call_timeout")]
    pub call_secs: u64,

    /// Transaction broadcast (seconds)
    #[serde(default = "default_send_timeout")]
    pub send_secs: u64,

    /// Receipt wait (seconds)
    #[serde(default = "default_receipt_timeout")]
    pub receipt_secs: u64,

    /// Each subgraph page request (seconds)
    #[serde(default = "default_index_timeout")]
    pub index_request_secs: u64,
}

fn default_call_timeout() -> u64 {
    15
}
fn default_send_timeout() -> u64 {
    30
}
fn default_receipt_timeout() -> u64 {
    180
}
fn default_index_timeout() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_secs: default_call_timeout(),
            send_secs: default_send_timeout(),
            receipt_secs: default_receipt_timeout(),
            index_request_secs: default_index_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn call(&self) -> Duration {
        Duration::from_secs(self.call_secs)
    }
    pub fn send(&self) -> Duration {
        Duration::from_secs(self.send_secs)
    }
    pub fn receipt(&self) -> Duration {
        Duration::from_secs(self.receipt_secs)
    }
    pub fn index_request(&self) -> Duration {
        Duration::from_secs(self.index_request_secs)
    }
}

/// What to do when broadcasting a liquidation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Log and leave the account to the next scan cycle.
    #[default]
    NextCycle,
    /// Dry-run and resend within the same cycle, up to `max_attempts` sends.
    Immediate { max_attempts: u32 },
}

impl RetryPolicy {
    /// Total sends allowed for one account in one cycle.
    pub fn max_sends(&self) -> u32 {
        match self {
            Self::NextCycle => 1,
            Self::Immediate { max_attempts } => (*max_attempts).max(1),
        }
    }
}

/// Transaction submission parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SubmissionConfig {
    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// Fixed gas limit; the node estimates when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            scanner: ScannerConfig::default(),
            timeouts: TimeoutConfig::default(),
            submission: SubmissionConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Small batches and short timeouts for forks and testnets.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            scanner: ScannerConfig {
                batch_size: 5,
                page_size: 100,
                discovery_retry_ms: 1000,
                cycle_interval_ms: 1000,
            },
            timeouts: TimeoutConfig {
                call_secs: 5,
                send_secs: 10,
                receipt_secs: 60,
                index_request_secs: 10,
            },
            submission: SubmissionConfig {
                retry_policy: RetryPolicy::Immediate { max_attempts: 2 },
                gas_limit: None,
            },
        }
    }

    /// Fewer calls per second against rate-limited endpoints.
    pub fn conservative() -> Self {
        Self {
            profile: "conservative".to_string(),
            scanner: ScannerConfig {
                batch_size: 10,
                discovery_retry_ms: 10_000,
                cycle_interval_ms: 5_000,
                ..Default::default()
            },
            timeouts: TimeoutConfig {
                call_secs: 30,
                send_secs: 60,
                receipt_secs: 300,
                index_request_secs: 60,
            },
            submission: SubmissionConfig::default(),
        }
    }

    /// Profile from `BOT_CONFIG` (file) or `BOT_PROFILE`, else default.
    /// Supported profiles: default, testing, conservative
    pub fn from_env() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var("BOT_CONFIG") {
            return Self::from_file(&path)
                .map_err(|e| anyhow::anyhow!("failed to load BOT_CONFIG {path}: {e}"));
        }
        let profile = std::env::var("BOT_PROFILE").unwrap_or_else(|_| "default".to_string());
        Ok(Self::from_profile(&profile))
    }

    /// Resolve a profile name. Unknown names fall back to the default.
    pub fn from_profile(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "testing" | "test" => Self::testing(),
            "conservative" | "safe" => Self::conservative(),
            _ => Self::default(),
        }
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Bot configuration loaded");
        tracing::info!(
            batch_size = self.scanner.batch_size,
            page_size = self.scanner.page_size,
            discovery_retry_ms = self.scanner.discovery_retry_ms,
            cycle_interval_ms = self.scanner.cycle_interval_ms,
            "Scanner parameters"
        );
        tracing::info!(
            call_secs = self.timeouts.call_secs,
            send_secs = self.timeouts.send_secs,
            receipt_secs = self.timeouts.receipt_secs,
            index_request_secs = self.timeouts.index_request_secs,
            "Timeouts"
        );
        tracing::info!(
            retry_policy = ?self.submission.retry_policy,
            gas_limit = ?self.submission.gas_limit,
            "Submission parameters"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.scanner.batch_size, 25);
        assert_eq!(config.scanner.page_size, 1000);
        assert_eq!(config.scanner.discovery_retry(), Duration::from_secs(3));
        assert_eq!(config.scanner.cycle_interval(), Duration::ZERO);
        assert_eq!(config.submission.retry_policy, RetryPolicy::NextCycle);
    }

    #[test]
    fn test_profiles() {
        assert_eq!(BotConfig::from_profile("testing").profile, "testing");
        assert_eq!(BotConfig::from_profile("SAFE").profile, "conservative");
        assert_eq!(BotConfig::from_profile("unknown"), BotConfig::default());
    }

    #[test]
    fn test_retry_policy_sends() {
        assert_eq!(RetryPolicy::NextCycle.max_sends(), 1);
        assert_eq!(RetryPolicy::Immediate { max_attempts: 3 }.max_sends(), 3);
        assert_eq!(RetryPolicy::Immediate { max_attempts: 0 }.max_sends(), 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: BotConfig = toml::from_str(
            r#"
            [scanner]
            batch_size = 50

            [submission]
            retry_policy = { mode = "immediate", max_attempts = 3 }
            "#,
        )
        .unwrap();

        assert_eq!(parsed.profile, "default");
        assert_eq!(parsed.scanner.batch_size, 50);
        assert_eq!(parsed.scanner.discovery_retry_ms, 3000);
        assert_eq!(parsed.timeouts, TimeoutConfig::default());
        assert_eq!(
            parsed.submission.retry_policy,
            RetryPolicy::Immediate { max_attempts: 3 }
        );
    }

    #[test]
    fn test_serialization() {
        let config = BotConfig::testing();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("profile = \"testing\""));

        let parsed: BotConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
