use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::intake::policy::{ValidationPolicy, DEFAULT_ACCEPT, DEFAULT_MAX_MB};
use crate::session::PipelineTimings;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub max_upload_mb: u64,
    pub accepted_types: String,
    pub upload_tick_ms: u64,
    pub upload_step: u8,
    pub upload_complete_delay_ms: u64,
    pub analysis_delay_ms: u64,
    pub next_step_path: String,
    pub session_idle_ttl_secs: u64,
    pub session_sweep_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            max_upload_mb: parse_env("MAX_UPLOAD_MB", DEFAULT_MAX_MB)?,
            accepted_types: env_or("ACCEPTED_TYPES", DEFAULT_ACCEPT),
            upload_tick_ms: parse_env("UPLOAD_TICK_MS", 100)?,
            upload_step: parse_env("UPLOAD_STEP", 5)?,
            upload_complete_delay_ms: parse_env("UPLOAD_COMPLETE_DELAY_MS", 500)?,
            analysis_delay_ms: parse_env("ANALYSIS_DELAY_MS", 2000)?,
            next_step_path: env_or("NEXT_STEP_PATH", "/verify"),
            session_idle_ttl_secs: parse_env("SESSION_IDLE_TTL_SECS", 1800)?,
            session_sweep_secs: parse_env("SESSION_SWEEP_SECS", 60)?,
        })
    }

    pub fn policy(&self) -> Result<ValidationPolicy> {
        ValidationPolicy::from_accept(self.max_upload_mb, &self.accepted_types).with_context(|| {
            format!(
                "MAX_UPLOAD_MB={} is too large to express in bytes",
                self.max_upload_mb
            )
        })
    }

    pub fn timings(&self) -> PipelineTimings {
        PipelineTimings {
            upload_step: self.upload_step,
            upload_tick: Duration::from_millis(self.upload_tick_ms),
            upload_complete_delay: Duration::from_millis(self.upload_complete_delay_ms),
            analysis_delay: Duration::from_millis(self.analysis_delay_ms),
        }
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }

    /// Never zero: `tokio::time::interval` panics on an empty period.
    pub fn session_sweep_every(&self) -> Duration {
        Duration::from_secs(self.session_sweep_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            max_upload_mb: DEFAULT_MAX_MB,
            accepted_types: DEFAULT_ACCEPT.to_string(),
            upload_tick_ms: 100,
            upload_step: 5,
            upload_complete_delay_ms: 500,
            analysis_delay_ms: 2000,
            next_step_path: "/verify".to_string(),
            session_idle_ttl_secs: 1800,
            session_sweep_secs: 60,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_wizard() {
        let policy = Config::default().policy().unwrap();
        assert_eq!(policy.max_bytes, 5 * 1024 * 1024);
        assert_eq!(policy.accepted.len(), 3);
    }

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u64 = parse_env("INTAKE_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("INTAKE_TEST_BAD_PORT", "eighty");
        let result: Result<u16> = parse_env("INTAKE_TEST_BAD_PORT", 8080);
        assert!(result.is_err());
        std::env::remove_var("INTAKE_TEST_BAD_PORT");
    }

    #[test]
    fn test_policy_overflow_fails_with_context() {
        let config = Config {
            max_upload_mb: u64::MAX,
            ..Config::default()
        };
        let err = config.policy().unwrap_err();
        assert!(err.to_string().contains("MAX_UPLOAD_MB"), "got {err}");
    }

    #[test]
    fn test_zero_sweep_period_is_clamped() {
        let config = Config {
            session_sweep_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.session_sweep_every(), Duration::from_secs(1));
    }
}
