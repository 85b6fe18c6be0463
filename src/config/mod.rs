//! Typed configuration from environment variables.
//!
//! Loads once at startup. Required values fail fast; tunables fall back to
//! defaults. The database URL is held as a secrecy::SecretString.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::expr::Operator;
use secrecy::SecretString;

/// Simulated latency used when an operator's variable is unset or invalid.
pub const DEFAULT_OPERATION_TIME: Duration = Duration::from_millis(100);

/// Orchestrator configuration.
#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub listen_addr: SocketAddr,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub timings: OperationTimings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {raw:?}")))?,
            Err(_) => 8080,
        };

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: log_level(),
            timings: OperationTimings::from_env(),
        })
    }
}

/// Simulated compute latency per operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimings {
    pub addition: Duration,
    pub subtraction: Duration,
    pub multiplication: Duration,
    pub division: Duration,
}

impl Default for OperationTimings {
    fn default() -> Self {
        Self::uniform(DEFAULT_OPERATION_TIME)
    }
}

impl OperationTimings {
    /// The same latency for every operator.
    pub fn uniform(time: Duration) -> Self {
        Self {
            addition: time,
            subtraction: time,
            multiplication: time,
            division: time,
        }
    }

    pub fn for_operator(&self, operator: Operator) -> Duration {
        match operator {
            Operator::Add => self.addition,
            Operator::Subtract => self.subtraction,
            Operator::Multiply => self.multiplication,
            Operator::Divide => self.division,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Each operator is read
    /// independently; a missing, unparsable, or zero value means
    /// [`DEFAULT_OPERATION_TIME`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_OPERATION_TIME)
        };

        Self {
            addition: read("TIME_ADDITION_MS"),
            subtraction: read("TIME_SUBTRACTION_MS"),
            multiplication: read("TIME_MULTIPLICATIONS_MS"),
            division: read("TIME_DIVISIONS_MS"),
        }
    }
}

/// Worker agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the orchestrator's HTTP API.
    pub orchestrator_url: String,
    /// Number of concurrent worker loops.
    pub computing_power: usize,
    /// Wait between pulls when no work is available.
    pub poll_interval: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            orchestrator_url: "http://localhost:8080".to_string(),
            computing_power: 1,
            poll_interval: Duration::from_millis(500),
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let orchestrator_url = lookup("ORCHESTRATOR_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.orchestrator_url);

        let computing_power = lookup("COMPUTING_POWER")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&n| n >= 1)
            .unwrap_or(defaults.computing_power);

        let poll_interval = lookup("AGENT_POLL_INTERVAL_MS")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        Self {
            orchestrator_url,
            computing_power,
            poll_interval,
            otel_endpoint: lookup("OTEL_ENDPOINT"),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}
