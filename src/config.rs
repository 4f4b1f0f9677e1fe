//! Application configuration
//!
//! Loaded from the embedded defaults, optional files under `config/`, and
//! `FINGUARD_*` environment variables, in increasing priority.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use finguard_core::ResilienceSettings;
use finguard_market::SimulatedConfig;
use serde::{Deserialize, Serialize};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub resilience: ResilienceSettings,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Plain,
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "finguard=info".to_string()
}

/// Market data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Provider label in metrics and logs
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
    #[serde(default = "default_failure_probability")]
    pub failure_probability: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            max_latency_ms: default_max_latency_ms(),
            failure_probability: default_failure_probability(),
            seed: None,
        }
    }
}

impl MarketConfig {
    /// Settings for the simulated source
    pub fn simulated(&self) -> SimulatedConfig {
        let config = SimulatedConfig::new()
            .with_max_latency(Duration::from_millis(self.max_latency_ms))
            .with_failure_probability(self.failure_probability);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

fn default_provider() -> String {
    "simulated".to_string()
}
fn default_max_latency_ms() -> u64 {
    100
}
fn default_failure_probability() -> f64 {
    0.2
}

/// Pricing model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    #[serde(default = "default_simulations")]
    pub simulations: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
            volatility: default_volatility(),
            simulations: default_simulations(),
            workers: default_workers(),
        }
    }
}

fn default_risk_free_rate() -> f64 {
    0.05
}
fn default_volatility() -> f64 {
    0.2
}
fn default_simulations() -> u64 {
    100_000
}
fn default_workers() -> usize {
    10
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_addr")]
    pub addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let env = std::env::var("FINGUARD_ENV").unwrap_or_else(|_| "development".to_string());

    let config = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name(&format!("config/{}", env)).required(false))
        .add_source(File::with_name("config/local").required(false))
        // FINGUARD_RESILIENCE__RETRY__MAX_RETRIES -> resilience.retry.max_retries
        .add_source(
            Environment::with_prefix("FINGUARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let app: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    app.resilience
        .validate()
        .context("Invalid resilience configuration")?;

    Ok(app)
}
