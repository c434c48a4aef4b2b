//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use delivery::DeliveryConfig;
use inventory::InventoryConfig;
use ledger::LedgerConfig;
use saga::{RetryPolicy, SagaConfig};
use tracing::warn;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info,tower_http=debug`)
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for plain text
/// - `DELIVERY_LOSS_PROBABILITY`, `DELIVERY_DWELL_SECS`, `DELIVERY_SCAN_INTERVAL_SECS`
/// - `RESERVATION_EXPIRY_MINUTES`
/// - `RECONCILER_MAX_ATTEMPTS`, `RECONCILER_BASE_DELAY_MS`,
///   `RECONCILER_BACKOFF_MULTIPLIER`, `RECONCILER_MAX_DELAY_MS`
/// - `SIMULATE_PAYMENT_ON_FAILURE`, `STORE_ACCOUNT_ID`, `CURRENCY`
///
/// Unparseable or out-of-range values fall back to the default with a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub json_logs: bool,
    pub loss_probability: f64,
    pub delivery_dwell_secs: u64,
    pub delivery_scan_interval_secs: u64,
    pub reservation_expiry_minutes: u64,
    pub reconciler_max_attempts: u32,
    pub reconciler_base_delay_ms: u64,
    pub reconciler_backoff_multiplier: f32,
    pub reconciler_max_delay_ms: u64,
    pub simulate_payment_on_failure: bool,
    pub store_account_id: String,
    pub currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info,tower_http=debug".to_string(),
            json_logs: false,
            loss_probability: 0.0,
            delivery_dwell_secs: 5,
            delivery_scan_interval_secs: 5,
            reservation_expiry_minutes: 30,
            reconciler_max_attempts: 8,
            reconciler_base_delay_ms: 500,
            reconciler_backoff_multiplier: 1.5,
            reconciler_max_delay_ms: 10_000,
            simulate_payment_on_failure: false,
            store_account_id: "STORE-001".to_string(),
            currency: "AUD".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let loss_probability = parse(&lookup, "DELIVERY_LOSS_PROBABILITY", defaults.loss_probability);
        let loss_probability = if (0.0..=1.0).contains(&loss_probability) {
            loss_probability
        } else {
            warn!(value = loss_probability, "DELIVERY_LOSS_PROBABILITY outside 0..=1, using default");
            defaults.loss_probability
        };

        let max_attempts = parse(&lookup, "RECONCILER_MAX_ATTEMPTS", defaults.reconciler_max_attempts);
        let max_attempts = if max_attempts == 0 {
            warn!("RECONCILER_MAX_ATTEMPTS must be at least 1, using default");
            defaults.reconciler_max_attempts
        } else {
            max_attempts
        };

        let multiplier = parse(
            &lookup,
            "RECONCILER_BACKOFF_MULTIPLIER",
            defaults.reconciler_backoff_multiplier,
        );
        let multiplier = if multiplier >= 1.0 {
            multiplier
        } else {
            warn!(value = multiplier, "RECONCILER_BACKOFF_MULTIPLIER below 1, using default");
            defaults.reconciler_backoff_multiplier
        };

        Self {
            host: string("HOST", &defaults.host),
            port: parse(&lookup, "PORT", defaults.port),
            log_level: string("RUST_LOG", &defaults.log_level),
            json_logs: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            loss_probability,
            delivery_dwell_secs: parse(&lookup, "DELIVERY_DWELL_SECS", defaults.delivery_dwell_secs),
            delivery_scan_interval_secs: parse(
                &lookup,
                "DELIVERY_SCAN_INTERVAL_SECS",
                defaults.delivery_scan_interval_secs,
            )
            .max(1),
            reservation_expiry_minutes: parse(
                &lookup,
                "RESERVATION_EXPIRY_MINUTES",
                defaults.reservation_expiry_minutes,
            ),
            reconciler_max_attempts: max_attempts,
            reconciler_base_delay_ms: parse(
                &lookup,
                "RECONCILER_BASE_DELAY_MS",
                defaults.reconciler_base_delay_ms,
            ),
            reconciler_backoff_multiplier: multiplier,
            reconciler_max_delay_ms: parse(
                &lookup,
                "RECONCILER_MAX_DELAY_MS",
                defaults.reconciler_max_delay_ms,
            ),
            simulate_payment_on_failure: parse(
                &lookup,
                "SIMULATE_PAYMENT_ON_FAILURE",
                defaults.simulate_payment_on_failure,
            ),
            store_account_id: string("STORE_ACCOUNT_ID", &defaults.store_account_id),
            currency: string("CURRENCY", &defaults.currency),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            dwell: chrono::Duration::seconds(self.delivery_dwell_secs as i64),
            scan_interval: Duration::from_secs(self.delivery_scan_interval_secs),
            ..DeliveryConfig::default()
        }
    }

    pub fn inventory_config(&self) -> InventoryConfig {
        InventoryConfig {
            reservation_expiry: chrono::Duration::minutes(self.reservation_expiry_minutes as i64),
        }
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            store_account_id: self.store_account_id.clone(),
            currency: self.currency.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.reconciler_max_attempts,
            base_delay: Duration::from_millis(self.reconciler_base_delay_ms),
            multiplier: self.reconciler_backoff_multiplier,
            max_delay: Duration::from_millis(self.reconciler_max_delay_ms),
        }
    }

    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig {
            simulate_payment_on_failure: self.simulate_payment_on_failure,
        }
    }

    /// How often expired reservations are swept: a tenth of the expiry, at
    /// least once a minute.
    pub fn expiry_sweep_interval(&self) -> Duration {
        let expiry = Duration::from_secs(self.reservation_expiry_minutes * 60);
        (expiry / 10).clamp(Duration::from_secs(1), Duration::from_secs(60))
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, ?default, "unparseable setting, using default");
            default
        }),
    }
}
