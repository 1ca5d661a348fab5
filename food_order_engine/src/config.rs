use std::{env, str::FromStr, time::Duration};

use chrono::{FixedOffset, Offset, Utc};
use log::*;
use order_common::helpers::parse_boolean_flag;

const DEFAULT_FOE_DATABASE_URL: &str = "sqlite://data/food_orders.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_GATEWAY_SUCCESS_RATE: f64 = 0.9;
const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// If true, pending database migrations are run when the backend connects.
    pub auto_migrate: bool,
    pub gateway: GatewayConfig,
    /// The time zone in which `HH:MM` delivery times are interpreted.
    pub service_utc_offset: FixedOffset,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Probability that the simulated gateway approves a request.
    pub success_rate: f64,
    /// If supplied, the simulated gateway produces the same sequence of outcomes on every run.
    pub seed: Option<u64>,
    /// How long to wait for the gateway before giving up with an unknown outcome.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { success_rate: DEFAULT_GATEWAY_SUCCESS_RATE, seed: None, timeout: DEFAULT_GATEWAY_TIMEOUT }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_FOE_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auto_migrate: true,
            gateway: GatewayConfig::default(),
            service_utc_offset: utc(),
        }
    }
}

impl EngineConfig {
    pub fn new(database_url: &str) -> Self {
        Self { database_url: database_url.to_string(), ..Default::default() }
    }

    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_service_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.service_utc_offset = offset;
        self
    }

    /// Loads the configuration from `FOE_*` environment variables. Missing values take their defaults; malformed values
    /// are logged and replaced by the default.
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("FOE_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ FOE_DATABASE_URL is not set. Using the default, {DEFAULT_FOE_DATABASE_URL}.");
            DEFAULT_FOE_DATABASE_URL.to_string()
        });
        let max_connections = parse_env("FOE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let auto_migrate = parse_boolean_flag(env::var("FOE_AUTO_MIGRATE").ok(), true);
        let gateway = GatewayConfig::from_env_or_default();
        let offset_minutes = parse_env("FOE_SERVICE_UTC_OFFSET_MINUTES", 0i32);
        let service_utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                error!("🪛️ {offset_minutes} is not a valid FOE_SERVICE_UTC_OFFSET_MINUTES. Using UTC instead.");
                utc()
            });
        Self { database_url, max_connections, auto_migrate, gateway, service_utc_offset }
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let mut success_rate = parse_env("FOE_GATEWAY_SUCCESS_RATE", DEFAULT_GATEWAY_SUCCESS_RATE);
        if !(0.0..=1.0).contains(&success_rate) {
            error!(
                "🪛️ FOE_GATEWAY_SUCCESS_RATE must be between 0 and 1, but was {success_rate}. Using the default, \
                 {DEFAULT_GATEWAY_SUCCESS_RATE}, instead."
            );
            success_rate = DEFAULT_GATEWAY_SUCCESS_RATE;
        }
        let seed = env::var("FOE_GATEWAY_SEED").ok().and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| warn!("🪛️ {s} is not a valid FOE_GATEWAY_SEED. {e}. The gateway will not be seeded."))
                .ok()
        });
        let timeout_ms = parse_env("FOE_GATEWAY_TIMEOUT_MS", DEFAULT_GATEWAY_TIMEOUT.as_millis() as u64);
        Self { success_rate, seed, timeout: Duration::from_millis(timeout_ms) }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn parse_env<T>(var: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}
