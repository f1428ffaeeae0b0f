use std::collections::HashSet;
use std::env;
use std::time::Duration;

use base64::engine::general_purpose::{STANDARD as B64_STD, URL_SAFE_NO_PAD as B64_URL};
use base64::Engine;
use dotenvy::dotenv;
use serde::Deserialize;
use thiserror::Error;

use super::consts::defaults;

#[derive(Clone, Debug)]
pub struct Config {
    issuer: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    jwt_keys: Vec<(String, Vec<u8>)>, // (kid, secret)
    active_kid: String,
    redis_host: Option<String>,
    store_timeout: Duration,
    rate_limit_max: u32,
    rate_limit_window_seconds: u64,
    sweep_interval: Duration,
    scan_batch_size: usize,
    audit_retention_seconds: Option<u64>,
}

impl Config {
    pub fn jwt_issuer(&self) -> &str {
        &self.issuer
    }
    pub fn token_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }
    pub fn jwt_active_kid(&self) -> &str {
        &self.active_kid
    }
    pub fn jwt_keys(&self) -> &[(String, Vec<u8>)] {
        &self.jwt_keys
    }
    pub fn redis_host(&self) -> Option<&str> {
        self.redis_host.as_deref()
    }
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }
    pub fn rate_limit_max(&self) -> u32 {
        self.rate_limit_max
    }
    pub fn rate_limit_window_seconds(&self) -> u64 {
        self.rate_limit_window_seconds
    }
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
    pub fn scan_batch_size(&self) -> usize {
        self.scan_batch_size
    }
    pub fn audit_retention_seconds(&self) -> Option<u64> {
        self.audit_retention_seconds
    }

    /// Programmatic construction with default TTLs and limits.
    pub fn new(
        issuer: impl Into<String>,
        jwt_keys: Vec<(String, Vec<u8>)>,
        active_kid: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let active_kid = active_kid.into();
        validate_keys(&jwt_keys, &active_kid)?;
        Ok(Self {
            issuer: issuer.into(),
            access_ttl_seconds: defaults::ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: defaults::REFRESH_TTL_SECONDS,
            jwt_keys,
            active_kid,
            redis_host: None,
            store_timeout: Duration::from_millis(defaults::STORE_TIMEOUT_MS),
            rate_limit_max: defaults::RATE_LIMIT_MAX,
            rate_limit_window_seconds: defaults::RATE_LIMIT_WINDOW_SECONDS,
            sweep_interval: Duration::from_secs(defaults::SWEEP_INTERVAL_SECONDS),
            scan_batch_size: defaults::SCAN_BATCH_SIZE,
            audit_retention_seconds: None,
        })
    }

    /// Both TTLs are clamped to `1..=MAX_TOKEN_TTL_SECONDS`.
    pub fn with_token_ttls(mut self, access_seconds: i64, refresh_seconds: i64) -> Self {
        self.access_ttl_seconds = access_seconds.clamp(1, defaults::MAX_TOKEN_TTL_SECONDS);
        self.refresh_ttl_seconds = refresh_seconds.clamp(1, defaults::MAX_TOKEN_TTL_SECONDS);
        self
    }

    pub fn with_redis_host(mut self, host: impl Into<String>) -> Self {
        self.redis_host = Some(host.into());
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, max: u32, window_seconds: u64) -> Self {
        self.rate_limit_max = max;
        self.rate_limit_window_seconds = window_seconds.max(1);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_scan_batch_size(mut self, batch: usize) -> Self {
        self.scan_batch_size = batch.max(1);
        self
    }

    pub fn with_audit_retention(mut self, seconds: u64) -> Self {
        self.audit_retention_seconds = Some(seconds);
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env in dev; no-op in prod if not present.
        let _ = dotenv();

        let issuer = req_var("JWT_ISSUER")?;
        let active_kid = req_var("JWT_ACTIVE_KID")?;
        let jwt_keys = parse_hs256_keys_json("JWT_HS256_KEYS_JSON")?;

        let mut cfg = Self::new(issuer, jwt_keys, active_kid)?.with_token_ttls(
            parse_ttl("ACCESS_TTL_SECONDS", defaults::ACCESS_TTL_SECONDS)?,
            parse_ttl("REFRESH_TTL_SECONDS", defaults::REFRESH_TTL_SECONDS)?,
        );

        cfg.redis_host = opt_var("REDIS_HOST").filter(|h| !h.is_empty());
        cfg.store_timeout =
            Duration::from_millis(parse_or("STORE_TIMEOUT_MS", defaults::STORE_TIMEOUT_MS)?);
        cfg = cfg.with_rate_limit(
            parse_or("RATE_LIMIT_MAX", defaults::RATE_LIMIT_MAX)?,
            parse_or("RATE_LIMIT_WINDOW_SECONDS", defaults::RATE_LIMIT_WINDOW_SECONDS)?,
        );
        cfg.sweep_interval = Duration::from_secs(parse_or(
            "SWEEP_INTERVAL_SECONDS",
            defaults::SWEEP_INTERVAL_SECONDS,
        )?);
        if cfg.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid("SWEEP_INTERVAL_SECONDS"));
        }
        cfg = cfg.with_scan_batch_size(parse_or("SCAN_BATCH_SIZE", defaults::SCAN_BATCH_SIZE)?);
        cfg.audit_retention_seconds = match opt_var("AUDIT_RETENTION_SECONDS") {
            Some(v) => Some(
                v.parse::<u64>()
                    .map_err(|_| ConfigError::Invalid("AUDIT_RETENTION_SECONDS"))?,
            ),
            None => None,
        };

        Ok(cfg)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing env var {0}")]
    Missing(&'static str),
    #[error("invalid env var {0}")]
    Invalid(&'static str),
    #[error("decode error in {0}")]
    Decode(&'static str),
    #[error("{0}")]
    WrongLen(&'static str),
}

fn req_var(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn opt_var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match opt_var(key) {
        Some(v) => v.parse::<T>().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

// Out-of-range TTLs are refused rather than clamped so a typo is noticed.
fn parse_ttl(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    let ttl = parse_or(key, default)?;
    if (1..=defaults::MAX_TOKEN_TTL_SECONDS).contains(&ttl) {
        Ok(ttl)
    } else {
        Err(ConfigError::Invalid(key))
    }
}

fn decode_b64_any(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    // Try URL-safe (no padding) first, then standard.
    B64_URL.decode(s).or_else(|_| B64_STD.decode(s))
}

fn validate_keys(jwt_keys: &[(String, Vec<u8>)], active_kid: &str) -> Result<(), ConfigError> {
    if jwt_keys.is_empty() {
        return Err(ConfigError::Invalid("empty JWT keys"));
    }
    let mut seen = HashSet::new();
    for (kid, secret) in jwt_keys {
        if !seen.insert(kid.as_str()) {
            return Err(ConfigError::Invalid("duplicate kid in keys JSON"));
        }
        if secret.len() < 32 {
            return Err(ConfigError::WrongLen(
                "HS256 secret must be at least 32 bytes",
            ));
        }
    }
    if !seen.contains(active_kid) {
        return Err(ConfigError::Invalid(
            "JWT_ACTIVE_KID not found in JWT_HS256_KEYS_JSON",
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
struct HsKey {
    kid: String,
    secret_b64: String,
}

fn parse_hs256_keys_json(key_name: &'static str) -> Result<Vec<(String, Vec<u8>)>, ConfigError> {
    let raw = req_var(key_name)?;
    let parsed: Vec<HsKey> =
        serde_json::from_str(&raw).map_err(|_| ConfigError::Invalid(key_name))?;

    parsed
        .into_iter()
        .map(|k| {
            let secret =
                decode_b64_any(&k.secret_b64).map_err(|_| ConfigError::Decode(key_name))?;
            Ok((k.kid, secret))
        })
        .collect()
}
