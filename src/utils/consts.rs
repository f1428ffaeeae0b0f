pub mod keys {
    pub const TOKEN_PREFIX: &str = "session:token:";
    pub const META_PREFIX: &str = "session:meta:";
    pub const RATE_LIMIT_PREFIX: &str = "session:ratelimit:";
    pub const AUDIT_PREFIX: &str = "audit:";

    pub fn token(jti: &str) -> String {
        format!("{TOKEN_PREFIX}{jti}")
    }

    pub fn meta(jti: &str) -> String {
        format!("{META_PREFIX}{jti}")
    }

    pub fn rate_limit(user_id: &str, window_index: i64) -> String {
        format!("{RATE_LIMIT_PREFIX}{user_id}:{window_index}")
    }
}

pub mod defaults {
    pub const ACCESS_TTL_SECONDS: i64 = 4 * 60 * 60;
    pub const REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
    pub const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;
    pub const STORE_TIMEOUT_MS: u64 = 2_000;
    pub const RATE_LIMIT_MAX: u32 = 10;
    pub const RATE_LIMIT_WINDOW_SECONDS: u64 = 60;
    pub const SWEEP_INTERVAL_SECONDS: u64 = 300;
    pub const SCAN_BATCH_SIZE: usize = 100;
}
