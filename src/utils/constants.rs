//! Shared constants and invariants

pub const DEFAULT_TOKEN_FILE: &str = "/var/lib/sl-session-agent/session.json";
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 1_800_000;
pub const DEFAULT_EXPIRY_BUFFER_MS: u64 = 60_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;
