//! Runtime configuration for the relay.
//!
//! Values come from environment variables with fallback to defaults; an
//! unparsable value logs a warning and uses the default.

use std::str::FromStr;

/// Default largest frame payload accepted by readers (10 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Default capacity of the buffered pipe readers (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Environment variable overriding [`RelayConfig::max_frame_size`].
pub const MAX_FRAME_SIZE_ENV: &str = "LOGPIPE_MAX_FRAME_SIZE";

/// Environment variable overriding [`RelayConfig::buffer_size`].
pub const BUFFER_SIZE_ENV: &str = "LOGPIPE_BUFFER_SIZE";

/// Limits applied to both ends of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Largest frame payload in bytes; longer frames are skipped.
    pub max_frame_size: usize,
    /// Read buffer capacity in bytes.
    pub buffer_size: usize,
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// - `LOGPIPE_MAX_FRAME_SIZE`: default 10 MiB
    /// - `LOGPIPE_BUFFER_SIZE`: default 64 KiB
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_frame_size: env_or(MAX_FRAME_SIZE_ENV, DEFAULT_MAX_FRAME_SIZE),
            buffer_size: env_or(BUFFER_SIZE_ENV, DEFAULT_BUFFER_SIZE),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Reads an environment variable and parses it, falling back to `default`.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %v, "invalid env var value, using default");
            default
        }),
        Err(_) => default,
    }
}
