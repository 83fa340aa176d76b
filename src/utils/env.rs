// src/utils/env.rs
use log::{debug, info};

/// Loads variables from a `.env` file in the working directory (or a parent).
/// Variables already present in the environment win. A missing file is fine.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => info!("Loaded environment variables from {}", path.display()),
        Err(e) => debug!("No .env file loaded ({}). Using system environment variables.", e),
    }
}

/// Reads an env var and parses it, falling back to `default` when unset or malformed.
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
