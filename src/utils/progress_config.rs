// src/utils/progress_config.rs

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::env;

use crate::utils::env::env_or;

/// Progress reporting for batch runs
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to draw a progress bar at all
    pub enabled: bool,
    /// Log a progress line every N completed transactions (0 disables)
    pub log_every: usize,
    /// Whether to report memory usage in the summary
    pub show_memory: bool,
    /// Whether to report database pool statistics in the summary
    pub show_db_connection_stats: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_every: 1000,
            show_memory: true,
            show_db_connection_stats: true,
        }
    }
}

impl ProgressConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env::var("PROGRESS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            log_every: env_or("PROGRESS_LOG_EVERY", defaults.log_every),
            show_memory: env_or("PROGRESS_SHOW_MEMORY", defaults.show_memory),
            show_db_connection_stats: env_or(
                "PROGRESS_SHOW_DB_CONNECTIONS",
                defaults.show_db_connection_stats,
            ),
        }
    }

    /// Creates the batch progress bar when progress is enabled.
    pub fn create_progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("  🏠 [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ");
        pb.set_style(style);
        Some(pb)
    }

    pub fn log_config(&self) {
        info!(
            "📊 Progress tracking: enabled={}, log every {} transactions",
            self.enabled, self.log_every
        );
    }

    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }

    pub fn should_show_db_connection_stats(&self) -> bool {
        self.enabled && self.show_db_connection_stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProgressConfig::default();
        assert!(config.enabled);
        assert_eq!(config.log_every, 1000);
        assert!(config.should_show_memory());
        assert!(config.should_show_db_connection_stats());
    }

    #[test]
    fn test_progress_bar_creation() {
        let mut config = ProgressConfig::default();
        assert!(config.create_progress_bar(10).is_some());

        config.enabled = false;
        assert!(config.create_progress_bar(10).is_none());
        assert!(!config.should_show_memory());
        assert!(!config.should_show_db_connection_stats());
    }
}
