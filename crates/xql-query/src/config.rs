//! Engine configuration

use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XqlConfig {
    /// Maximum keys per batched relation query
    pub max_batch_size: usize,

    /// Separator between alias and property in column labels
    pub column_separator: String,

    /// Log generated SQL at info level
    pub log_sql: bool,

    /// Row limit used when a fetch gives none
    pub default_limit: Option<usize>,
}

impl Default for XqlConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            column_separator: "__".to_string(),
            log_sql: false,
            default_limit: None,
        }
    }
}

impl XqlConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration for development
    pub fn for_development() -> Self {
        Self {
            log_sql: true,
            ..Default::default()
        }
    }

    /// Create configuration for production
    pub fn for_production() -> Self {
        Self {
            log_sql: false,
            default_limit: Some(10_000),
            ..Default::default()
        }
    }

    /// Builder: set batch size, at least one key per batch
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    /// Builder: set column label separator
    pub fn column_separator(mut self, separator: &str) -> Self {
        self.column_separator = separator.to_string();
        self
    }

    /// Builder: log SQL at info level
    pub fn with_sql_logging(mut self) -> Self {
        self.log_sql = true;
        self
    }

    /// Builder: set default row limit
    pub fn default_limit(mut self, limit: usize) -> Self {
        self.default_limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = XqlConfig::default();
        assert_eq!(config.max_batch_size, 1000);
        assert_eq!(config.column_separator, "__");
        assert!(!config.log_sql);
        assert_eq!(config.default_limit, None);
    }

    #[test]
    fn test_presets() {
        assert!(XqlConfig::for_development().log_sql);
        assert_eq!(XqlConfig::for_production().default_limit, Some(10_000));
    }

    #[test]
    fn test_builder() {
        let config = XqlConfig::new()
            .max_batch_size(0)
            .column_separator("$")
            .with_sql_logging()
            .default_limit(50);

        assert_eq!(config.max_batch_size, 1);
        assert_eq!(config.column_separator, "$");
        assert!(config.log_sql);
        assert_eq!(config.default_limit, Some(50));
    }

    #[test]
    fn test_serde() {
        let config = XqlConfig::for_production();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<XqlConfig>(&json).unwrap(), config);
    }
}
