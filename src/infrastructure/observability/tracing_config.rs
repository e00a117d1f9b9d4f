pub const DEFAULT_FILTER: &str = "info,mediascribe=debug,tower_http=debug";

/// Configuration for tracing initialization.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub environment: String,
    /// Fallback filter directive when `RUST_LOG` is unset.
    pub filter: String,
    pub json_format: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            environment: "local".to_string(),
            filter: DEFAULT_FILTER.to_string(),
            json_format: false,
        }
    }
}
