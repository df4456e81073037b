use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub places_api_key: String,
    pub places_base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub settle_delay_ms: u64,
    pub inter_page_delay_ms: u64,
    /// Upper bound on stubs gathered by pagination, independent of the
    /// caller-facing result limit.
    pub page_fetch_ceiling: usize,
    /// Minimum stubs that must be gathered before a mid-run pagination
    /// failure is returned as a partial result instead of an error.
    pub min_partial_results: usize,
    pub enrichment_batch_size: usize,
    pub search_radius_meters: u32,
    pub photo_max_width: u32,
    /// `0` disables the overall search deadline.
    pub search_deadline_secs: u64,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
    /// Requests per client and window served without delay; `0` disables
    /// the slow-down tier.
    pub slow_down_after: usize,
    pub slow_down_step_ms: u64,
    /// `memory` keeps history in-process; anything else is a SQLite URL.
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Searches kept in history; older ones are evicted.
    pub history_max_entries: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("places_api_key", &"[redacted]")
            .field("places_base_url", &self.places_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("inter_page_delay_ms", &self.inter_page_delay_ms)
            .field("page_fetch_ceiling", &self.page_fetch_ceiling)
            .field("min_partial_results", &self.min_partial_results)
            .field("enrichment_batch_size", &self.enrichment_batch_size)
            .field("search_radius_meters", &self.search_radius_meters)
            .field("photo_max_width", &self.photo_max_width)
            .field("search_deadline_secs", &self.search_deadline_secs)
            .field("rate_limit_max_requests", &self.rate_limit_max_requests)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("slow_down_after", &self.slow_down_after)
            .field("slow_down_step_ms", &self.slow_down_step_ms)
            .field("database_url", &self.database_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("history_max_entries", &self.history_max_entries)
            .finish()
    }
}
