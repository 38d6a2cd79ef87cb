use std::path::PathBuf;

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
    pub log_level: String,
    pub retailers_path: PathBuf,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Headless-render endpoint for JavaScript-dependent pages.
    pub render_url: Option<String>,
    /// Residential-proxy render endpoint used for anti-bot bypass.
    pub unblock_url: Option<String>,
    pub render_api_key: Option<String>,
    pub render_timeout_secs: u64,
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub ai_url: Option<String>,
    pub ai_api_key: Option<String>,
    pub ai_model: String,
    pub ai_timeout_secs: u64,
    pub ai_max_html_chars: usize,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_jitter_ratio: f64,
    pub breaker_failure_threshold: u32,
    pub breaker_success_threshold: u32,
    pub breaker_open_timeout_secs: u64,
    pub breaker_half_open_max_calls: u32,
    pub max_concurrent_checks: usize,
    /// JSON-lines file successful results are appended to, if set.
    pub results_path: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("retailers_path", &self.retailers_path)
            .field("user_agent", &self.user_agent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("render_url", &self.render_url)
            .field("unblock_url", &self.unblock_url)
            .field(
                "render_api_key",
                &self.render_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("ai_url", &self.ai_url)
            .field("ai_api_key", &self.ai_api_key.as_ref().map(|_| "[redacted]"))
            .field("ai_model", &self.ai_model)
            .field("ai_timeout_secs", &self.ai_timeout_secs)
            .field("ai_max_html_chars", &self.ai_max_html_chars)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_jitter_ratio", &self.retry_jitter_ratio)
            .field("breaker_failure_threshold", &self.breaker_failure_threshold)
            .field("breaker_success_threshold", &self.breaker_success_threshold)
            .field("breaker_open_timeout_secs", &self.breaker_open_timeout_secs)
            .field(
                "breaker_half_open_max_calls",
                &self.breaker_half_open_max_calls,
            )
            .field("max_concurrent_checks", &self.max_concurrent_checks)
            .field("results_path", &self.results_path)
            .finish()
    }
}
