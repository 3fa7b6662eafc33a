use std::sync::Arc;
use std::time::Duration;

use crate::plugin::Plugin;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_REDIRECTS: usize = 8;
pub const DEFAULT_USER_AGENT: &str = "Samary";

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Deadline for the whole redirect chain plus body transfer.
    pub timeout: Duration,
    pub max_size: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_size: DEFAULT_MAX_SIZE,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        if !user_agent.trim().is_empty() {
            self.user_agent = user_agent;
        }
        self
    }
}

#[derive(Clone, Default)]
pub struct SamaryOptions {
    pub language: Option<String>,
    pub fetch: FetchConfig,
    /// Checked in order; the first plugin whose `test` matches handles the URL.
    pub plugins: Vec<Arc<dyn Plugin>>,
}

impl SamaryOptions {
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }
}

impl std::fmt::Debug for SamaryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamaryOptions")
            .field("language", &self.language)
            .field("fetch", &self.fetch)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}
