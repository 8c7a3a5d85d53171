use std::time::Duration;

/// Wrappers followed before giving up on a chain
pub const DEFAULT_MAX_WRAPPER_DEPTH: usize = 5;

/// HTTP redirects followed by a single GET
pub const DEFAULT_REDIRECT_BUDGET: u32 = 2;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

pub const DEFAULT_USER_AGENT: &str = concat!("vast-analyzer/", env!("CARGO_PKG_VERSION"));

/// Knobs for resolving an ad tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Maximum number of wrapper documents to unwrap
    pub max_wrapper_depth: usize,

    /// Maximum number of HTTP redirects per GET, independent of wrapper depth
    pub redirect_budget: u32,

    /// Per-request timeout, applied to every GET separately
    pub timeout: Duration,

    pub user_agent: String,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            max_wrapper_depth: DEFAULT_MAX_WRAPPER_DEPTH,
            redirect_budget: DEFAULT_REDIRECT_BUDGET,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_wrapper_depth(mut self, depth: usize) -> Self {
        self.max_wrapper_depth = depth;
        self
    }

    pub fn redirect_budget(mut self, budget: u32) -> Self {
        self.redirect_budget = budget;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
