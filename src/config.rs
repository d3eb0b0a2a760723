use crate::category::CategoryFallback;
use crate::core::{PortalError, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Which document database the session talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Process-local store, named so several sessions can be told apart in logs
    Memory { name: String },
    /// Hosted JSON REST database rooted at `base_url`
    Rest { base_url: String },
}

/// Portal session configuration
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub backend: BackendKind,

    /// Sent as the `auth` query parameter on REST calls
    pub auth_token: Option<String>,

    /// Items per list page
    pub page_size: u32,

    /// Per-request timeout for REST calls
    pub request_timeout: Duration,

    /// Behaviour for category names missing from the registry
    pub category_fallback: CategoryFallback,
}

impl PortalConfig {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            auth_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
            category_fallback: CategoryFallback::default(),
        }
    }

    pub fn memory(name: &str) -> Self {
        Self::new(BackendKind::Memory {
            name: name.to_string(),
        })
    }

    pub fn rest(base_url: &str) -> Self {
        Self::new(BackendKind::Rest {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Set the auth token
    pub fn auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    /// Set the page size
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the REST request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set how unknown categories are handled
    pub fn category_fallback(mut self, fallback: CategoryFallback) -> Self {
        self.category_fallback = fallback;
        self
    }

    /// Parse a database URL
    ///
    /// Accepted forms: `memory://<name>` and `http(s)://host[/path]`.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if let Some(name) = url.strip_prefix("memory://") {
            let name = if name.is_empty() { "default" } else { name };
            return Ok(Self::memory(name));
        }
        if url.starts_with("https://") || url.starts_with("http://") {
            let host = url.split("://").nth(1).unwrap_or_default();
            if host.is_empty() || host.starts_with('/') {
                return Err(PortalError::config(format!("missing host in '{}'", url)));
            }
            return Ok(Self::rest(url));
        }
        Err(PortalError::config(format!(
            "database URL must start with memory://, http:// or https://, got '{}'",
            url
        )))
    }

    /// Load from `QUILLBOARD_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("QUILLBOARD_DATABASE_URL").unwrap_or_else(|| "memory://default".to_string());
        let mut config = Self::from_url(&url)?;

        if let Some(token) = lookup("QUILLBOARD_AUTH_TOKEN").filter(|t| !t.is_empty()) {
            config.auth_token = Some(token);
        }

        if let Some(raw) = lookup("QUILLBOARD_PAGE_SIZE") {
            config.page_size = raw
                .trim()
                .parse()
                .map_err(|_| PortalError::config("QUILLBOARD_PAGE_SIZE must be a positive integer"))?;
        }

        if let Some(raw) = lookup("QUILLBOARD_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| PortalError::config("QUILLBOARD_TIMEOUT_SECS must be a number of seconds"))?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("QUILLBOARD_STRICT_CATEGORIES") {
            config.category_fallback = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => CategoryFallback::Reject,
                "0" | "false" | "no" | "" => CategoryFallback::DefaultToPoem,
                _ => {
                    return Err(PortalError::config(
                        "QUILLBOARD_STRICT_CATEGORIES must be true or false",
                    ));
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Connection string with the auth token masked
    pub fn to_url(&self) -> String {
        let base = match &self.backend {
            BackendKind::Memory { name } => format!("memory://{}", name),
            BackendKind::Rest { base_url } => base_url.clone(),
        };
        match self.auth_token {
            Some(_) => format!("{}?auth=***", base),
            None => base,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(PortalError::config("page_size must be > 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(PortalError::config("request_timeout must be > 0"));
        }
        if let BackendKind::Memory { name } = &self.backend {
            if name.trim().is_empty() {
                return Err(PortalError::config("memory backend name cannot be empty"));
            }
        }
        Ok(())
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self::memory("default")
    }
}
