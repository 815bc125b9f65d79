//! Environment-driven configuration, including placeholder detection for the
//! hosted store credentials.

use std::{env, time::Duration};

use tracing::{info, warn};

/// Environment variable holding the hosted store base URL.
pub const STORE_URL_ENV: &str = "SUPABASE_URL";
/// Environment variable holding the anonymous API key for the hosted store.
pub const STORE_KEY_ENV: &str = "SUPABASE_ANON_KEY";
/// Environment variable overriding the session code retry budget.
const CODE_RETRY_BUDGET_ENV: &str = "CODE_RETRY_BUDGET";
/// Environment variable overriding the health probe timeout (milliseconds).
const PROBE_TIMEOUT_MS_ENV: &str = "PROBE_TIMEOUT_MS";

const DEFAULT_CODE_RETRY_BUDGET: usize = 10;
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Markers that indicate a value was copied from a template and never filled in.
const PLACEHOLDER_MARKERS: &[&str] = &["YOUR_", "your-project", "changeme", "<", ">"];

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Store connection settings, absent when the environment is incomplete
    /// or still carries template placeholders.
    pub store: Option<StoreSettings>,
    /// Per-variable presence flags surfaced by the health endpoint.
    pub environment: EnvironmentReport,
    /// Maximum number of candidate session codes to try before failing.
    pub code_retry_budget: usize,
    /// Upper bound applied to the health probe's store read.
    pub probe_timeout: Duration,
}

/// Connection settings for the hosted session store.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Base URL of the hosted store, without a trailing slash.
    pub base_url: String,
    /// API key presented on every store and auth request.
    pub api_key: String,
}

/// Presence flags for the required configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentReport {
    /// True when the store URL is set and not a placeholder.
    pub store_url: bool,
    /// True when the store API key is set and not a placeholder.
    pub store_key: bool,
}

impl AppConfig {
    /// Load the configuration from the process environment.
    pub fn load() -> Self {
        let config = Self::from_lookup(|key| env::var(key).ok());
        match &config.store {
            Some(settings) => info!(base_url = %settings.base_url, "store configured"),
            None => warn!(
                store_url = config.environment.store_url,
                store_key = config.environment.store_key,
                "store configuration missing or placeholder; running misconfigured"
            ),
        }
        config
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup(STORE_URL_ENV).filter(|value| !is_placeholder(value));
        let api_key = lookup(STORE_KEY_ENV).filter(|value| !is_placeholder(value));

        let environment = EnvironmentReport {
            store_url: base_url.is_some(),
            store_key: api_key.is_some(),
        };

        let store = base_url.zip(api_key).map(|(url, key)| StoreSettings {
            base_url: url.trim_end_matches('/').to_string(),
            api_key: key,
        });

        let code_retry_budget = lookup(CODE_RETRY_BUDGET_ENV)
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|budget| *budget > 0)
            .unwrap_or(DEFAULT_CODE_RETRY_BUDGET);

        let probe_timeout = lookup(PROBE_TIMEOUT_MS_ENV)
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT);

        Self {
            store,
            environment,
            code_retry_budget,
            probe_timeout,
        }
    }

    /// True when the store settings are absent and operator intervention is
    /// required before any network call can succeed.
    pub fn is_misconfigured(&self) -> bool {
        self.store.is_none()
    }
}

/// Detect values copied verbatim from setup templates.
fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || PLACEHOLDER_MARKERS
            .iter()
            .any(|marker| trimmed.contains(marker))
}
