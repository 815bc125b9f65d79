use crate::config::StoreSettings;

/// Runtime configuration describing how to reach the hosted store.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the hosted store, without a trailing slash.
    pub base_url: String,
    /// API key sent as both the `apikey` header and the bearer credential.
    pub api_key: String,
}

impl RestConfig {
    /// Construct a configuration from explicit values.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

impl From<&StoreSettings> for RestConfig {
    fn from(settings: &StoreSettings) -> Self {
        Self::new(settings.base_url.clone(), settings.api_key.clone())
    }
}
