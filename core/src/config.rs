/// Configuration management
use crate::error::{HearthError, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_MESSAGES_PATH: &str = "messages";
const DEFAULT_LOADING_IMAGE_URL: &str = "https://www.google.com/images/spin-32.gif";
const DEFAULT_ANONYMOUS_NAME: &str = "anonymous";

/// Chat core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Path of the watched message collection
    pub messages_path: String,

    /// Sentinel URL written into placeholder records while an image upload
    /// is still in flight
    pub loading_image_url: String,

    /// Author name used when nobody is signed in
    pub anonymous_name: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            messages_path: DEFAULT_MESSAGES_PATH.to_string(),
            loading_image_url: DEFAULT_LOADING_IMAGE_URL.to_string(),
            anonymous_name: DEFAULT_ANONYMOUS_NAME.to_string(),
        }
    }
}

impl ChatConfig {
    /// Create config from defaults plus environment overrides (nice for scripts)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("HEARTH_MESSAGES_PATH") {
            config.messages_path = path;
        }
        if let Ok(url) = std::env::var("HEARTH_LOADING_IMAGE_URL") {
            config.loading_image_url = url;
        }
        if let Ok(name) = std::env::var("HEARTH_ANONYMOUS_NAME") {
            config.anonymous_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check field shapes before any backend call uses them
    pub fn validate(&self) -> Result<()> {
        if self.messages_path.is_empty() {
            return Err(HearthError::Config(
                "messages_path must not be empty".to_string(),
            ));
        }
        if self.messages_path.starts_with('/') || self.messages_path.ends_with('/') {
            return Err(HearthError::Config(format!(
                "messages_path must not start or end with '/': {}",
                self.messages_path
            )));
        }
        if self.loading_image_url.is_empty() {
            return Err(HearthError::Config(
                "loading_image_url must not be empty".to_string(),
            ));
        }
        if self.anonymous_name.is_empty() {
            return Err(HearthError::Config(
                "anonymous_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
