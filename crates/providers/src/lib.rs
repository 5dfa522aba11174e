//! Model service implementations for Dispatch.
//!
//! All providers implement the `dispatch_core::Provider` trait.

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use dispatch_config::AppConfig;
use dispatch_core::error::ProviderError;

/// Build the configured provider. Fails when no API key is available.
pub fn build_from_config(config: &AppConfig) -> Result<AnthropicProvider, ProviderError> {
    let key = config.provider.api_key.as_deref().ok_or_else(|| {
        ProviderError::NotConfigured("ANTHROPIC_API_KEY is not set".into())
    })?;
    let mut provider = AnthropicProvider::new(key);
    if let Some(url) = &config.provider.base_url {
        provider = provider.with_base_url(url);
    }
    Ok(provider)
}
