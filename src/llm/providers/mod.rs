//! Completion provider implementations.
//!
//! `build(config, api_key)` is the factory — called once at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct an [`LlmProvider`] from config and an optional API key.
///
/// `api_key` is `None` for keyless local models; it is never sourced from
/// the config file.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_dummy() {
        let config = LlmConfig::default();
        assert!(matches!(
            build(&config, None).unwrap(),
            LlmProvider::Dummy(_)
        ));
    }

    #[test]
    fn build_unknown_provider_fails() {
        let config = LlmConfig {
            provider: "mystery".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            build(&config, None),
            Err(ProviderError::UnknownProvider(_))
        ));
    }
}
