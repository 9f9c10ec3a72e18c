//! Engine configuration persisted in the settings table

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::providers::{CompletionProvider, GeminiCompletionProvider, OpenAICompletionProvider};
use crate::storage::{
    SETTING_AMBIGUITY_POLICY, SETTING_COMPLETION_MODEL, SETTING_COMPLETION_PROVIDER,
    SETTING_DECODER, SETTING_DICTATION_MODE, SETTING_FREE_FORM_TIMEOUT_MS,
    SETTING_GEMINI_API_KEY, SETTING_OPENAI_API_KEY, SETTING_RESOLVE_REFERENCE_WORDS, Storage,
};
use crate::types::{AmbiguityPolicy, DecoderKind, DictationMode};

pub const DEFAULT_FREE_FORM_TIMEOUT_MS: u64 = 8_000;

/// Which chat service backs the free-form decoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionProviderKind {
    #[default]
    Gemini,
    #[serde(rename = "openai")]
    OpenAI,
}

impl CompletionProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAI => "openai",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gemini" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAI),
            _ => None,
        }
    }

    /// Settings key holding this provider's API key
    pub fn api_key_setting(&self) -> &'static str {
        match self {
            Self::Gemini => SETTING_GEMINI_API_KEY,
            Self::OpenAI => SETTING_OPENAI_API_KEY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub decoder: DecoderKind,
    pub ambiguity: AmbiguityPolicy,
    pub dictation: DictationMode,
    /// Resolve "X的Y" captures in spoken commands
    pub resolve_reference_words: bool,
    pub free_form_timeout_ms: u64,
    pub completion_provider: CompletionProviderKind,
    /// Provider default model when None
    pub completion_model: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decoder: DecoderKind::default(),
            ambiguity: AmbiguityPolicy::default(),
            dictation: DictationMode::default(),
            resolve_reference_words: false,
            free_form_timeout_ms: DEFAULT_FREE_FORM_TIMEOUT_MS,
            completion_provider: CompletionProviderKind::default(),
            completion_model: None,
        }
    }
}

impl EngineConfig {
    /// Load from storage. Missing settings keep their defaults.
    pub fn load(storage: &Storage) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = storage.get_setting(SETTING_DECODER)? {
            config.decoder = parse_setting(SETTING_DECODER, &value, DecoderKind::from_name)?;
        }
        if let Some(value) = storage.get_setting(SETTING_AMBIGUITY_POLICY)? {
            config.ambiguity =
                parse_setting(SETTING_AMBIGUITY_POLICY, &value, AmbiguityPolicy::from_name)?;
        }
        if let Some(value) = storage.get_setting(SETTING_DICTATION_MODE)? {
            config.dictation =
                parse_setting(SETTING_DICTATION_MODE, &value, DictationMode::from_name)?;
        }
        if let Some(value) = storage.get_setting(SETTING_RESOLVE_REFERENCE_WORDS)? {
            config.resolve_reference_words =
                parse_setting(SETTING_RESOLVE_REFERENCE_WORDS, &value, parse_bool)?;
        }
        if let Some(value) = storage.get_setting(SETTING_FREE_FORM_TIMEOUT_MS)? {
            config.free_form_timeout_ms =
                parse_setting(SETTING_FREE_FORM_TIMEOUT_MS, &value, |v| {
                    v.parse::<u64>().ok().filter(|ms| *ms > 0)
                })?;
        }
        if let Some(value) = storage.get_setting(SETTING_COMPLETION_PROVIDER)? {
            config.completion_provider = parse_setting(
                SETTING_COMPLETION_PROVIDER,
                &value,
                CompletionProviderKind::from_name,
            )?;
        }
        config.completion_model = storage
            .get_setting(SETTING_COMPLETION_MODEL)?
            .filter(|model| !model.trim().is_empty());

        info!("Loading persisted config:");
        info!("  Decoder: {}", config.decoder.as_str());
        info!("  Ambiguity policy: {}", config.ambiguity.as_str());
        info!("  Dictation mode: {}", config.dictation.as_str());
        info!(
            "  Completion provider: {}",
            config.completion_provider.as_str()
        );

        Ok(config)
    }

    /// Persist every field
    pub fn save(&self, storage: &Storage) -> Result<()> {
        storage.set_setting(SETTING_DECODER, self.decoder.as_str())?;
        storage.set_setting(SETTING_AMBIGUITY_POLICY, self.ambiguity.as_str())?;
        storage.set_setting(SETTING_DICTATION_MODE, self.dictation.as_str())?;
        storage.set_setting(
            SETTING_RESOLVE_REFERENCE_WORDS,
            if self.resolve_reference_words {
                "true"
            } else {
                "false"
            },
        )?;
        storage.set_setting(
            SETTING_FREE_FORM_TIMEOUT_MS,
            &self.free_form_timeout_ms.to_string(),
        )?;
        storage.set_setting(
            SETTING_COMPLETION_PROVIDER,
            self.completion_provider.as_str(),
        )?;
        match &self.completion_model {
            Some(model) => storage.set_setting(SETTING_COMPLETION_MODEL, model)?,
            None => {
                storage.delete_setting(SETTING_COMPLETION_MODEL)?;
            }
        }
        debug!("Saved engine config");
        Ok(())
    }

    pub fn free_form_timeout(&self) -> Duration {
        Duration::from_millis(self.free_form_timeout_ms)
    }

    /// Build the configured completion provider.
    ///
    /// The API key comes from storage, falling back to the provider's environment
    /// variable. Returns None when no key is available.
    pub fn completion_provider(
        &self,
        storage: &Storage,
    ) -> Result<Option<Arc<dyn CompletionProvider>>> {
        let key = storage
            .get_setting(self.completion_provider.api_key_setting())?
            .filter(|k| !k.is_empty());

        let provider: Arc<dyn CompletionProvider> = match self.completion_provider {
            CompletionProviderKind::Gemini => {
                let provider = GeminiCompletionProvider::new(key);
                match &self.completion_model {
                    Some(model) => Arc::new(provider.with_model(model.clone())),
                    None => Arc::new(provider),
                }
            }
            CompletionProviderKind::OpenAI => {
                let provider = OpenAICompletionProvider::new(key);
                match &self.completion_model {
                    Some(model) => Arc::new(provider.with_model(model.clone())),
                    None => Arc::new(provider),
                }
            }
        };

        if provider.is_configured() {
            Ok(Some(provider))
        } else {
            debug!("{} has no API key", provider.name());
            Ok(None)
        }
    }
}

fn parse_setting<T>(key: &str, value: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
    parse(value.trim()).ok_or_else(|| Error::Config(format!("invalid value '{value}' for {key}")))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_stored() {
        let storage = Storage::in_memory().unwrap();
        let config = EngineConfig::load(&storage).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.decoder, DecoderKind::Pattern);
        assert_eq!(config.ambiguity, AmbiguityPolicy::Reject);
        assert_eq!(config.free_form_timeout(), Duration::from_secs(8));
    }

    #[test]
    fn test_save_and_load() {
        let storage = Storage::in_memory().unwrap();
        let config = EngineConfig {
            decoder: DecoderKind::TaggedSpan,
            ambiguity: AmbiguityPolicy::PreferLast,
            dictation: DictationMode::Replace,
            resolve_reference_words: true,
            free_form_timeout_ms: 2_500,
            completion_provider: CompletionProviderKind::OpenAI,
            completion_model: Some("gpt-4o".to_string()),
        };
        config.save(&storage).unwrap();

        assert_eq!(EngineConfig::load(&storage).unwrap(), config);
    }

    #[test]
    fn test_clearing_model_override() {
        let storage = Storage::in_memory().unwrap();
        let mut config = EngineConfig {
            completion_model: Some("gemini-2.5-pro".to_string()),
            ..EngineConfig::default()
        };
        config.save(&storage).unwrap();
        config.completion_model = None;
        config.save(&storage).unwrap();

        assert_eq!(EngineConfig::load(&storage).unwrap().completion_model, None);
    }

    #[test]
    fn test_unknown_value_is_config_error() {
        let storage = Storage::in_memory().unwrap();
        storage.set_setting(SETTING_DECODER, "bert").unwrap();
        assert!(matches!(
            EngineConfig::load(&storage),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let storage = Storage::in_memory().unwrap();
        storage.set_setting(SETTING_FREE_FORM_TIMEOUT_MS, "0").unwrap();
        assert!(matches!(
            EngineConfig::load(&storage),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_stored_key_configures_provider() {
        let storage = Storage::in_memory().unwrap();
        storage.set_setting(SETTING_OPENAI_API_KEY, "sk-test").unwrap();
        let config = EngineConfig {
            completion_provider: CompletionProviderKind::OpenAI,
            ..EngineConfig::default()
        };

        let provider = config.completion_provider(&storage).unwrap().unwrap();
        assert_eq!(provider.name(), "OpenAI");
    }

    #[test]
    fn test_provider_names_round_trip() {
        for kind in [CompletionProviderKind::Gemini, CompletionProviderKind::OpenAI] {
            assert_eq!(CompletionProviderKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(CompletionProviderKind::from_name("anthropic"), None);
    }
}
