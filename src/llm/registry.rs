use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{chat_endpoint, LlmConfig};
use crate::errors::{DroidClawError, DroidClawResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn new(llm_config: LlmConfig) -> Self {
        Self {
            providers: HashMap::new(),
            active: llm_config.active_provider.clone(),
            llm_config,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> DroidClawResult<Arc<dyn LlmProvider>> {
        self.providers.get(&self.active).cloned().ok_or_else(|| {
            DroidClawError::Config(format!("Active provider '{}' not found in registry", self.active))
        })
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Return the provider and call configuration for a named agent role.
    ///
    /// Role resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. Fallback: active provider with its default model / temperature, non-streaming
    pub fn call_config_for_role(&self, role: &str) -> DroidClawResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let role_entry = match role {
            "tools" => self.llm_config.roles.tools.as_ref(),
            other => {
                tracing::warn!(role = other, "unknown role, falling back to active provider");
                None
            }
        };

        if let Some(entry) = role_entry {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                DroidClawError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role, entry.provider
                ))
            })?;
            let provider_entry = self.llm_config.providers.get(&entry.provider);
            let temperature = entry
                .temperature
                .or_else(|| provider_entry.map(|p| p.temperature))
                .unwrap_or(0.1);
            let max_tokens = provider_entry.map(|p| p.max_tokens).unwrap_or(2000);
            tracing::debug!(
                role = role,
                provider = %entry.provider,
                model = %entry.model,
                stream = entry.stream,
                temperature = temperature,
                "resolved role config"
            );
            return Ok((
                provider,
                CallConfig {
                    model: entry.model.clone(),
                    stream: entry.stream,
                    temperature,
                    max_tokens,
                },
            ));
        }

        let provider = self.get_active()?;
        let (model, temperature, max_tokens) = self
            .llm_config
            .providers
            .get(&self.active)
            .map(|p| (p.model.clone(), p.temperature, p.max_tokens))
            .unwrap_or_else(|| (String::new(), 0.1, 2000));
        tracing::debug!(
            role = role,
            provider = %self.active,
            model = %model,
            "role not configured, using active provider fallback"
        );
        Ok((
            provider,
            CallConfig {
                model,
                stream: false,
                temperature,
                max_tokens,
            },
        ))
    }

    /// Build a registry from the loaded LLM config.
    /// API keys are read from `DROIDCLAW_<ID>_API_KEY`, then `OPENAI_API_KEY`
    /// for the `openai` provider, then the config file.
    pub fn from_config(config: &LlmConfig) -> DroidClawResult<Self> {
        let mut registry = Self::new(config.clone());
        let timeout = Duration::from_secs(config.request_timeout_secs);
        for (id, entry) in &config.providers {
            let api_key = resolve_api_key(id, entry.api_key.as_deref(), |name| std::env::var(name).ok());
            let provider = OpenAiCompatibleProvider::new(
                id.clone(),
                chat_endpoint(&entry.api_base),
                api_key,
                timeout,
            )?;
            registry.register(Arc::new(provider));
        }
        tracing::debug!(providers = ?registry.list_names(), active = %registry.active, "provider registry ready");
        Ok(registry)
    }
}

fn resolve_api_key(id: &str, configured: Option<&str>, env: impl Fn(&str) -> Option<String>) -> String {
    env(&format!("DROIDCLAW_{}_API_KEY", id.to_uppercase()))
        .or_else(|| (id == "openai").then(|| env("OPENAI_API_KEY")).flatten())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderEntry, RoleEntry};

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn api_key_precedence() {
        let both = env_of(&[("DROIDCLAW_OPENAI_API_KEY", "a"), ("OPENAI_API_KEY", "b")]);
        assert_eq!(resolve_api_key("openai", Some("c"), both), "a");

        let generic = env_of(&[("OPENAI_API_KEY", "b")]);
        assert_eq!(resolve_api_key("openai", Some("c"), generic), "b");

        let generic = env_of(&[("OPENAI_API_KEY", "b")]);
        assert_eq!(resolve_api_key("local", Some("c"), generic), "c");

        assert_eq!(resolve_api_key("local", None, env_of(&[])), "");
    }

    fn config_with_local() -> LlmConfig {
        let mut cfg = LlmConfig::default();
        cfg.providers.insert(
            "local".into(),
            ProviderEntry {
                display_name: "Local".into(),
                api_base: "http://localhost:11434/v1".into(),
                model: "qwen2.5".into(),
                temperature: 0.3,
                max_tokens: 512,
                api_key: None,
            },
        );
        cfg
    }

    #[test]
    fn role_falls_back_to_active_provider() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default()).unwrap();
        let (provider, cfg) = registry.call_config_for_role("tools").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert!(!cfg.stream);
    }

    #[test]
    fn configured_role_wins() {
        let mut llm = config_with_local();
        llm.roles.tools = Some(RoleEntry {
            provider: "local".into(),
            model: "llama3.1".into(),
            stream: true,
            temperature: None,
        });
        let registry = ProviderRegistry::from_config(&llm).unwrap();
        let (provider, cfg) = registry.call_config_for_role("tools").unwrap();
        assert_eq!(provider.name(), "local");
        assert_eq!(cfg.model, "llama3.1");
        assert!(cfg.stream);
        assert_eq!(cfg.temperature, 0.3);
        assert_eq!(cfg.max_tokens, 512);
    }

    #[test]
    fn unknown_role_provider_is_config_error() {
        let mut llm = LlmConfig::default();
        llm.roles.tools = Some(RoleEntry {
            provider: "missing".into(),
            model: "x".into(),
            stream: false,
            temperature: None,
        });
        let registry = ProviderRegistry::from_config(&llm).unwrap();
        assert!(matches!(
            registry.call_config_for_role("tools"),
            Err(DroidClawError::Config(_))
        ));
    }
}
