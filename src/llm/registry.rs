//! Registry of named [`AiProvider`]s plus the runtime's current model
//! selection.

use crate::error::{AppError, Result};
use crate::llm::provider::AiProvider;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::warn;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid regex"))
}

fn validate_name(name: &str) -> Result<()> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "provider name '{name}' must start with a letter and contain only letters, digits, '_' or '-'"
        )))
    }
}

/// The provider + model a conversation is currently configured to use.
#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub provider: String,
    pub model: String,
}

/// Registry of named providers, with an optional default selection.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn AiProvider>>,
    default_selection: Option<ModelSelection>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_selection: None,
        }
    }

    /// Register a provider under `name`. Names must match
    /// `^[A-Za-z][A-Za-z0-9_-]*$`.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn AiProvider>) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Remove a provider from the registry. If it was the current default
    /// selection, the selection is cleared rather than left dangling.
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn AiProvider>> {
        let removed = self.providers.remove(name);
        if removed.is_some() && self.default_selection.as_ref().is_some_and(|s| s.provider == name) {
            self.default_selection = None;
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AiProvider>> {
        self.providers.get(name)
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }

    /// Number of providers currently registered.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry has a usable default selection right now: a
    /// provider has been chosen and that provider is still registered.
    pub fn is_configured(&self) -> bool {
        self.default_selection
            .as_ref()
            .is_some_and(|selection| self.providers.contains_key(&selection.provider))
    }

    /// Whether `name` (or the default selection, if `name` is `None`)
    /// supports real token streaming.
    pub fn supports_streaming(&self, name: Option<&str>) -> Result<bool> {
        let resolved = match name {
            Some(name) => name.to_string(),
            None => {
                self.default_selection
                    .as_ref()
                    .ok_or_else(|| AppError::Configuration("no default provider selected".into()))?
                    .provider
                    .clone()
            }
        };
        self.get(&resolved)
            .map(|provider| provider.supports_streaming())
            .ok_or_else(|| AppError::Configuration(format!("provider '{resolved}' is not registered")))
    }

    /// Close every registered provider, logging (but not failing on) any
    /// close error, then drop them all and clear the current selection.
    pub async fn dispose(&mut self) {
        for (name, provider) in self.providers.drain() {
            if let Err(err) = provider.close().await {
                warn!(provider = %name, error = %err, "provider failed to close cleanly");
            }
        }
        self.default_selection = None;
    }

    /// Providers whose name matches `pattern` (a regular expression, not a
    /// glob).
    pub fn providers_matching(&self, pattern: &str) -> Result<Vec<&str>> {
        let re = Regex::new(pattern)
            .map_err(|e| AppError::Validation(format!("invalid provider name pattern: {e}")))?;
        Ok(self
            .providers
            .keys()
            .filter(|name| re.is_match(name))
            .map(|s| s.as_str())
            .collect())
    }

    pub fn set_default_selection(&mut self, selection: ModelSelection) -> Result<()> {
        if !self.providers.contains_key(&selection.provider) {
            return Err(AppError::Configuration(format!(
                "cannot select unregistered provider '{}'",
                selection.provider
            )));
        }
        self.default_selection = Some(selection);
        Ok(())
    }

    pub fn default_selection(&self) -> Option<&ModelSelection> {
        self.default_selection.as_ref()
    }

    pub fn resolve_default(&self) -> Result<Arc<dyn AiProvider>> {
        let selection = self
            .default_selection
            .as_ref()
            .ok_or_else(|| AppError::Configuration("no default provider selected".into()))?;
        self.get(&selection.provider).cloned().ok_or_else(|| {
            AppError::Configuration(format!(
                "default provider '{}' is no longer registered",
                selection.provider
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{ChatOptions, ChatResponse, FinishReason};
    use crate::types::Message;
    use async_trait::async_trait;

    struct StubProvider(&'static str);

    #[async_trait]
    impl AiProvider for StubProvider {
        fn name(&self) -> &str {
            self.0
        }

        async fn chat(&self, _messages: &[Message], _options: &ChatOptions) -> crate::error::Result<ChatResponse> {
            Ok(ChatResponse {
                content: Some("stub".into()),
                tool_calls: vec![],
                finish_reason: FinishReason::Stop,
            })
        }
    }

    #[test]
    fn rejects_invalid_provider_names() {
        let mut registry = ProviderRegistry::new();
        let err = registry.register("1bad-name", Arc::new(StubProvider("x"))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn accepts_well_formed_names_and_resolves_lookups() {
        let mut registry = ProviderRegistry::new();
        registry.register("openai-prod", Arc::new(StubProvider("openai-prod"))).unwrap();
        assert!(registry.has_provider("openai-prod"));
    }

    #[test]
    fn providers_matching_filters_by_regex() {
        let mut registry = ProviderRegistry::new();
        registry.register("openai_fast", Arc::new(StubProvider("a"))).unwrap();
        registry.register("openai_slow", Arc::new(StubProvider("b"))).unwrap();
        registry.register("ollama_local", Arc::new(StubProvider("c"))).unwrap();

        let mut matches = registry.providers_matching("^openai_").unwrap();
        matches.sort();
        assert_eq!(matches, vec!["openai_fast", "openai_slow"]);
    }

    #[test]
    fn default_selection_requires_registered_provider() {
        let mut registry = ProviderRegistry::new();
        let err = registry
            .set_default_selection(ModelSelection {
                provider: "missing".into(),
                model: "m".into(),
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn remove_clears_the_default_selection_when_it_matches() {
        let mut registry = ProviderRegistry::new();
        registry.register("openai", Arc::new(StubProvider("openai"))).unwrap();
        registry
            .set_default_selection(ModelSelection {
                provider: "openai".into(),
                model: "gpt-test".into(),
            })
            .unwrap();

        let removed = registry.remove("openai");
        assert!(removed.is_some());
        assert!(registry.default_selection().is_none());
        assert!(!registry.has_provider("openai"));
    }

    #[test]
    fn remove_leaves_an_unrelated_selection_intact() {
        let mut registry = ProviderRegistry::new();
        registry.register("openai", Arc::new(StubProvider("openai"))).unwrap();
        registry.register("ollama", Arc::new(StubProvider("ollama"))).unwrap();
        registry
            .set_default_selection(ModelSelection {
                provider: "openai".into(),
                model: "gpt-test".into(),
            })
            .unwrap();

        registry.remove("ollama");
        assert!(registry.default_selection().is_some());
    }

    #[test]
    fn provider_count_reflects_registrations_and_removals() {
        let mut registry = ProviderRegistry::new();
        assert_eq!(registry.provider_count(), 0);
        registry.register("openai", Arc::new(StubProvider("openai"))).unwrap();
        assert_eq!(registry.provider_count(), 1);
        registry.remove("openai");
        assert_eq!(registry.provider_count(), 0);
    }

    #[test]
    fn is_configured_requires_both_a_selection_and_a_live_provider() {
        let mut registry = ProviderRegistry::new();
        assert!(!registry.is_configured());

        registry.register("openai", Arc::new(StubProvider("openai"))).unwrap();
        assert!(!registry.is_configured(), "registering alone does not configure the registry");

        registry
            .set_default_selection(ModelSelection {
                provider: "openai".into(),
                model: "gpt-test".into(),
            })
            .unwrap();
        assert!(registry.is_configured());

        registry.remove("openai");
        assert!(!registry.is_configured());
    }

    #[test]
    fn supports_streaming_reports_false_for_the_stub_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register("openai", Arc::new(StubProvider("openai"))).unwrap();
        assert_eq!(registry.supports_streaming(Some("openai")).unwrap(), false);
    }

    #[test]
    fn supports_streaming_without_a_name_falls_back_to_the_default_selection() {
        let mut registry = ProviderRegistry::new();
        let err = registry.supports_streaming(None).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        registry.register("openai", Arc::new(StubProvider("openai"))).unwrap();
        registry
            .set_default_selection(ModelSelection {
                provider: "openai".into(),
                model: "gpt-test".into(),
            })
            .unwrap();
        assert!(registry.supports_streaming(None).is_ok());
    }

    #[tokio::test]
    async fn dispose_drops_every_provider_and_clears_the_selection() {
        let mut registry = ProviderRegistry::new();
        registry.register("openai", Arc::new(StubProvider("openai"))).unwrap();
        registry
            .set_default_selection(ModelSelection {
                provider: "openai".into(),
                model: "gpt-test".into(),
            })
            .unwrap();

        registry.dispose().await;

        assert_eq!(registry.provider_count(), 0);
        assert!(registry.default_selection().is_none());
    }

    #[test]
    fn resolve_default_returns_the_selected_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register("openai", Arc::new(StubProvider("openai"))).unwrap();
        registry
            .set_default_selection(ModelSelection {
                provider: "openai".into(),
                model: "gpt-test".into(),
            })
            .unwrap();
        let resolved = registry.resolve_default().unwrap();
        assert_eq!(resolved.name(), "openai");
    }
}
