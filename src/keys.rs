//! API key management.
//!
//! Keys come from the environment (`OPENAI_API_KEY`, `GEMINI_API_KEY`,
//! `ANTHROPIC_API_KEY`), are never logged unmasked, and drive both provider
//! availability (health checks, fallback order) and the per-page cost
//! estimates surfaced by `/metrics/`.

use std::collections::HashMap;

use tracing::debug;

use crate::providers::ProviderKind;

/// Estimated vendor cost per escalated page, USD.
///
/// Used for the spend/savings estimates in the tracker; not a billing
/// system. Ordering mirrors the cheapest-first guidance the service gives
/// its operators: gemini < anthropic < openai.
pub fn page_cost_usd(kind: ProviderKind) -> f64 {
    match kind {
        ProviderKind::OpenAi => 0.03,
        ProviderKind::Gemini => 0.01,
        ProviderKind::Anthropic => 0.02,
    }
}

/// Mask an API key for logs and error messages.
///
/// Keeps enough of the prefix/suffix to identify which key is loaded
/// without revealing it.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

/// Per-provider API keys resolved from the environment.
///
/// The `Debug` impl masks key material so the store can appear in logs.
#[derive(Clone, Default)]
pub struct KeyStore {
    keys: HashMap<ProviderKind, String>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (kind, key) in &self.keys {
            map.entry(&kind.as_str(), &mask_key(key));
        }
        map.finish()
    }
}

impl KeyStore {
    /// Load keys from process environment variables.
    pub fn from_env() -> Self {
        let store = Self::from_lookup(|var| std::env::var(var).ok());
        for kind in ProviderKind::ALL {
            if let Some(key) = store.key_for(kind) {
                debug!(provider = %kind, key = %mask_key(key), "API key loaded");
            }
        }
        store
    }

    /// Build a store from an arbitrary lookup function. Seam for tests.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut keys = HashMap::new();
        for kind in ProviderKind::ALL {
            if let Some(value) = lookup(kind.env_var()) {
                let value = value.trim().to_string();
                if !value.is_empty() {
                    keys.insert(kind, value);
                }
            }
        }
        Self { keys }
    }

    pub fn key_for(&self, kind: ProviderKind) -> Option<&str> {
        self.keys.get(&kind).map(String::as_str)
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.keys.contains_key(&kind)
    }

    pub fn any_configured(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Providers with a key present, in fallback order.
    pub fn configured(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|k| self.is_configured(*k))
            .collect()
    }

    /// First provider in the fallback order with a key present.
    pub fn first_configured(&self) -> Option<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .find(|k| self.is_configured(*k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(vars: &[(&str, &str)]) -> KeyStore {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        KeyStore::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn loads_only_present_keys() {
        let store = store_with(&[("GEMINI_API_KEY", "AIzaSyExample12345")]);
        assert!(store.is_configured(ProviderKind::Gemini));
        assert!(!store.is_configured(ProviderKind::OpenAi));
        assert_eq!(store.configured(), vec![ProviderKind::Gemini]);
    }

    #[test]
    fn blank_keys_count_as_absent() {
        let store = store_with(&[("OPENAI_API_KEY", "   ")]);
        assert!(!store.any_configured());
        assert!(store.first_configured().is_none());
    }

    #[test]
    fn fallback_order_is_openai_first() {
        let store = store_with(&[
            ("ANTHROPIC_API_KEY", "sk-ant-example-12345"),
            ("OPENAI_API_KEY", "sk-proj-example-12345"),
        ]);
        assert_eq!(store.first_configured(), Some(ProviderKind::OpenAi));
    }

    #[test]
    fn masking_hides_the_middle() {
        let masked = mask_key("sk-proj-abcdefghijklmnop");
        assert!(masked.starts_with("sk-pr"));
        assert!(masked.ends_with("mnop"));
        assert!(!masked.contains("abcdefgh"));
        assert_eq!(mask_key("short"), "****");
    }
}
