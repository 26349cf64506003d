//! Cache scope tags and deterministic key derivation.
//!
//! A cache key is a SHA-256 digest of `(provider, model, prompt)`. The
//! provider is a closed tag so `"OpenAI"` and `"openai"` can never land in
//! different scopes by accident; unknown providers fall back to
//! [`Provider::Other`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// LLM provider a cached response belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
    DeepSeek,
    /// Any provider without a dedicated variant, stored lower-cased.
    Other(String),
}

impl Provider {
    /// Canonical lower-case name, also used in key derivation.
    pub fn as_str(&self) -> &str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::Ollama => "ollama",
            Provider::DeepSeek => "deepseek",
            Provider::Other(name) => name,
        }
    }

    /// Re-resolve a hand-built [`Provider::Other`] so it maps to the same
    /// variant the parser would produce.
    pub fn normalized(self) -> Self {
        match self {
            Provider::Other(name) => Provider::from(name.as_str()),
            known => known,
        }
    }
}

impl From<&str> for Provider {
    fn from(raw: &str) -> Self {
        let name = raw.trim().to_ascii_lowercase();
        match name.as_str() {
            "openai" | "open-ai" | "open_ai" => Provider::OpenAi,
            "anthropic" | "claude" => Provider::Anthropic,
            "gemini" | "google" => Provider::Gemini,
            "ollama" => Provider::Ollama,
            "deepseek" => Provider::DeepSeek,
            _ => Provider::Other(name),
        }
    }
}

impl From<String> for Provider {
    fn from(raw: String) -> Self {
        Provider::from(raw.as_str())
    }
}

impl From<Provider> for String {
    fn from(provider: Provider) -> Self {
        provider.as_str().to_string()
    }
}

impl FromStr for Provider {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Provider::from(s))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(provider, model)` partition. Entries never match across scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    provider: Provider,
    model: String,
}

impl Scope {
    /// Provider and model are normalized here; there is no other way to build a scope.
    pub fn new(provider: impl Into<Provider>, model: impl AsRef<str>) -> Self {
        Self {
            provider: provider.into().normalized(),
            model: model.as_ref().trim().to_string(),
        }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Derive the cache key for `prompt` within `scope`.
///
/// Uses length-prefixed encoding so field boundaries cannot be forged
/// (e.g. `model="a|b"` vs `model="a"` with a prompt starting `"|b"`).
pub fn derive_key(scope: &Scope, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [scope.provider.as_str(), scope.model.as_str(), prompt] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// First 8 characters of a key, for log fields.
pub(crate) fn short_key(key: &str) -> &str {
    match key.char_indices().nth(8) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_deterministic() {
        let scope = Scope::new("openai", "gpt-4o");
        assert_eq!(derive_key(&scope, "hello"), derive_key(&scope, "hello"));
        assert_eq!(derive_key(&scope, "hello").len(), 64);
    }

    #[test]
    fn test_key_scope_aware() {
        let a = Scope::new("openai", "gpt-4o");
        let b = Scope::new("anthropic", "gpt-4o");
        let c = Scope::new("openai", "gpt-4o-mini");
        let k = derive_key(&a, "hello");
        assert_ne!(k, derive_key(&b, "hello"));
        assert_ne!(k, derive_key(&c, "hello"));
    }

    #[test]
    fn test_key_prompt_aware() {
        let scope = Scope::new("ollama", "llama3");
        assert_ne!(derive_key(&scope, "hello"), derive_key(&scope, "goodbye"));
    }

    #[test]
    fn test_key_no_separator_collision() {
        let k1 = derive_key(&Scope::new("openai", "a|b"), "c");
        let k2 = derive_key(&Scope::new("openai", "a"), "|bc");
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_provider_parsing_normalizes() {
        assert_eq!(Provider::from(" OpenAI "), Provider::OpenAi);
        assert_eq!(Provider::from("claude"), Provider::Anthropic);
        assert_eq!(Provider::from("Google"), Provider::Gemini);
        assert_eq!(
            Provider::from("Mistral"),
            Provider::Other("mistral".to_string())
        );
    }

    #[test]
    fn test_equivalent_spellings_share_keys() {
        let a = Scope::new("OpenAI", " gpt-4o ");
        let b = Scope::new("openai", "gpt-4o");
        assert_eq!(a, b);
        assert_eq!(derive_key(&a, "p"), derive_key(&b, "p"));
    }

    #[test]
    fn test_hand_built_other_provider_is_normalized() {
        let raw = Scope::new(Provider::Other("OpenAI".into()), "gpt-4o\n");
        let parsed = Scope::new("openai", "gpt-4o");
        assert_eq!(raw.provider(), &Provider::OpenAi);
        assert_eq!(raw.model(), "gpt-4o");
        assert_eq!(derive_key(&raw, "p"), derive_key(&parsed, "p"));

        let custom = Scope::new(Provider::Other(" Mistral ".into()), "large");
        assert_eq!(custom.provider(), &Provider::Other("mistral".into()));
    }

    #[test]
    fn test_provider_serde_as_string() {
        let json = serde_json::to_string(&Provider::Anthropic).unwrap();
        assert_eq!(json, "\"anthropic\"");
        let back: Provider = serde_json::from_str("\"Together\"").unwrap();
        assert_eq!(back, Provider::Other("together".into()));
    }

    #[test]
    fn test_short_key_handles_short_input() {
        assert_eq!(short_key("abc"), "abc");
        assert_eq!(short_key("0123456789"), "01234567");
    }
}
