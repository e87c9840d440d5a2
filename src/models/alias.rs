//! Model alias resolution.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Provider prepended to bare model names that match no alias.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Separator between provider and model name in a canonical identifier.
pub const PROVIDER_SEPARATOR: char = '/';

/// Known shorthands, lowercased, and the canonical identifier each maps to.
const ALIASES: &[(&str, &str)] = &[
    // OpenAI
    ("gpt4o", "openai/gpt-4o"),
    ("gpt-4o", "openai/gpt-4o"),
    ("4o", "openai/gpt-4o"),
    ("gpt4o-mini", "openai/gpt-4o-mini"),
    ("gpt-4o-mini", "openai/gpt-4o-mini"),
    ("4o-mini", "openai/gpt-4o-mini"),
    ("gpt4", "openai/gpt-4"),
    ("gpt-4", "openai/gpt-4"),
    ("gpt4-turbo", "openai/gpt-4-turbo"),
    ("gpt-4-turbo", "openai/gpt-4-turbo"),
    ("gpt35", "openai/gpt-3.5-turbo"),
    ("gpt-3.5", "openai/gpt-3.5-turbo"),
    ("gpt-3.5-turbo", "openai/gpt-3.5-turbo"),
    ("chatgpt", "openai/gpt-3.5-turbo"),
    // Anthropic
    ("claude", "anthropic/claude-3.5-sonnet"),
    ("sonnet", "anthropic/claude-3.5-sonnet"),
    ("claude-sonnet", "anthropic/claude-3.5-sonnet"),
    ("claude-3.5-sonnet", "anthropic/claude-3.5-sonnet"),
    ("opus", "anthropic/claude-3-opus"),
    ("claude-opus", "anthropic/claude-3-opus"),
    ("claude-3-opus", "anthropic/claude-3-opus"),
    ("haiku", "anthropic/claude-3-haiku"),
    ("claude-haiku", "anthropic/claude-3-haiku"),
    ("claude-3-haiku", "anthropic/claude-3-haiku"),
    // Google
    ("gemini", "google/gemini-pro-1.5"),
    ("gemini-pro", "google/gemini-pro-1.5"),
    ("gemini-flash", "google/gemini-flash-1.5"),
    // Meta
    ("llama", "meta-llama/llama-3.1-70b-instruct"),
    ("llama3", "meta-llama/llama-3.1-70b-instruct"),
    ("llama-3.1-70b", "meta-llama/llama-3.1-70b-instruct"),
    // Mistral
    ("mistral", "mistralai/mistral-large"),
    ("mistral-large", "mistralai/mistral-large"),
];

static ALIAS_MAP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| ALIASES.iter().copied().collect());

/// Resolve a caller-supplied model string to the identifier sent upstream.
///
/// Aliases match case-insensitively. Anything else that already names a
/// provider is returned unchanged; a bare name gets [`DEFAULT_PROVIDER`].
pub fn resolve(raw: &str) -> String {
    if let Some(canonical) = ALIAS_MAP.get(raw.to_lowercase().as_str()) {
        return (*canonical).to_string();
    }

    if raw.contains(PROVIDER_SEPARATOR) {
        return raw.to_string();
    }

    format!("{}{}{}", DEFAULT_PROVIDER, PROVIDER_SEPARATOR, raw)
}

/// All known aliases and their targets, in declaration order.
pub fn aliases() -> &'static [(&'static str, &'static str)] {
    ALIASES
}
