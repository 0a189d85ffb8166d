//! Short mnemonic tokens for canonical command names.

use std::collections::HashMap;

use super::CommandRegistry;

/// Aliases shipped with the userbot.
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("h", "help"),
    ("p", "ping"),
    ("i", "info"),
    ("s", "stats"),
    ("up", "uptime"),
    ("system", "sys"),
    ("e", "echo"),
    ("c", "calc"),
    ("t", "time"),
    ("n", "nexus"),
    ("inst", "install"),
    ("pl", "plugins"),
];

/// Maps alias tokens to canonical command names.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    aliases: HashMap<String, String>,
}

impl AliasResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver from `(alias, canonical)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let aliases = pairs
            .iter()
            .map(|(alias, target)| ((*alias).to_lowercase(), (*target).to_owned()))
            .collect();
        Self { aliases }
    }

    /// Adds or replaces an alias.
    pub fn insert(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.aliases
            .insert(alias.into().to_lowercase(), canonical.into());
    }

    /// Resolves `token` to its canonical name, or returns it unchanged.
    #[must_use]
    pub fn resolve(&self, token: &str) -> String {
        self.aliases
            .get(token)
            .cloned()
            .unwrap_or_else(|| token.to_owned())
    }

    /// Aliases whose target is not registered in `registry`.
    #[must_use]
    pub fn dangling(&self, registry: &CommandRegistry) -> Vec<(String, String)> {
        let mut dangling: Vec<_> = self
            .aliases
            .iter()
            .filter(|(_, target)| !registry.contains(target))
            .map(|(alias, target)| (alias.clone(), target.clone()))
            .collect();
        dangling.sort();
        dangling
    }

    /// Aliases pointing at `canonical`, sorted.
    #[must_use]
    pub fn aliases_for(&self, canonical: &str) -> Vec<&str> {
        let mut found: Vec<&str> = self
            .aliases
            .iter()
            .filter(|(_, target)| target.as_str() == canonical)
            .map(|(alias, _)| alias.as_str())
            .collect();
        found.sort_unstable();
        found
    }

    /// Number of aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether no aliases are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_aliases_resolve() {
        let resolver = AliasResolver::from_pairs(DEFAULT_ALIASES);
        for (alias, target) in DEFAULT_ALIASES {
            assert_eq!(resolver.resolve(alias), *target);
        }
    }

    #[test]
    fn test_unknown_token_passes_through() {
        let resolver = AliasResolver::from_pairs(DEFAULT_ALIASES);
        assert_eq!(resolver.resolve("bogus"), "bogus");
        assert_eq!(resolver.resolve("ping"), "ping");
    }

    #[test]
    fn test_insert_lowercases_alias() {
        let mut resolver = AliasResolver::new();
        resolver.insert("PP", "ping");
        assert_eq!(resolver.resolve("pp"), "ping");
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn test_aliases_for() {
        let resolver = AliasResolver::from_pairs(&[("h", "help"), ("?", "help"), ("p", "ping")]);
        assert_eq!(resolver.aliases_for("help"), ["?", "h"]);
        assert!(resolver.aliases_for("calc").is_empty());
    }
}
