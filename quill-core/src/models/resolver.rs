//! `provider/model` identifier parsing and resolution.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use super::presets::builtin_presets;
use super::{Backend, ModelDescriptor};

/// A parsed model reference. `provider/id` with both parts non-empty is
/// explicit; a bare `id` leaves the provider to the caller's default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: Option<String>,
    pub id: String,
}

impl ModelRef {
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::InvalidReference(input.to_string()));
        }

        match trimmed.split_once('/') {
            None => Ok(Self {
                provider: None,
                id: trimmed.to_string(),
            }),
            Some((provider, id)) => {
                if provider.is_empty() || id.is_empty() || id.contains('/') {
                    return Err(ResolveError::InvalidReference(input.to_string()));
                }
                Ok(Self {
                    provider: Some(provider.to_string()),
                    id: id.to_string(),
                })
            }
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{provider}/{}", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub provider: String,
    pub descriptor: Arc<ModelDescriptor>,
}

impl ResolvedModel {
    /// Canonical `provider/id` form; re-parsing this reaches the same
    /// descriptor.
    pub fn canonical(&self) -> String {
        format!("{}/{}", self.provider, self.descriptor.id)
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid model reference '{0}': expected 'provider/model' or a bare model id")]
    InvalidReference(String),

    #[error("unknown model '{reference}'. Available: {available}")]
    UnknownModel {
        reference: String,
        available: String,
    },

    #[error("no provider given for '{0}' and no default provider configured")]
    NoProvider(String),
}

struct ProviderEntry {
    backend: Backend,
    /// alias (stable id or shorthand) -> descriptor. Insertion-ordered so
    /// the catalogue enumerates deterministically.
    aliases: IndexMap<String, Arc<ModelDescriptor>>,
}

/// Maps `provider/model` identifiers to descriptors. Seeded with the
/// built-in catalogue; additional aliases may be registered on top.
pub struct ModelResolver {
    providers: IndexMap<String, ProviderEntry>,
}

impl Default for ModelResolver {
    fn default() -> Self {
        Self::with_builtin_catalogue()
    }
}

impl ModelResolver {
    pub fn empty() -> Self {
        Self {
            providers: IndexMap::new(),
        }
    }

    pub fn with_builtin_catalogue() -> Self {
        let mut resolver = Self::empty();
        for entry in builtin_presets() {
            resolver.register(entry.descriptor.clone());
            for alias in entry.aliases {
                resolver.register_alias(entry.descriptor.backend, alias, &entry.descriptor.id);
            }
        }
        resolver
    }

    /// Register a descriptor under its stable id for its backend provider.
    pub fn register(&mut self, descriptor: Arc<ModelDescriptor>) {
        let provider = self
            .providers
            .entry(descriptor.backend.as_str().to_string())
            .or_insert_with(|| ProviderEntry {
                backend: descriptor.backend,
                aliases: IndexMap::new(),
            });
        provider
            .aliases
            .insert(descriptor.id.clone(), descriptor);
    }

    /// Register a shorthand alias for an already-registered model. Unknown
    /// targets are ignored; the alias map stays many-to-one.
    pub fn register_alias(&mut self, backend: Backend, alias: &str, target_id: &str) {
        if let Some(provider) = self.providers.get_mut(backend.as_str()) {
            if let Some(descriptor) = provider.aliases.get(target_id).cloned() {
                provider.aliases.insert(alias.to_string(), descriptor);
            }
        }
    }

    pub fn backend_of(&self, provider: &str) -> Option<Backend> {
        self.providers.get(provider).map(|entry| entry.backend)
    }

    /// The default model for a provider, when one is flagged.
    pub fn default_for(&self, provider: &str) -> Option<ResolvedModel> {
        let entry = self.providers.get(provider)?;
        entry
            .aliases
            .values()
            .find(|descriptor| descriptor.is_default)
            .map(|descriptor| ResolvedModel {
                provider: provider.to_string(),
                descriptor: descriptor.clone(),
            })
    }

    /// Resolve a reference. Precedence: exact `provider/id` alias, then the
    /// default provider when the reference is bare, then an error that
    /// enumerates what is available.
    pub fn resolve(
        &self,
        reference: &ModelRef,
        default_provider: Option<&str>,
    ) -> Result<ResolvedModel, ResolveError> {
        let provider_name = match &reference.provider {
            Some(provider) => provider.as_str(),
            None => default_provider
                .ok_or_else(|| ResolveError::NoProvider(reference.id.clone()))?,
        };

        if let Some(entry) = self.providers.get(provider_name) {
            if let Some(descriptor) = entry.aliases.get(&reference.id) {
                return Ok(ResolvedModel {
                    provider: provider_name.to_string(),
                    descriptor: descriptor.clone(),
                });
            }
        }

        Err(ResolveError::UnknownModel {
            reference: reference.to_string(),
            available: self.catalogue_summary(),
        })
    }

    /// Parse and resolve in one step.
    pub fn resolve_str(
        &self,
        input: &str,
        default_provider: Option<&str>,
    ) -> Result<ResolvedModel, ResolveError> {
        let reference = ModelRef::parse(input)?;
        self.resolve(&reference, default_provider)
    }

    fn catalogue_summary(&self) -> String {
        let mut parts = Vec::new();
        for (provider, entry) in &self.providers {
            // Stable ids only; shorthand aliases would clutter the message.
            let ids: Vec<&str> = entry
                .aliases
                .iter()
                .filter(|(alias, descriptor)| alias.as_str() == descriptor.id)
                .map(|(alias, _)| alias.as_str())
                .collect();
            parts.push(format!("{provider}: {}", ids.join(", ")));
        }
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_explicit_reference() {
        let parsed = ModelRef::parse("gemini/gemini-2.5-flash").unwrap();
        assert_eq!(parsed.provider.as_deref(), Some("gemini"));
        assert_eq!(parsed.id, "gemini-2.5-flash");
    }

    #[test]
    fn parse_bare_reference() {
        let parsed = ModelRef::parse("gpt-4.1").unwrap();
        assert_eq!(parsed.provider, None);
        assert_eq!(parsed.id, "gpt-4.1");
    }

    #[test]
    fn parse_rejects_malformed_shapes() {
        assert!(ModelRef::parse("").is_err());
        assert!(ModelRef::parse("/flash").is_err());
        assert!(ModelRef::parse("gemini/").is_err());
        assert!(ModelRef::parse("a/b/c").is_err());
    }

    #[test]
    fn resolves_exact_alias() {
        let resolver = ModelResolver::default();
        let resolved = resolver
            .resolve_str("gemini/gemini-2.5-flash", None)
            .unwrap();
        assert_eq!(resolved.provider, "gemini");
        assert_eq!(resolved.descriptor.id, "gemini-2.5-flash");
    }

    #[test]
    fn resolves_shorthand_alias() {
        let resolver = ModelResolver::default();
        let resolved = resolver.resolve_str("gemini/flash", None).unwrap();
        assert_eq!(resolved.descriptor.id, "gemini-2.5-flash");
    }

    #[test]
    fn bare_id_uses_default_provider() {
        let resolver = ModelResolver::default();
        let resolved = resolver.resolve_str("gpt-4.1", Some("openai")).unwrap();
        assert_eq!(resolved.provider, "openai");
        assert_eq!(resolved.descriptor.id, "gpt-4.1");
    }

    #[test]
    fn bare_id_without_default_provider_fails() {
        let resolver = ModelResolver::default();
        let err = resolver.resolve_str("gpt-4.1", None).unwrap_err();
        assert!(matches!(err, ResolveError::NoProvider(_)));
    }

    #[test]
    fn unknown_model_error_enumerates_catalogue() {
        let resolver = ModelResolver::default();
        let err = resolver.resolve_str("gemini/nope", None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("gemini:"));
        assert!(message.contains("gemini-2.5-flash"));
        assert!(message.contains("openai:"));
    }

    #[test]
    fn canonical_form_round_trips() {
        let resolver = ModelResolver::default();
        let resolved = resolver.resolve_str("gemini/flash", None).unwrap();
        let again = resolver.resolve_str(&resolved.canonical(), None).unwrap();
        assert_eq!(again.descriptor, resolved.descriptor);
    }

    #[test]
    fn default_model_is_flagged_per_provider() {
        let resolver = ModelResolver::default();
        let gemini_default = resolver.default_for("gemini").unwrap();
        assert_eq!(gemini_default.descriptor.id, "gemini-2.5-flash");
        let openai_default = resolver.default_for("openai").unwrap();
        assert_eq!(openai_default.descriptor.id, "gpt-4.1");
    }
}
