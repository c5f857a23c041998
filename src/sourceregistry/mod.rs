//! Source registry
//!
//! Decides which domains may report events. Unregistered sources are
//! rejected before anything reaches the event store.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::event::{DomainIdentifier, EventError};

#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// Whether `domain` is allowed to report events
    async fn is_source_registered(&self, domain: &DomainIdentifier) -> Result<bool>;
}

/// Registry backed by a fixed set of domains, loaded once at startup
#[derive(Debug, Clone)]
pub struct StaticSourceRegistry {
    sources: HashSet<DomainIdentifier>,
}

impl StaticSourceRegistry {
    pub fn new(sources: impl IntoIterator<Item = DomainIdentifier>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
        }
    }

    /// Parse a comma separated list of domains, e.g. `example.com,mysite.org`
    ///
    /// Every entry goes through the same canonicalization as pageview hosts
    /// so lookups compare canonical forms.
    pub fn parse_list(raw: &str) -> Result<Vec<DomainIdentifier>, EventError> {
        raw.split(',')
            .map(str::trim)
            .map(DomainIdentifier::parse)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl SourceRegistry for StaticSourceRegistry {
    async fn is_source_registered(&self, domain: &DomainIdentifier) -> Result<bool> {
        Ok(self.sources.contains(domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(raw: &str) -> DomainIdentifier {
        DomainIdentifier::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_registered_source() {
        let sources = StaticSourceRegistry::parse_list("example.org,example.com").unwrap();
        let registry = StaticSourceRegistry::new(sources);

        assert_eq!(registry.len(), 2);
        assert!(registry.is_source_registered(&domain("example.com")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unregistered_source() {
        let registry = StaticSourceRegistry::new([domain("notexample.com")]);

        assert!(!registry.is_source_registered(&domain("example.com")).await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_uses_canonical_form() {
        let sources = StaticSourceRegistry::parse_list("MySite.com, 🏹.to").unwrap();
        let registry = StaticSourceRegistry::new(sources);

        assert!(registry.is_source_registered(&domain("mysite.com")).await.unwrap());
        assert!(registry.is_source_registered(&domain("xn--kn8h.to")).await.unwrap());
    }

    #[test]
    fn test_parse_list_rejects_invalid_entries() {
        assert!(StaticSourceRegistry::parse_list("").is_err());
        assert!(StaticSourceRegistry::parse_list("example.com,,mysite.org").is_err());
        assert!(StaticSourceRegistry::parse_list("example.com,bad*domain").is_err());
    }
}
