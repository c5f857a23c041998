use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::EventError;

/// A host name in its canonical ASCII form.
///
/// Internationalized labels are stored punycode encoded (`🏹.to` becomes
/// `xn--kn8h.to`) and ASCII letters are lowercased, so two identifiers are
/// equal exactly when they name the same domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainIdentifier(String);

impl DomainIdentifier {
    /// Parse and canonicalize a host name.
    ///
    /// Applies UTS #46 lookup processing with the STD3 ASCII rules and hyphen
    /// checks: labels with characters such as `*`, `_` or spaces, or labels
    /// starting or ending with `-`, are rejected. No DNS lookup is performed.
    pub fn parse(raw: &str) -> Result<Self, EventError> {
        if raw.is_empty() {
            return Err(EventError::InvalidDomain(String::new()));
        }

        idna::domain_to_ascii_strict(raw)
            .map(Self)
            .map_err(|_| EventError::InvalidDomain(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DomainIdentifier {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DomainIdentifier {
    type Error = EventError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DomainIdentifier> for String {
    fn from(domain: DomainIdentifier) -> Self {
        domain.0
    }
}

impl AsRef<str> for DomainIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_domains() {
        let invalid = [
            "mydomain*com",
            "123domain!",
            "_invalid-domain.com",
            "space domain.com",
            "special@character.com",
            "my domain .com",
            "domain#invalid.com",
            "-hyphenstart.com",
            "domain_with_underscores-.com",
            "",
        ];

        for raw in invalid {
            let result = DomainIdentifier::parse(raw);
            assert!(
                matches!(result, Err(EventError::InvalidDomain(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_accepts_valid_domains() {
        let valid = [
            "alphabets123.com",
            "my-domain-name.com",
            "1234example.net",
            "tech-geeks.org",
            "secure-site.info",
            "creative-web.dev",
            "e-commerce-site.store",
            "travel-experts.travel",
            "xn--kn8h.to",
        ];

        for raw in valid {
            let domain = DomainIdentifier::parse(raw).unwrap();
            assert_eq!(domain.as_str(), raw);
        }
    }

    #[test]
    fn test_internationalized_domain_is_punycode_encoded() {
        let domain = DomainIdentifier::parse("🏹.to").unwrap();
        assert_eq!(domain.to_string(), "xn--kn8h.to");
    }

    #[test]
    fn test_uppercase_is_canonicalized() {
        let upper = DomainIdentifier::parse("MySite.COM").unwrap();
        let lower = DomainIdentifier::parse("mysite.com").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        for raw in ["🏹.to", "Example.ORG", "tech-geeks.org"] {
            let once = DomainIdentifier::parse(raw).unwrap();
            let twice = DomainIdentifier::parse(&once.to_string()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_serde_uses_canonical_form() {
        let domain = DomainIdentifier::parse("🏹.to").unwrap();
        let json = serde_json::to_string(&domain).unwrap();
        assert_eq!(json, "\"xn--kn8h.to\"");

        let back: DomainIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, domain);

        assert!(serde_json::from_str::<DomainIdentifier>("\"-bad.com\"").is_err());
    }
}
