use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

use super::{DomainIdentifier, EventError};

const DIRECT: &str = "direct";

/// Where a visitor came from.
///
/// An absent referrer is a first-class value: clients with referrer sending
/// disabled or direct navigations are `Direct`, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferrerIdentifier {
    Direct,
    Domain(DomainIdentifier),
}

impl ReferrerIdentifier {
    /// Parse a raw referrer header value.
    ///
    /// Empty input is [`ReferrerIdentifier::Direct`]. Anything else must be an
    /// absolute URL whose host is a valid domain name.
    pub fn parse(raw: &str) -> Result<Self, EventError> {
        if raw.is_empty() {
            return Ok(Self::Direct);
        }

        let url = Url::parse(raw)?;
        let host = url.host_str().unwrap_or_default();

        DomainIdentifier::parse(host).map(Self::Domain)
    }

    pub fn domain(&self) -> Option<&DomainIdentifier> {
        match self {
            Self::Direct => None,
            Self::Domain(domain) => Some(domain),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Direct => DIRECT,
            Self::Domain(domain) => domain.as_str(),
        }
    }
}

impl fmt::Display for ReferrerIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReferrerIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
