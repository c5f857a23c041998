use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use super::{DomainIdentifier, EventError};
use crate::uaparser::ClientDescriptor;

/// One recorded visit to a path on a tracked domain.
///
/// The timestamp is taken from the server clock at construction, never from
/// the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageviewEvent {
    timestamp: DateTime<Utc>,
    domain: DomainIdentifier,
    path: String,
    client: ClientDescriptor,
}

impl PageviewEvent {
    /// Build a pageview for the page at `page_url`.
    ///
    /// Fails with [`EventError::InvalidDomain`] when the URL host is not a
    /// valid domain name. The path is kept as the URL reports it.
    pub fn new(page_url: &Url, client: ClientDescriptor) -> Result<Self, EventError> {
        let domain = DomainIdentifier::parse(page_url.host_str().unwrap_or_default())?;

        Ok(Self {
            timestamp: Utc::now(),
            domain,
            path: page_url.path().to_string(),
            client,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn domain(&self) -> &DomainIdentifier {
        &self.domain
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client(&self) -> &ClientDescriptor {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chrome_on_windows() -> ClientDescriptor {
        ClientDescriptor {
            operating_system: "Windows".to_string(),
            browser_family: "Chrome".to_string(),
            device: "Other".to_string(),
        }
    }

    #[test]
    fn test_new_pageview() {
        let before = Utc::now();
        let url = Url::parse("https://MySite.com/blog/post-1?utm_source=x#top").unwrap();
        let pageview = PageviewEvent::new(&url, chrome_on_windows()).unwrap();

        assert_eq!(pageview.domain().as_str(), "mysite.com");
        assert_eq!(pageview.path(), "/blog/post-1");
        assert_eq!(pageview.client(), &chrome_on_windows());
        assert!(pageview.timestamp() >= before);
        assert!(pageview.timestamp() <= Utc::now());
    }

    #[test]
    fn test_new_pageview_internationalized_host() {
        let url = Url::parse("https://🏹.to/").unwrap();
        let pageview = PageviewEvent::new(&url, ClientDescriptor::other()).unwrap();

        assert_eq!(pageview.domain().as_str(), "xn--kn8h.to");
        assert_eq!(pageview.path(), "/");
    }

    #[test]
    fn test_new_pageview_rejects_invalid_host() {
        let url = Url::parse("https://domain_with_underscores-.com/").unwrap();
        let result = PageviewEvent::new(&url, ClientDescriptor::other());
        assert!(matches!(result, Err(EventError::InvalidDomain(_))));
    }

    #[test]
    fn test_new_pageview_rejects_missing_host() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        let result = PageviewEvent::new(&url, ClientDescriptor::other());
        assert!(matches!(result, Err(EventError::InvalidDomain(_))));
    }
}
