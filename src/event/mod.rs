//! Pageview event model
//!
//! Value types built once per inbound request: the tracked domain, the
//! visitor's referrer and the pageview record handed to the event store.
//! Construction is the only validation point, an invalid input never yields
//! a value.

pub mod domain;
pub mod pageview;
pub mod referrer;

use thiserror::Error;

pub use domain::DomainIdentifier;
pub use pageview::PageviewEvent;
pub use referrer::ReferrerIdentifier;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("{0:?} is not a valid domain name")]
    InvalidDomain(String),
    #[error("invalid referrer: {0}")]
    InvalidReferrer(#[from] url::ParseError),
}
