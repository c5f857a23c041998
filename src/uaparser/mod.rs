//! User agent classification
//!
//! Maps a raw `User-Agent` header to the coarse client descriptor stored with
//! each pageview. Classification is total: unrecognized agents degrade to
//! `"Other"` per field instead of failing.
//!
//! Family names follow the ua-parser (uap-core) vocabulary, e.g. `Mac OS X`,
//! `Mobile Safari`, `Chrome Mobile`, so stored values stay comparable with
//! data produced by uap based collectors.

use serde::{Deserialize, Serialize};
use woothee::parser::{Parser, WootheeResult};

const OTHER: &str = "Other";
const UNKNOWN: &str = "UNKNOWN";

/// Client information derived from a user agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientDescriptor {
    /// Operating system family (e.g., "Windows", "Mac OS X", "iOS")
    pub operating_system: String,

    /// Browser family (e.g., "Chrome", "Mobile Safari")
    pub browser_family: String,

    /// Device family (e.g., "iPhone", "Mac", "Other")
    pub device: String,
}

impl ClientDescriptor {
    pub fn other() -> Self {
        Self {
            operating_system: OTHER.to_string(),
            browser_family: OTHER.to_string(),
            device: OTHER.to_string(),
        }
    }
}

pub trait UserAgentClassifier: Send + Sync {
    fn parse_user_agent(&self, user_agent: &str) -> ClientDescriptor;
}

/// Classifier backed by the woothee user agent dataset
pub struct WootheeClassifier {
    parser: Parser,
}

impl WootheeClassifier {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }
}

impl Default for WootheeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl UserAgentClassifier for WootheeClassifier {
    fn parse_user_agent(&self, user_agent: &str) -> ClientDescriptor {
        let Some(result) = self.parser.parse(user_agent) else {
            return ClientDescriptor::other();
        };

        ClientDescriptor {
            operating_system: os_family(result.os).to_string(),
            browser_family: browser_family(&result).to_string(),
            device: device_family(&result, user_agent).to_string(),
        }
    }
}

fn known_or_other(value: &str) -> &str {
    if value.is_empty() || value == UNKNOWN {
        OTHER
    } else {
        value
    }
}

fn is_ios(os: &str) -> bool {
    matches!(os, "iPhone" | "iPad" | "iPod")
}

// woothee reports versioned OS names ("Windows 10"), collapse them to families.
fn os_family(os: &str) -> &str {
    match os {
        os if os.starts_with("Windows") => "Windows",
        "Mac OSX" => "Mac OS X",
        "ChromeOS" => "Chrome OS",
        os if is_ios(os) => "iOS",
        os => known_or_other(os),
    }
}

fn browser_family<'a>(result: &WootheeResult<'a>) -> &'a str {
    // A browser token without a minor version (`Firefox/121.`) is not trusted.
    let version = known_or_other(result.version);
    if version != OTHER && !has_minor_version(version) {
        return OTHER;
    }

    match (result.name, result.os) {
        ("Chrome", "Android") => "Chrome Mobile",
        ("Chrome", os) if is_ios(os) => "Chrome Mobile iOS",
        ("Firefox", "Android") => "Firefox Mobile",
        ("Safari", os) if is_ios(os) => "Mobile Safari",
        ("Internet Explorer", _) => "IE",
        (name, _) => known_or_other(name),
    }
}

fn has_minor_version(version: &str) -> bool {
    version
        .split_once('.')
        .is_some_and(|(major, minor)| {
            !major.is_empty() && minor.starts_with(|c: char| c.is_ascii_digit())
        })
}

fn device_family<'a>(result: &WootheeResult<'a>, user_agent: &'a str) -> &'a str {
    match (result.os, result.category) {
        (os, _) if is_ios(os) => os,
        ("Mac OSX", _) => "Mac",
        (_, "crawler") => "Spider",
        ("Android", _) => android_model(user_agent).unwrap_or(OTHER),
        _ => OTHER,
    }
}

/// Device model following the Android version in the platform comment, e.g.
/// `Pixel 7` in `(Linux; Android 14; Pixel 7 Build/UQ1A)`
fn android_model(user_agent: &str) -> Option<&str> {
    let (_, rest) = user_agent.split_once('(')?;
    let (platform, _) = rest.split_once(')')?;

    let mut tokens = platform.split(';').map(str::trim);
    tokens.find(|token| token.starts_with("Android"))?;

    let model = tokens.next()?;
    let model = model.split(" Build").next().unwrap_or(model).trim();

    match model {
        "" | "wv" | "Mobile" | "Tablet" => None,
        model => Some(model),
    }
}
