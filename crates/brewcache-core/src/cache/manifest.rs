//! Cache generation names and the pre-cache manifest.

use std::fmt;

use reqwest::Url;
use semver::Version;
use serde::{Deserialize, Serialize};

use super::LifecycleError;
use crate::net::FetchError;

/// Default prefix of generation names.
pub const DEFAULT_CACHE_PREFIX: &str = "v60-recipe";

/// Name of one cache generation: `{prefix}-v{semver}`.
///
/// Bumping the version is the only thing that triggers a new install and
/// the eviction of the previous generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheName {
    prefix: String,
    version: Version,
}

impl CacheName {
    pub fn new(prefix: &str, version: &str) -> Result<Self, LifecycleError> {
        let version = Version::parse(version.trim().trim_start_matches('v')).map_err(|source| {
            LifecycleError::InvalidVersion {
                version: version.to_string(),
                source,
            }
        })?;
        Ok(Self {
            prefix: prefix.to_string(),
            version,
        })
    }

    /// Parse a bucket name back into prefix and version, if it follows the
    /// naming convention.
    pub fn parse(name: &str) -> Option<Self> {
        let (prefix, version) = name.rsplit_once("-v")?;
        if prefix.is_empty() {
            return None;
        }
        let version = Version::parse(version).ok()?;
        Some(Self {
            prefix: prefix.to_string(),
            version,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-v{}", self.prefix, self.version)
    }
}

/// What gets fetched and stored when a generation installs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecacheManifest {
    /// App shell, web manifest and icons, relative to the app origin.
    pub assets: Vec<String>,
    /// Font stylesheets. Not pre-fetched: they are cached the first time
    /// they are requested.
    pub font_stylesheets: Vec<String>,
}

impl Default for PrecacheManifest {
    fn default() -> Self {
        Self {
            assets: [
                "./",
                "./index.html",
                "./manifest.json",
                "./icons/favicon.ico",
                "./icons/apple-touch-icon.png",
                "./icons/icon-192.png",
                "./icons/icon-512.png",
                "./icons/icon-maskable-192.png",
                "./icons/icon-maskable-512.png",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            font_stylesheets: vec![
                "https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700&display=swap"
                    .to_string(),
            ],
        }
    }
}

impl PrecacheManifest {
    /// Resolve every asset path against the app's base URL, in order.
    pub fn resolve_assets(&self, base: &Url) -> Result<Vec<Url>, FetchError> {
        self.assets
            .iter()
            .map(|path| base.join(path).map_err(|e| FetchError::invalid_url(path, e)))
            .collect()
    }

    pub fn font_urls(&self) -> Result<Vec<Url>, FetchError> {
        self.font_stylesheets
            .iter()
            .map(|url| Url::parse(url).map_err(|e| FetchError::invalid_url(url, e)))
            .collect()
    }
}
