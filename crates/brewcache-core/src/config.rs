//! Application configuration management.
//!
//! Holds the offline cache settings (generation prefix and version, app
//! origin, pre-cache manifest), the recipe constants, and the last
//! selection made in the calculator.
//!
//! Configuration is stored at `~/.config/brewcache/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::manifest::DEFAULT_CACHE_PREFIX;
use crate::cache::routing::DEFAULT_FONT_ORIGINS;
use crate::cache::{CacheName, LifecycleError, PrecacheManifest, RouteTable};
use crate::github::DEFAULT_REPO;
use crate::net::FetchError;
use crate::recipe::RecipeSettings;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "brewcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Where the app is served from when nothing else is configured
pub const DEFAULT_ORIGIN: &str = "https://devsecninja.github.io/v60-recipe/";

/// Environment variable overriding the app origin
pub const ORIGIN_ENV: &str = "BREWCACHE_ORIGIN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub prefix: String,
    /// Bumping this is what triggers install of a new generation.
    pub version: String,
    pub origin: String,
    pub manifest: PrecacheManifest,
    pub font_origins: Vec<String>,
    /// Per-request timeout for the HTTP client. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            manifest: PrecacheManifest::default(),
            font_origins: DEFAULT_FONT_ORIGINS.iter().map(|o| o.to_string()).collect(),
            request_timeout_secs: None,
        }
    }
}

impl CacheConfig {
    pub fn cache_name(&self) -> Result<CacheName, LifecycleError> {
        CacheName::new(&self.prefix, &self.version)
    }

    /// The origin as a base URL that relative manifest paths resolve
    /// against. A missing trailing slash is added so a sub-path deployment
    /// keeps its directory.
    pub fn scope(&self) -> Result<Url, LifecycleError> {
        let invalid = |reason: String| LifecycleError::InvalidOrigin {
            origin: self.origin.clone(),
            reason,
        };

        let mut url = Url::parse(self.origin.trim()).map_err(|e| invalid(e.to_string()))?;
        if !url.origin().is_tuple() {
            return Err(invalid("not an http(s) origin".to_string()));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// Routing for this origin. The manifest's font stylesheets are always
    /// cache-first, even when their origin is missing from `font_origins`.
    pub fn routes(&self) -> Result<RouteTable, LifecycleError> {
        let invalid = |e: FetchError| LifecycleError::InvalidOrigin {
            origin: self.origin.clone(),
            reason: e.to_string(),
        };

        let scope = self.scope()?;
        let mut origins = self.font_origins.clone();
        for url in self.manifest.font_urls().map_err(invalid)? {
            let origin = url.origin().ascii_serialization();
            if !origins.contains(&origin) {
                origins.push(origin);
            }
        }
        RouteTable::new(&scope, &origins).map_err(invalid)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub recipe: RecipeSettings,
    /// `owner/name` of the repository whose stars are shown.
    pub github_repo: String,
    pub last_water: Option<u32>,
    pub last_ratio: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            recipe: RecipeSettings::default(),
            github_repo: DEFAULT_REPO.to_string(),
            last_water: None,
            last_ratio: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_origin_override(std::env::var(ORIGIN_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_origin_override(&mut self, origin: Option<String>) {
        if let Some(origin) = origin.filter(|o| !o.trim().is_empty()) {
            debug!(origin = %origin, "App origin overridden from environment");
            self.cache.origin = origin;
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RoutePolicy;

    #[test]
    fn test_default_cache_name_tracks_crate_version() {
        let config = CacheConfig::default();
        assert_eq!(
            config.cache_name().unwrap().to_string(),
            format!("v60-recipe-v{}", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn test_scope_adds_trailing_slash() {
        let config = CacheConfig {
            origin: "https://devsecninja.github.io/v60-recipe".to_string(),
            ..CacheConfig::default()
        };
        assert_eq!(
            config.scope().unwrap().as_str(),
            "https://devsecninja.github.io/v60-recipe/"
        );
    }

    #[test]
    fn test_routes_cover_manifest_font_stylesheets() {
        let config = CacheConfig {
            font_origins: Vec::new(),
            ..CacheConfig::default()
        };
        let routes = config.routes().unwrap();

        let stylesheet = Url::parse(&config.manifest.font_stylesheets[0]).unwrap();
        assert_eq!(routes.classify(&stylesheet), RoutePolicy::FontCacheFirst);
        let font_file = Url::parse("https://fonts.gstatic.com/s/inter/v12/a.woff2").unwrap();
        assert_eq!(routes.classify(&font_file), RoutePolicy::NetworkOnly);
    }

    #[test]
    fn test_scope_rejects_non_http_origin() {
        for origin in ["not a url", "data:text/plain,x"] {
            let config = CacheConfig {
                origin: origin.to_string(),
                ..CacheConfig::default()
            };
            assert!(matches!(
                config.scope(),
                Err(LifecycleError::InvalidOrigin { .. })
            ));
        }
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"cache":{"version":"2.0.0"},"last_water":300}"#).unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.cache.version, "2.0.0");
        assert_eq!(config.cache.prefix, "v60-recipe");
        assert_eq!(config.last_water, Some(300));
        assert_eq!(config.recipe, RecipeSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.last_ratio = Some(15.5);
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_origin_override() {
        let mut config = Config::default();
        config.apply_origin_override(Some("   ".to_string()));
        assert_eq!(config.cache.origin, DEFAULT_ORIGIN);

        config.apply_origin_override(Some("http://localhost:8080/".to_string()));
        assert_eq!(config.cache.origin, "http://localhost:8080/");
    }
}
