//! Per-request cache policy.
//!
//! | Target              | Read cache | Store network response |
//! |---------------------|------------|------------------------|
//! | Font origin         | yes        | always                 |
//! | App origin          | yes        | only on status 200     |
//! | Anything else       | no         | never                  |

use reqwest::Url;

use crate::net::FetchError;

/// Font delivery origins cached by default.
pub const DEFAULT_FONT_ORIGINS: [&str; 2] =
    ["https://fonts.googleapis.com", "https://fonts.gstatic.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePolicy {
    /// Third-party font delivery: cache-first, store whatever comes back.
    FontCacheFirst,
    /// The app's own origin: cache-first, store only 200 responses.
    SameOriginCacheFirst,
    /// Everything else bypasses the cache.
    NetworkOnly,
}

impl RoutePolicy {
    pub fn reads_cache(self) -> bool {
        !matches!(self, RoutePolicy::NetworkOnly)
    }

    /// Whether a network response with `status` is written to the cache.
    pub fn should_store(self, status: u16) -> bool {
        match self {
            RoutePolicy::FontCacheFirst => true,
            RoutePolicy::SameOriginCacheFirst => status == 200,
            RoutePolicy::NetworkOnly => false,
        }
    }
}

/// Origins that decide a request's [`RoutePolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    app_origin: String,
    font_origins: Vec<String>,
}

/// `scheme://host[:port]`, or `None` for opaque origins (data:, blob:, ...).
fn origin_of(url: &Url) -> Option<String> {
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

impl RouteTable {
    pub fn new<S: AsRef<str>>(app_base: &Url, font_origins: &[S]) -> Result<Self, FetchError> {
        let app_origin = origin_of(app_base)
            .ok_or_else(|| FetchError::invalid_url(app_base.as_str(), "opaque origin"))?;

        let font_origins = font_origins
            .iter()
            .map(|raw| {
                let raw = raw.as_ref();
                let url = Url::parse(raw).map_err(|e| FetchError::invalid_url(raw, e))?;
                origin_of(&url).ok_or_else(|| FetchError::invalid_url(raw, "opaque origin"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            app_origin,
            font_origins,
        })
    }

    pub fn is_app_origin(&self, url: &Url) -> bool {
        origin_of(url).as_deref() == Some(self.app_origin.as_str())
    }

    pub fn classify(&self, url: &Url) -> RoutePolicy {
        let Some(origin) = origin_of(url) else {
            return RoutePolicy::NetworkOnly;
        };

        if self.font_origins.iter().any(|o| *o == origin) {
            RoutePolicy::FontCacheFirst
        } else if self.is_app_origin(url) {
            RoutePolicy::SameOriginCacheFirst
        } else {
            RoutePolicy::NetworkOnly
        }
    }
}
