use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::net::Response;

/// A stored snapshot plus the time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

/// One resource entry of a cache generation.
pub type CachedResponse = CachedData<Response>;

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_response_keeps_timestamp_through_json() {
        let entry = CachedData::new(Response::new("https://example.com/", 200, b"ok".to_vec()));
        let json = serde_json::to_string(&entry).unwrap();
        let back: CachedResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
