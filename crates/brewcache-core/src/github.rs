//! Star count of the project repository.

use serde::Deserialize;
use tracing::debug;

use crate::cache::{CacheStorage, Registration};
use crate::net::{Fetch, FetchError, Request, Response};

pub const DEFAULT_REPO: &str = "DevSecNinja/v60-recipe";

/// Shown until (or instead of) a real count.
pub const STAR_PLACEHOLDER: &str = "Star on GitHub";

const API_BASE: &str = "https://api.github.com/repos";

#[derive(Debug, Deserialize)]
struct RepoInfo {
    stargazers_count: u64,
}

pub fn repo_api_url(repo: &str) -> String {
    format!("{}/{}", API_BASE, repo.trim_matches('/'))
}

pub fn repo_page_url(repo: &str) -> String {
    format!("https://github.com/{}", repo.trim_matches('/'))
}

/// `0 stars`, `1 star`, `1,234 stars`.
pub fn format_star_count(count: u64) -> String {
    let digits = count.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let noun = if count == 1 { "star" } else { "stars" };
    format!("{} {}", grouped, noun)
}

pub fn parse_star_count(response: &Response) -> Result<u64, FetchError> {
    if !response.is_ok() {
        return Err(FetchError::from_response(response));
    }
    let info: RepoInfo =
        serde_json::from_slice(&response.body).map_err(|e| FetchError::InvalidBody {
            url: response.url.clone(),
            reason: e.to_string(),
        })?;
    Ok(info.stargazers_count)
}

/// Ask the GitHub API through the registration, so the request follows the
/// same routing as any other page request (it is never cached).
pub async fn fetch_star_count<S, F>(
    registration: &Registration<S, F>,
    repo: &str,
) -> Result<u64, FetchError>
where
    S: CacheStorage,
    F: Fetch + 'static,
{
    let request = Request::parse(&repo_api_url(repo))?;
    let routed = registration.fetch(request).await?;
    let count = parse_star_count(&routed.response)?;
    debug!(repo, count, "Fetched star count");
    Ok(count)
}
