//! Network capability used by the cache manager.
//!
//! The cache manager never talks to `reqwest` directly; it goes through the
//! [`Fetch`] trait so tests and alternative hosts can substitute their own
//! network client. [`HttpFetcher`] is the production implementation.

pub mod error;
pub mod fetcher;

#[cfg(test)]
pub(crate) mod mock;

pub use error::FetchError;
pub use fetcher::{Fetch, HttpFetcher, Request, Response};
