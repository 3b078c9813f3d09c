//! Scripted `Fetch` implementation for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Fetch, FetchError, Request, Response};

enum Scripted {
    Respond(u16, Vec<u8>),
    Fail(String),
}

/// Answers from a fixed table; unknown URLs fail as unreachable.
#[derive(Default)]
pub(crate) struct MockFetcher {
    routes: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, url: &str, status: u16, body: &str) -> Self {
        self.set_response(url, status, body);
        self
    }

    pub(crate) fn fail(self, url: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Scripted::Fail(format!("connection refused: {url}")));
        self
    }

    pub(crate) fn set_response(&self, url: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Scripted::Respond(status, body.as_bytes().to_vec()),
        );
    }

    pub(crate) fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetch for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.cache_key().to_string();
        self.calls.lock().unwrap().push(url.clone());
        match self.routes.lock().unwrap().get(&url) {
            Some(Scripted::Respond(status, body)) => Ok(Response::new(url, *status, body.clone())),
            Some(Scripted::Fail(reason)) => Err(FetchError::Unreachable(reason.clone())),
            None => Err(FetchError::Unreachable(format!("no route for {url}"))),
        }
    }
}
