//! Shared fixtures for unit tests

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::data::Item;
use crate::remote::{Endpoint, RemoteClient, RemoteError};

/// A remote client that replays queued responses
///
/// Once the queue is empty every call fails with a 503. With a gate set,
/// each call waits for one `notify_one` before answering, which keeps a
/// fetch observably in flight.
#[derive(Default)]
pub(crate) struct ScriptedRemote {
    responses: Mutex<VecDeque<Result<String, RemoteError>>>,
    urls: Mutex<Vec<String>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub(crate) fn push_ok(&self, body: impl Into<String>) {
        self.responses.lock().push_back(Ok(body.into()));
    }

    pub(crate) fn push_err(&self) {
        self.responses.lock().push_back(Err(RemoteError::Timeout(
            std::time::Duration::from_secs(10),
        )));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl RemoteClient for ScriptedRemote {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<String, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(endpoint.url.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| {
                Err(RemoteError::Status {
                    status: 503,
                    url: endpoint.url.clone(),
                })
            })
    }
}

pub(crate) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
}

/// Builds a search response where every entry carries the default topic
pub(crate) fn search_body(repos: &[(&str, &str, u32)]) -> String {
    let items: Vec<serde_json::Value> = repos
        .iter()
        .map(|(owner, name, stars)| {
            serde_json::json!({
                "name": name,
                "owner": { "login": owner },
                "description": format!("{} by {}", name, owner),
                "stargazers_count": stars,
                "html_url": format!("https://github.com/{}/{}", owner, name),
                "topics": ["mindustry-mod"]
            })
        })
        .collect();
    serde_json::json!({ "total_count": items.len(), "items": items }).to_string()
}

pub(crate) fn item(owner: &str, repo: &str, stars: u32) -> Item {
    Item {
        owner: owner.to_string(),
        repo: repo.to_string(),
        name: repo.to_string(),
        description: format!("{} by {}", repo, owner),
        stars,
        url: format!("https://github.com/{}/{}", owner, repo),
        discovered_at: start_time(),
    }
}
