use std::sync::Arc;

use gallery_core::{GalleryClient, GalleryError, GalleryItem, natural_cmp};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("page fetch failed after {loaded} items: {source}")]
    Page {
        loaded: usize,
        #[source]
        source: GalleryError,
    },
    #[error("sync task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Progress counters for a running sync. `expected` is an estimate
/// (`pages so far + 1` times the page-size hint) until the final page
/// reports no continuation, at which point it equals `loaded` and
/// `exact` flips on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub loaded: usize,
    pub expected: usize,
    pub exact: bool,
}

impl SyncProgress {
    pub fn percent(&self) -> u8 {
        if self.expected == 0 {
            return 100;
        }
        ((self.loaded * 100) / self.expected).min(100) as u8
    }
}

/// Cooperative pause handle. Pausing never cancels a page fetch already
/// in flight, it only keeps the engine from starting the next one;
/// resuming wakes the waiting engine immediately.
#[derive(Debug, Clone)]
pub struct SyncGate {
    tx: Arc<watch::Sender<bool>>,
}

impl SyncGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn pause(&self) {
        self.tx.send_replace(true);
    }

    pub fn resume(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives cursor-based pagination against the listing endpoint,
/// reporting each accumulated page through `on_page` and counters
/// through `on_progress`. One failed page fails the whole run; retrying
/// is the caller's policy.
#[derive(Clone)]
pub struct SyncEngine {
    client: GalleryClient,
    page_size: u32,
    gate: SyncGate,
}

impl SyncEngine {
    pub fn new(client: GalleryClient, page_size: u32) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
            gate: SyncGate::new(),
        }
    }

    pub fn gate(&self) -> SyncGate {
        self.gate.clone()
    }

    pub async fn run<P, G>(
        &self,
        mut on_page: P,
        mut on_progress: G,
    ) -> Result<Vec<GalleryItem>, SyncError>
    where
        P: FnMut(&[GalleryItem]),
        G: FnMut(SyncProgress),
    {
        let mut paused = self.gate.subscribe();
        let mut token: Option<String> = None;
        let mut accumulated: Vec<GalleryItem> = Vec::new();
        let mut pages = 0usize;

        loop {
            while *paused.borrow_and_update() {
                if paused.changed().await.is_err() {
                    break;
                }
            }

            let page = self
                .client
                .list_page(token.as_deref(), self.page_size)
                .await
                .map_err(|source| SyncError::Page {
                    loaded: accumulated.len(),
                    source,
                })?;
            pages += 1;

            let more = page.has_more && page.next_token.is_some();
            accumulated.extend(page.items);
            on_page(&accumulated);
            on_progress(SyncProgress {
                loaded: accumulated.len(),
                expected: if more {
                    (pages + 1) * self.page_size as usize
                } else {
                    accumulated.len()
                },
                exact: !more,
            });

            if !more {
                break;
            }
            token = page.next_token;
        }

        Ok(merge_sorted(accumulated))
    }
}

/// Natural-sorts by name and drops duplicate names, keeping the first
/// occurrence. Idempotent.
pub fn merge_sorted(mut items: Vec<GalleryItem>) -> Vec<GalleryItem> {
    items.sort_by(|a, b| natural_cmp(&a.name, &b.name));
    items.dedup_by(|a, b| a.name == b.name);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(name: &str) -> GalleryItem {
        GalleryItem {
            name: name.to_string(),
            url: format!("https://pub.example/imagens/{name}"),
        }
    }

    fn page_json(names: &[&str], next: Option<&str>) -> serde_json::Value {
        json!({
            "items": names
                .iter()
                .map(|n| json!({"name": n, "url": format!("https://pub.example/imagens/{n}")}))
                .collect::<Vec<_>>(),
            "has_more": next.is_some(),
            "next_token": next,
        })
    }

    #[test]
    fn merge_sorted_is_idempotent_and_dedupes() {
        let input = vec![item("10"), item("2"), item("2"), item("1")];
        let once = merge_sorted(input);
        let names: Vec<&str> = once.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["1", "2", "10"]);

        let twice = merge_sorted(once.clone());
        assert_eq!(twice, once);
    }

    #[tokio::test]
    async fn accumulates_every_page_and_sorts_the_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list_files"))
            .and(query_param_is_missing("token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page_json(&["3", "1"], Some("t1"))),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/list_files"))
            .and(query_param("token", "t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&["10", "2"], None)))
            .mount(&server)
            .await;

        let client = GalleryClient::new(&server.uri()).unwrap();
        let engine = SyncEngine::new(client, 2);

        let mut page_sizes = Vec::new();
        let mut progress = Vec::new();
        let items = engine
            .run(
                |accumulated| page_sizes.push(accumulated.len()),
                |p| progress.push(p),
            )
            .await
            .unwrap();

        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["1", "2", "3", "10"]);
        assert_eq!(page_sizes, vec![2, 4]);
        assert_eq!(
            progress,
            vec![
                SyncProgress { loaded: 2, expected: 4, exact: false },
                SyncProgress { loaded: 4, expected: 4, exact: true },
            ]
        );
    }

    #[tokio::test]
    async fn a_failed_page_fails_the_whole_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list_files"))
            .and(query_param_is_missing("token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page_json(&["1"], Some("t1"))),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/list_files"))
            .and(query_param("token", "t1"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = GalleryClient::new(&server.uri()).unwrap();
        let engine = SyncEngine::new(client, 1);

        let err = engine.run(|_| {}, |_| {}).await.unwrap_err();
        assert!(matches!(err, SyncError::Page { loaded: 1, .. }));
    }

    #[tokio::test]
    async fn bare_array_response_completes_in_one_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list_files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "2.webp", "url": "https://pub.example/imagens/2.webp"},
                {"name": "1.webp", "url": "https://pub.example/imagens/1.webp"}
            ])))
            .mount(&server)
            .await;

        let client = GalleryClient::new(&server.uri()).unwrap();
        let engine = SyncEngine::new(client, 100);

        let mut progress = Vec::new();
        let items = engine.run(|_| {}, |p| progress.push(p)).await.unwrap();

        assert_eq!(items[0].name, "1.webp");
        assert_eq!(progress, vec![SyncProgress { loaded: 2, expected: 2, exact: true }]);
    }

    #[tokio::test]
    async fn pause_defers_the_first_fetch_until_resume() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list_files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&["1"], None)))
            .mount(&server)
            .await;

        let client = GalleryClient::new(&server.uri()).unwrap();
        let engine = SyncEngine::new(client, 10);
        let gate = engine.gate();
        gate.pause();
        assert!(gate.is_paused());

        let task = tokio::spawn({
            let engine = engine.clone();
            async move { engine.run(|_| {}, |_| {}).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(server.received_requests().await.unwrap().is_empty());

        gate.resume();
        let items = task.await.unwrap().unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn stops_when_has_more_is_set_without_a_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list_files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "1", "url": "u"}],
                "has_more": true
            })))
            .mount(&server)
            .await;

        let client = GalleryClient::new(&server.uri()).unwrap();
        let engine = SyncEngine::new(client, 10);

        let items = engine.run(|_| {}, |_| {}).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
