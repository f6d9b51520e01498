// Paginated fetch worker.
// Accumulates a repository listing page by page on a background task,
// reporting progress over a channel and honoring cooperative cancellation.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::github::{GitHubClient, Repository};

/// Page size for repository enumeration.
pub const PER_PAGE: usize = 50;

/// The seam between the worker and the client: one paged GET.
pub trait ListSource: Send {
    fn list(&mut self, endpoint: &str) -> impl Future<Output = Result<Option<Value>>> + Send;
}

impl ListSource for GitHubClient {
    async fn list(&mut self, endpoint: &str) -> Result<Option<Value>> {
        self.get(endpoint).await
    }
}

/// Notifications emitted by a running fetch.
#[derive(Debug)]
pub enum FetchEvent {
    /// Accumulator length after a page was appended.
    Progress(usize),
    /// The loop has exited; carries the final length or the error that
    /// aborted the fetch. Emitted exactly once, including on cancellation.
    Finished(Result<usize>),
}

/// Handle for requesting cancellation of a running fetch.
///
/// Cancellation is cooperative: the flag is checked once per page, so an
/// in-flight call finishes before the loop exits.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Drives repeated paged calls until the accumulator reaches the target
/// length or cancellation is requested.
///
/// The accumulator is shared so the caller can filter and render whatever
/// prefix has arrived, including after a cancelled fetch.
pub struct Pager<C> {
    api: Arc<Mutex<C>>,
    endpoint: String,
    data: Arc<Mutex<Vec<Repository>>>,
    maxlen: usize,
    cancel: Arc<AtomicBool>,
}

impl<C: ListSource> Pager<C> {
    pub fn new(
        api: Arc<Mutex<C>>,
        endpoint: impl Into<String>,
        data: Arc<Mutex<Vec<Repository>>>,
        maxlen: usize,
    ) -> Self {
        Self {
            api,
            endpoint: endpoint.into(),
            data,
            maxlen,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancel),
        }
    }

    /// Run the fetch loop to completion, emitting progress after each page
    /// and a single `Finished` event when the loop exits for any reason.
    pub async fn run(self, events: mpsc::UnboundedSender<FetchEvent>) {
        let result = self.run_inner(&events).await;
        let _ = events.send(FetchEvent::Finished(result));
    }

    async fn run_inner(&self, events: &mpsc::UnboundedSender<FetchEvent>) -> Result<usize> {
        // Unpaged call first; its result is discarded. It establishes or
        // revalidates the cache entry for the bare endpoint, and surfaces
        // auth problems before the paging loop starts.
        self.api.lock().await.list(&self.endpoint).await?;

        let mut page = 0usize;
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let filled = self.data.lock().await.len();
            if filled >= self.maxlen {
                break;
            }

            page += 1;
            let page_endpoint =
                format!("{}?page={}&per_page={}", self.endpoint, page, PER_PAGE);
            let body = self.api.lock().await.list(&page_endpoint).await?;
            let items: Vec<Repository> = match body {
                Some(value) => serde_json::from_value(value)?,
                None => Vec::new(),
            };

            // The listing ran dry before the expected total; stop rather
            // than requesting the same empty tail forever.
            if items.is_empty() {
                break;
            }

            let total = {
                let mut data = self.data.lock().await;
                data.extend(items);
                data.len()
            };
            let _ = events.send(FetchEvent::Progress(total));
        }

        Ok(self.data.lock().await.len())
    }

    /// Spawn the fetch on a background task, returning the task handle,
    /// the event stream, and a cancellation handle.
    pub fn spawn(self) -> (JoinHandle<()>, mpsc::UnboundedReceiver<FetchEvent>, CancelHandle)
    where
        C: 'static,
    {
        let cancel = self.cancel_handle();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(tx));
        (handle, rx, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BulkError;
    use serde_json::json;

    fn repo(i: usize) -> Value {
        json!({
            "id": i,
            "name": format!("repo-{}", i),
            "archived": false,
            "html_url": format!("https://github.com/octocat/repo-{}", i),
        })
    }

    /// Serves `total` repositories in `PER_PAGE` chunks and records the
    /// endpoints it was asked for.
    struct FakeSource {
        total: usize,
        served: usize,
        calls: Vec<String>,
        cancel_after_first_page: Option<CancelHandle>,
        fail_on_page: Option<usize>,
    }

    impl FakeSource {
        fn new(total: usize) -> Self {
            Self {
                total,
                served: 0,
                calls: Vec::new(),
                cancel_after_first_page: None,
                fail_on_page: None,
            }
        }
    }

    impl ListSource for FakeSource {
        async fn list(&mut self, endpoint: &str) -> Result<Option<Value>> {
            self.calls.push(endpoint.to_string());
            if !endpoint.contains("?page=") {
                // The unpaged identity-style call; result is discarded.
                return Ok(Some(json!({})));
            }

            let page = self.calls.iter().filter(|c| c.contains("?page=")).count();
            if self.fail_on_page == Some(page) {
                return Err(BulkError::Status {
                    code: 500,
                    message: "boom".to_string(),
                });
            }

            let count = PER_PAGE.min(self.total - self.served);
            let items: Vec<Value> = (self.served..self.served + count).map(repo).collect();
            self.served += count;

            if let Some(handle) = &self.cancel_after_first_page
                && page == 1
            {
                handle.cancel();
            }
            Ok(Some(Value::Array(items)))
        }
    }

    async fn collect_events(mut rx: mpsc::UnboundedReceiver<FetchEvent>) -> Vec<FetchEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_full_fetch_progress_and_completion() {
        let api = Arc::new(Mutex::new(FakeSource::new(120)));
        let data = Arc::new(Mutex::new(Vec::new()));
        let pager = Pager::new(Arc::clone(&api), "/orgs/octo/repos", Arc::clone(&data), 120);

        let (tx, rx) = mpsc::unbounded_channel();
        pager.run(tx).await;
        let events = collect_events(rx).await;

        // Two full pages and a partial third page.
        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                FetchEvent::Progress(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![50, 100, 120]);

        let finished: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, FetchEvent::Finished(_)))
            .collect();
        assert_eq!(finished.len(), 1);
        assert!(matches!(finished[0], FetchEvent::Finished(Ok(120))));

        assert_eq!(data.lock().await.len(), 120);

        // One unpaged call plus exactly three page calls, in order.
        let calls = api.lock().await.calls.clone();
        assert_eq!(
            calls,
            vec![
                "/orgs/octo/repos".to_string(),
                "/orgs/octo/repos?page=1&per_page=50".to_string(),
                "/orgs/octo/repos?page=2&per_page=50".to_string(),
                "/orgs/octo/repos?page=3&per_page=50".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancellation_stops_paging() {
        let api = Arc::new(Mutex::new(FakeSource::new(200)));
        let data = Arc::new(Mutex::new(Vec::new()));
        let pager = Pager::new(Arc::clone(&api), "/orgs/octo/repos", Arc::clone(&data), 200);

        api.lock().await.cancel_after_first_page = Some(pager.cancel_handle());

        let (tx, rx) = mpsc::unbounded_channel();
        pager.run(tx).await;
        let events = collect_events(rx).await;

        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                FetchEvent::Progress(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![50]);
        assert!(matches!(events.last(), Some(FetchEvent::Finished(Ok(50)))));

        // A partial prefix remains; no further pages were requested.
        assert_eq!(data.lock().await.len(), 50);
        let page_calls = api
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.contains("?page="))
            .count();
        assert_eq!(page_calls, 1);
    }

    #[tokio::test]
    async fn test_error_still_emits_finished_once() {
        let mut source = FakeSource::new(200);
        source.fail_on_page = Some(2);
        let api = Arc::new(Mutex::new(source));
        let data = Arc::new(Mutex::new(Vec::new()));
        let pager = Pager::new(Arc::clone(&api), "/orgs/octo/repos", Arc::clone(&data), 200);

        let (tx, rx) = mpsc::unbounded_channel();
        pager.run(tx).await;
        let events = collect_events(rx).await;

        assert!(matches!(events[0], FetchEvent::Progress(50)));
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            FetchEvent::Finished(Err(BulkError::Status { code: 500, .. }))
        ));
    }

    #[tokio::test]
    async fn test_short_listing_terminates() {
        // The server holds fewer repos than the identity info promised.
        let api = Arc::new(Mutex::new(FakeSource::new(30)));
        let data = Arc::new(Mutex::new(Vec::new()));
        let pager = Pager::new(Arc::clone(&api), "/users/octo/repos", Arc::clone(&data), 100);

        let (tx, rx) = mpsc::unbounded_channel();
        pager.run(tx).await;
        let events = collect_events(rx).await;

        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                FetchEvent::Progress(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![30]);
        assert!(matches!(events.last(), Some(FetchEvent::Finished(Ok(30)))));
    }

    #[tokio::test]
    async fn test_spawned_fetch_delivers_events() {
        let api = Arc::new(Mutex::new(FakeSource::new(60)));
        let data = Arc::new(Mutex::new(Vec::new()));
        let pager = Pager::new(api, "/orgs/octo/repos", Arc::clone(&data), 60);

        let (handle, rx, _cancel) = pager.spawn();
        let events = collect_events(rx).await;
        handle.await.unwrap();

        assert!(matches!(events.last(), Some(FetchEvent::Finished(Ok(60)))));
        assert_eq!(data.lock().await.len(), 60);
    }
}
