//! Paginated listing of the user's thread library.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ProtocolClient;
use crate::error::{excerpt, ProtocolError, TransportError};
use crate::models::{QueryMode, ThreadEntry, ThreadQuery, ThreadRecord};
use crate::traits::Headers;

/// Threads requested per page.
pub const PAGE_SIZE: u64 = 100;

/// Observer called after each page with `(fetched, total)`.
pub type PageObserver = Arc<dyn Fn(usize, u64) + Send + Sync>;

/// Optional hooks for [`ProtocolClient::list_threads_with`].
#[derive(Clone, Default)]
pub struct ListOptions {
    pub cancel: Option<CancellationToken>,
    pub on_page: Option<PageObserver>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_page(mut self, observer: impl Fn(usize, u64) + Send + Sync + 'static) -> Self {
        self.on_page = Some(Arc::new(observer));
        self
    }
}

impl fmt::Debug for ListOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListOptions")
            .field("cancel", &self.cancel.is_some())
            .field("on_page", &self.on_page.is_some())
            .finish()
    }
}

impl ProtocolClient {
    /// Fetch every thread in the library, newest first, filtered by `query`.
    pub async fn list_threads(&self, query: &ThreadQuery) -> Result<Vec<ThreadRecord>, ProtocolError> {
        self.list_threads_with(query, &ListOptions::default()).await
    }

    /// Like [`list_threads`](Self::list_threads) with cancellation and a
    /// per-page progress observer.
    ///
    /// Every page takes a rate-limit token and is retried on its own.
    pub async fn list_threads_with(
        &self,
        query: &ThreadQuery,
        options: &ListOptions,
    ) -> Result<Vec<ThreadRecord>, ProtocolError> {
        let url = self.config.threads_url();
        let headers = self.headers("application/json");
        let timeout = self.config.timeout_for(QueryMode::Standard);
        let cancel = options.cancel.clone().unwrap_or_default();
        let search_term = query.search_term.clone().unwrap_or_default();

        let mut records = Vec::new();
        let mut total: Option<u64> = None;
        let mut offset = 0u64;

        loop {
            let body = json!({
                "limit": PAGE_SIZE,
                "ascending": false,
                "offset": offset,
                "search_term": search_term,
            })
            .to_string();

            debug!(offset, limit = PAGE_SIZE, "Fetching thread page");
            let entries = self
                .with_retries("list_threads", &cancel, |_| {
                    self.fetch_page(&url, &body, &headers, timeout)
                })
                .await?;

            let first = match entries.first() {
                Some(first) => first,
                None => break,
            };
            let total = *total.get_or_insert(first.total_threads.unwrap_or(entries.len() as u64));

            for entry in &entries {
                match ThreadRecord::from_entry(entry, &self.config.base_url) {
                    Some(record) => records.push(record),
                    None => warn!(title = %entry.title, "Skipping thread without a timestamp"),
                }
            }

            if let Some(observer) = &options.on_page {
                observer(records.len(), total);
            }

            if !first.has_next_page {
                break;
            }
            offset += PAGE_SIZE;
        }

        debug!(fetched = records.len(), "Thread listing complete");
        Ok(records.into_iter().filter(|r| query.matches(r)).collect())
    }

    async fn fetch_page(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
        timeout: Duration,
    ) -> Result<Vec<ThreadEntry>, ProtocolError> {
        self.limiter.acquire().await;

        let response = self.http.post(url, body, headers, timeout).await?;
        let text = response.text().unwrap_or_default();
        if !response.is_success() {
            return Err(TransportError::Status {
                status: response.status,
                message: excerpt(&text),
            }
            .into());
        }

        serde_json::from_str(&text)
            .map_err(|e| ProtocolError::malformed(format!("invalid thread page: {}", e), &text))
    }
}
