//! Cursor pagination over the `getAllData` bulk export.

use tracing::debug;

use crate::client::DpfClient;
use crate::error::DpfClientError;
use crate::query::GetAllDataRequest;
use crate::types::AllDataRecord;

/// Forward-only page cursor over `getAllData`.
///
/// The first page carries the request's filters; each later page sends
/// only the continuation token the platform returned. The cursor is not
/// restartable: once exhausted, [`next_page`](Self::next_page) keeps
/// returning `Ok(None)` and no further upstream calls are made. Each
/// page fetch goes through the client's rate limiter and retry policy
/// independently; a terminal error surfaces as `Err` rather than a
/// silently truncated stream.
#[derive(Debug)]
pub struct AllDataPages {
    client: DpfClient,
    request: GetAllDataRequest,
    token: Option<String>,
    started: bool,
    finished: bool,
    yielded: usize,
}

impl AllDataPages {
    pub(crate) fn new(client: DpfClient, request: GetAllDataRequest) -> Self {
        Self {
            client,
            request,
            token: None,
            started: false,
            finished: false,
            yielded: 0,
        }
    }

    /// Records yielded so far.
    #[must_use]
    pub const fn yielded(&self) -> usize {
        self.yielded
    }

    /// Fetch the next batch, or `Ok(None)` when the cursor is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<AllDataRecord>>, DpfClientError> {
        if self.finished {
            return Ok(None);
        }

        let page = if self.started {
            let Some(token) = self.token.take() else {
                self.finished = true;
                return Ok(None);
            };
            self.client
                .fetch_all_data_next(self.request.batch_size, token)
                .await?
        } else {
            self.started = true;
            self.client.fetch_all_data_first(&self.request).await?
        };

        let mut batch = page.data;
        self.token = page.next_data_request_token;

        // Termination, in order: short page or missing token, then the
        // caller's item cap.
        if (batch.len() as u64) < u64::from(self.request.batch_size) || self.token.is_none() {
            self.finished = true;
        }
        if let Some(cap) = self.request.max_items {
            let remaining = cap.saturating_sub(self.yielded);
            if batch.len() >= remaining {
                batch.truncate(remaining);
                self.finished = true;
            }
        }
        self.yielded += batch.len();

        if batch.is_empty() {
            self.finished = true;
            debug!(yielded = self.yielded, "all_data_exhausted");
            return Ok(None);
        }
        Ok(Some(batch))
    }

    /// Drain the cursor into one collection, honoring the item cap.
    pub async fn collect(mut self) -> Result<AllDataCollection, DpfClientError> {
        let mut batches = 0;
        let mut items = Vec::new();
        while let Some(batch) = self.next_page().await? {
            batches += 1;
            items.extend(batch);
        }
        Ok(AllDataCollection { batches, items })
    }
}

/// A fully drained `getAllData` stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AllDataCollection {
    /// Number of non-empty batches fetched.
    pub batches: usize,
    /// All records, in fetch order.
    pub items: Vec<AllDataRecord>,
}
