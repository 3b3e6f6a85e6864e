use serde::Serialize;
use std::sync::Arc;

use crate::event_sourcing::core::{EventSourcingResult, RecordedEvent};
use crate::event_sourcing::store::EventStore;

// ============================================================================
// Notification Log - Global Read Path for Subscribers
// ============================================================================
//
// A stateless pager over the store's global sequence. Subscribers keep their
// own position and ask for the next window; since new events are only ever
// numbered after the current maximum, advancing `start` by the number of
// items returned never skips or repeats an event.
//
// ============================================================================

pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

/// One window of the log plus where to continue from
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub items: Vec<RecordedEvent>,
    pub next_start: i64,
    pub has_more: bool,
}

#[derive(Clone)]
pub struct NotificationLog {
    event_store: Arc<dyn EventStore>,
    max_page_size: usize,
}

impl NotificationLog {
    pub fn new(event_store: Arc<dyn EventStore>) -> Self {
        Self::with_max_page_size(event_store, DEFAULT_MAX_PAGE_SIZE)
    }

    pub fn with_max_page_size(event_store: Arc<dyn EventStore>, max_page_size: usize) -> Self {
        Self {
            event_store,
            max_page_size: max_page_size.max(1),
        }
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Up to `limit` events starting at global sequence `start` (1-based).
    /// Returns exactly `limit` items whenever that many exist past `start`.
    pub async fn select(
        &self,
        start: i64,
        limit: usize,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let items = self.event_store.read_notifications(start.max(1), limit).await?;

        tracing::debug!(start, limit, returned = items.len(), "Selected notifications");
        Ok(items)
    }

    /// One window of at most `max_page_size` items, with the position to resume from
    pub async fn page(&self, start: i64, limit: usize) -> EventSourcingResult<NotificationPage> {
        let start = start.max(1);
        let items = self.select(start, limit.min(self.max_page_size)).await?;
        let next_start = items.last().map(|e| e.global_sequence + 1).unwrap_or(start);
        let has_more = self.event_store.max_global_sequence().await? >= next_start;

        Ok(NotificationPage {
            items,
            next_start,
            has_more,
        })
    }

    /// Highest global sequence recorded so far
    pub async fn max_sequence(&self) -> EventSourcingResult<i64> {
        self.event_store.max_global_sequence().await
    }
}
