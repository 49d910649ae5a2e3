//! Paginated shard discovery
//!
//! Pages are fetched lazily, each one starting after the last shard id the
//! consumer has seen, so a listing can be restarted from any point with
//! [`ShardLister::resume_after`].

use crate::client::{SinkError, StreamReader};
use futures::stream::{self, Stream, TryStreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Lazily lists the shards of a stream
pub struct ShardLister<R: StreamReader> {
    reader: Arc<R>,
    start_after: Option<String>,
}

struct ListState<R> {
    reader: Arc<R>,
    cursor: Option<String>,
    buffer: VecDeque<String>,
    finished: bool,
}

impl<R: StreamReader + 'static> ShardLister<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            reader,
            start_after: None,
        }
    }

    /// Start the listing after `shard_id` instead of at the first shard
    pub fn resume_after(mut self, shard_id: impl Into<String>) -> Self {
        self.start_after = Some(shard_id.into());
        self
    }

    /// Stream of shard ids; a listing error is yielded once and ends the stream
    pub fn into_stream(self) -> impl Stream<Item = Result<String, SinkError>> + Send {
        let state = ListState {
            reader: self.reader,
            cursor: self.start_after,
            buffer: VecDeque::new(),
            finished: false,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(shard_id) = state.buffer.pop_front() {
                    state.cursor = Some(shard_id.clone());
                    return Some((Ok(shard_id), state));
                }

                if state.finished {
                    return None;
                }

                match state.reader.describe_page(state.cursor.as_deref()).await {
                    Ok(page) => {
                        trace!(
                            after = ?state.cursor,
                            shards = page.shard_ids.len(),
                            has_more = page.has_more,
                            "Fetched shard page"
                        );
                        // An empty page that claims more would otherwise be requested forever
                        state.finished = !page.has_more || page.shard_ids.is_empty();
                        state.buffer.extend(page.shard_ids);
                    }
                    Err(e) => {
                        debug!(error = %e, after = ?state.cursor, "Shard listing failed");
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
            }
        })
    }

    /// Drain the whole listing
    pub async fn collect_all(self) -> Result<Vec<String>, SinkError> {
        self.into_stream().try_collect().await
    }
}
