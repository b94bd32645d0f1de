use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;

use crate::poller::error::{PollError, PollResult};
use crate::poller::runner::{PollHandle, Poller};
use crate::poller::sink::NotificationSink;
use crate::poller::types::{PollSource, SourceStatus};

/// Owns the running sources of a process, keyed by source id.
///
/// Every source shares the same sink but nothing else.
pub struct SourceRegistry {
    sink: Arc<dyn NotificationSink>,
    handles: DashMap<String, PollHandle>,
}

impl SourceRegistry {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            handles: DashMap::new(),
        }
    }

    /// Starts polling `source`. Ids must be unique within the registry.
    pub fn register<S: PollSource>(&self, source: S) -> PollResult<()> {
        match self.handles.entry(source.id().to_string()) {
            Entry::Occupied(entry) => Err(PollError::AlreadyRegistered(entry.key().clone())),
            Entry::Vacant(entry) => {
                let handle = Poller::start(source, Arc::clone(&self.sink))?;
                entry.insert(handle);
                Ok(())
            }
        }
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.handles.contains_key(source_id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancels one source. The handle stays registered so its final status
    /// remains visible.
    pub fn cancel(&self, source_id: &str) -> PollResult<()> {
        let handle = self
            .handles
            .get(source_id)
            .ok_or_else(|| PollError::NotFound(source_id.to_string()))?;
        handle.cancel();
        Ok(())
    }

    pub fn status(&self, source_id: &str) -> Option<SourceStatus> {
        self.handles.get(source_id).map(|handle| handle.status())
    }

    /// Status snapshots for every source, ordered by id.
    pub fn statuses(&self) -> Vec<SourceStatus> {
        let mut statuses: Vec<_> = self.handles.iter().map(|entry| entry.status()).collect();
        statuses.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        statuses
    }

    /// Cancels every source and waits for all poll tasks to end.
    pub async fn shutdown(&self) -> Vec<(String, PollResult<()>)> {
        let ids: Vec<String> = self.handles.iter().map(|entry| entry.key().clone()).collect();
        let handles: Vec<PollHandle> = ids
            .iter()
            .filter_map(|id| self.handles.remove(id).map(|(_, handle)| handle))
            .collect();

        for handle in &handles {
            handle.cancel();
        }

        let results = join_all(handles.into_iter().map(|handle| async move {
            let source_id = handle.source_id().to_string();
            let result = handle.join().await;
            if let Err(ref e) = result {
                tracing::error!(source_id = %source_id, error = %e, "Poll source ended with error");
            }
            (source_id, result)
        }))
        .await;

        tracing::info!(count = results.len(), "All poll sources stopped");
        results
    }
}
