use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use async_trait::async_trait;

use super::archive::{ArchiveEntry, ArchiveError, QuoteArchive};
use super::feed::{FeedError, QuoteFeed};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Feed that replays a scripted sequence of responses and records calls
#[derive(Debug, Default, Clone)]
pub struct ScriptedFeed {
    calls: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<VecDeque<Result<String, FeedError>>>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to queue a raw response
    pub fn with_response(self, raw: impl Into<String>) -> Self {
        self.push(Ok(raw.into()));
        self
    }

    /// Builder method to queue a failure
    pub fn with_error(self, error: FeedError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, response: Result<String, FeedError>) {
        lock(&self.responses).push_back(response);
    }

    /// Symbols requested so far
    pub fn get_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

#[async_trait]
impl QuoteFeed for ScriptedFeed {
    async fn fetch_raw(&self, symbol: &str) -> Result<String, FeedError> {
        lock(&self.calls).push(symbol.to_string());
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Err(FeedError::Empty(symbol.to_string())))
    }
}

/// In-memory archive
#[derive(Debug, Default, Clone)]
pub struct MemoryArchive {
    entries: Arc<Mutex<Vec<ArchiveEntry>>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<ArchiveEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    /// Snapshot of everything recorded, shared across clones
    pub fn entries(&self) -> Vec<ArchiveEntry> {
        lock(&self.entries).clone()
    }
}

impl QuoteArchive for MemoryArchive {
    fn record(&mut self, entry: &ArchiveEntry) -> Result<(), ArchiveError> {
        lock(&self.entries).push(entry.clone());
        Ok(())
    }

    fn latest(&self, code: &str) -> Result<Option<ArchiveEntry>, ArchiveError> {
        Ok(lock(&self.entries)
            .iter()
            .rev()
            .find(|e| e.quote.code == code)
            .cloned())
    }

    fn history(&self, code: &str, limit: usize) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let entries = lock(&self.entries);
        let matching: Vec<&ArchiveEntry> = entries.iter().filter(|e| e.quote.code == code).collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }
}
