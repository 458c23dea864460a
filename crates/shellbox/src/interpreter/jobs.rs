//! Background job table
//!
//! `cmd &` spawns a cooperative task on the runtime; the table tracks the
//! handles so `wait` can collect them and `$!` can name the newest one.

use std::collections::HashMap;

use tokio::task::JoinHandle;

/// Tracks background jobs by id.
pub struct JobTable {
    jobs: HashMap<u64, JoinHandle<i32>>,
    next_id: u64,
    last_id: Option<u64>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            next_id: 1,
            last_id: None,
        }
    }

    /// Register a spawned job; returns its id (the value of `$!`).
    pub fn spawn(&mut self, handle: JoinHandle<i32>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.jobs.insert(id, handle);
        self.last_id = Some(id);
        id
    }

    pub fn last_id(&self) -> Option<u64> {
        self.last_id
    }

    /// Wait for one job; `None` if the id is unknown (already collected).
    pub async fn wait_for(&mut self, id: u64) -> Option<i32> {
        let handle = self.jobs.remove(&id)?;
        Some(handle.await.unwrap_or(1))
    }

    /// Wait for every outstanding job; returns the last one's status.
    pub async fn wait_all(&mut self) -> i32 {
        let mut status = 0;
        let mut ids: Vec<u64> = self.jobs.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(handle) = self.jobs.remove(&id) {
                status = handle.await.unwrap_or(1);
            }
        }
        status
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_wait() {
        let mut table = JobTable::new();
        let id = table.spawn(tokio::spawn(async { 7 }));
        assert_eq!(table.last_id(), Some(id));
        assert_eq!(table.wait_for(id).await, Some(7));
        assert!(table.wait_for(id).await.is_none());
    }

    #[tokio::test]
    async fn wait_all_returns_last_status() {
        let mut table = JobTable::new();
        table.spawn(tokio::spawn(async { 0 }));
        table.spawn(tokio::spawn(async { 3 }));
        assert_eq!(table.wait_all().await, 3);
        assert!(table.is_empty());
    }
}
