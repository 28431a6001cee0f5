//! In-memory index of live boards.
//!
//! Thread-safe via DashMap. Writers that read-then-write a key (uploads,
//! eviction) serialize on a striped per-key async lock so an upload and the
//! sweeper never interleave on the same board.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::board::Board;

/// Number of lock stripes shared by all keys.
const LOCK_STRIPES: usize = 256;

/// Listing row for the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSummary {
    pub key: String,
    pub days_ttl: Option<i64>,
}

pub struct BoardIndex {
    boards: DashMap<String, Board>,
    locks: Vec<Arc<Mutex<()>>>,
    hasher: RandomState,
}

impl BoardIndex {
    pub fn new() -> Self {
        Self {
            boards: DashMap::new(),
            locks: (0..LOCK_STRIPES).map(|_| Arc::new(Mutex::new(()))).collect(),
            hasher: RandomState::new(),
        }
    }

    /// Exclusive access to `key` for a read-modify-write sequence.
    ///
    /// The guard is owned so it can travel into a blocking storage task and
    /// outlive the request that took it.
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let stripe = self.hasher.hash_one(key) as usize % LOCK_STRIPES;
        self.locks[stripe].clone().lock_owned().await
    }

    /// Snapshot occupancy. Not linearizable with concurrent writers.
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Board> {
        self.boards.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.boards.contains_key(key)
    }

    /// Insert or fully replace a board. Returns true if one was already stored.
    pub fn upsert(&self, key: &str, board: Board) -> bool {
        self.boards.insert(key.to_string(), board).is_some()
    }

    pub fn remove(&self, key: &str) -> Option<Board> {
        self.boards.remove(key).map(|(_, board)| board)
    }

    pub fn set_days_ttl(&self, key: &str, days: i64) {
        if let Some(mut entry) = self.boards.get_mut(key) {
            entry.days_ttl = Some(days);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.boards.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Every board's key and remaining days, sorted by key.
    pub fn summaries(&self) -> Vec<BoardSummary> {
        let mut rows: Vec<BoardSummary> = self
            .boards
            .iter()
            .map(|entry| BoardSummary {
                key: entry.key().clone(),
                days_ttl: entry.value().days_ttl,
            })
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows
    }
}

impl Default for BoardIndex {
    fn default() -> Self {
        Self::new()
    }
}
