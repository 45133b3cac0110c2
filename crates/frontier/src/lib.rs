//! The per-task URL frontier: a priority queue plus a
//! companion seen-set, guarded by a single mutex so admission and dequeue
//! are atomic with respect to each other.
//!
//! Deviates from a textbook priority queue in one way: ties are broken by
//! insertion order (a monotonic sequence number), which a plain
//! `BinaryHeap<(priority, url)>` would not guarantee — needed for BFS to be
//! well-defined (same-depth links popped in the order they were admitted).

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crawler_core::{Strategy, WorkItem};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Eq, PartialEq)]
struct Entry {
    priority: i64,
    seq: u64,
    url: String,
    depth: u32,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct FrontierState {
    heap: BinaryHeap<Reverse<Entry>>,
    seen: HashSet<String>,
    next_seq: u64,
}

pub struct Frontier {
    inner: Mutex<FrontierState>,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FrontierState {
                heap: BinaryHeap::new(),
                seen: HashSet::new(),
                next_seq: 0,
            }),
        }
    }

    /// Insert `url` into the queue and seen-set, atomically. Returns `false`
    /// without enqueuing if `url` was already in the seen-set — callers
    /// (`AdmissionPolicy`) are expected to have already decided to admit,
    /// this is the atomicity guarantee for the duplicate check, not a
    /// second policy decision.
    pub async fn admit(&self, url: String, depth: u32, priority: i64) -> bool {
        let mut state = self.inner.lock().await;
        if !state.seen.insert(url.clone()) {
            return false;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Reverse(Entry {
            priority,
            seq,
            url,
            depth,
        }));
        true
    }

    /// Pop the smallest-priority entry, or `None` if the queue is empty.
    pub async fn pop(&self) -> Option<WorkItem> {
        let mut state = self.inner.lock().await;
        state.heap.pop().map(|Reverse(e)| WorkItem {
            url: e.url,
            depth: e.depth,
            priority: e.priority,
        })
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.heap.len()
    }

    /// Record `url` as seen without enqueuing it — used for redirect
    /// targets, which must not be re-admitted later. Returns `true` if it
    /// was not already in the seen-set.
    pub async fn mark_visited(&self, url: &str) -> bool {
        self.inner.lock().await.seen.insert(url.to_string())
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.inner.lock().await.seen.contains(url)
    }

    pub async fn seen_count(&self) -> usize {
        self.inner.lock().await.seen.len()
    }
}

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];
const HTML_EXTENSIONS: [&str; 2] = [".html", ".htm"];

/// Compute the admission priority for `url` under `strategy`.
pub fn compute_priority(strategy: Strategy, url: &str, depth: u32) -> i64 {
    match strategy {
        Strategy::Bfs => depth as i64,
        Strategy::Dfs => -(depth as i64),
        Strategy::Priority => extension_class(url) as i64,
    }
}

fn extension_class(url: &str) -> u8 {
    let lower = url.to_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or(&lower);
    if path.ends_with('/') || HTML_EXTENSIONS.iter().any(|e| path.ends_with(e)) {
        0
    } else if IMAGE_EXTENSIONS.iter().any(|e| path.ends_with(e)) {
        1
    } else {
        2
    }
}
