//! Best-effort memory of things already done once.
//!
//! Handlers are stateless, so this only masks duplicates that land on the
//! same instance (e.g. a provider retrying a webhook). It is bounded and
//! forgets the oldest keys first.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

use uuid::Uuid;

pub const DEFAULT_LEDGER_CAPACITY: usize = 1024;

/// Runs whose outcome was reported.
pub type ReportLedger = Ledger<Uuid>;

/// One call leg fed back into the loop: run id, dialed number, and the
/// attempts left in the list after dialing it. The count strictly decreases
/// from one dial to the next, so a legitimate redial of the same number is a
/// different key.
pub type HopKey = (Uuid, String, u64);

/// Call legs whose result already re-entered the loop.
pub type HopLedger = Ledger<HopKey>;

#[derive(Debug)]
struct Entries<K> {
    seen: HashSet<K>,
    order: VecDeque<K>,
}

#[derive(Debug)]
pub struct Ledger<K> {
    entries: Mutex<Entries<K>>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone> Default for Ledger<K> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LEDGER_CAPACITY)
    }
}

impl<K: Eq + Hash + Clone> Ledger<K> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries {
                seen: HashSet::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Record `key`. Returns `false` if it was already recorded.
    pub fn claim(&self, key: K) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if !entries.seen.insert(key.clone()) {
            return false;
        }
        entries.order.push_back(key);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.seen.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
