//! In-flight request bookkeeping.
//!
//! Every outbound request registers a oneshot sender under its correlation id.
//! A caller that stops waiting (timeout, cancel) drops its `PendingRequest`,
//! which moves the id to a bounded abandoned set so a late response is
//! discarded instead of being reported as unmatched.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use super::wire::Reply;

/// Abandoned ids remembered for late-response suppression.
const ABANDONED_CAPACITY: usize = 1024;

/// Where an inbound response should go.
#[derive(Debug)]
pub enum Route {
    Deliver(oneshot::Sender<Reply>),
    Abandoned,
    Unmatched,
}

#[derive(Default)]
struct Table {
    waiting: HashMap<u64, oneshot::Sender<Reply>>,
    abandoned: HashSet<u64>,
    abandoned_order: VecDeque<u64>,
    closed: bool,
}

impl Table {
    fn abandon(&mut self, id: u64) {
        if self.waiting.remove(&id).is_none() {
            return;
        }
        if self.abandoned_order.len() >= ABANDONED_CAPACITY {
            if let Some(oldest) = self.abandoned_order.pop_front() {
                self.abandoned.remove(&oldest);
            }
        }
        self.abandoned.insert(id);
        self.abandoned_order.push_back(id);
    }
}

/// Shared table of waiting callers for one connection.
#[derive(Clone, Default)]
pub struct PendingTable {
    inner: Arc<Mutex<Table>>,
}

impl PendingTable {
    fn lock(&self) -> std::sync::MutexGuard<'_, Table> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `id`. Returns `None` once the connection has closed.
    pub fn register(&self, id: u64) -> Option<PendingRequest> {
        let (tx, rx) = oneshot::channel();
        let mut table = self.lock();
        if table.closed {
            return None;
        }
        table.waiting.insert(id, tx);
        drop(table);
        Some(PendingRequest {
            id,
            rx,
            table: self.clone(),
            settled: false,
        })
    }

    /// Take the route for a response to `id`. Each id is routed at most once.
    pub fn route(&self, id: u64) -> Route {
        let mut table = self.lock();
        if let Some(tx) = table.waiting.remove(&id) {
            Route::Deliver(tx)
        } else if table.abandoned.remove(&id) {
            table.abandoned_order.retain(|&a| a != id);
            Route::Abandoned
        } else {
            Route::Unmatched
        }
    }

    /// Forget a request whose write failed.
    pub fn discard(&self, id: u64) {
        self.lock().waiting.remove(&id);
    }

    /// Fail every waiting caller and refuse new registrations.
    pub fn close(&self) -> usize {
        let mut table = self.lock();
        table.closed = true;
        let failed = table.waiting.len();
        // Dropping the senders wakes every receiver with an error.
        table.waiting.clear();
        failed
    }

    pub fn in_flight(&self) -> usize {
        self.lock().waiting.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// A registered request awaiting its response.
pub struct PendingRequest {
    id: u64,
    rx: oneshot::Receiver<Reply>,
    table: PendingTable,
    settled: bool,
}

impl PendingRequest {
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the response. `None` means the connection closed first.
    pub async fn response(mut self) -> Option<Reply> {
        let reply = (&mut self.rx).await.ok();
        self.settled = true;
        reply
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if !self.settled {
            self.table.lock().abandon(self.id);
        }
    }
}
