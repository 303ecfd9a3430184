use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use parking_lot::{Mutex, MutexGuard};

use crate::buffer::TransactionBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Vote or result reported back to whatever coordinates a multi-resource transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    Prepared,
    Committed,
    RolledBack,
    Failed(String),
}

impl TransactionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Resource-manager side of a two-phase commit.
pub trait TransactionParticipant {
    fn prepare(&self, txid: TransactionId) -> TransactionOutcome;

    fn commit(&self, txid: TransactionId) -> TransactionOutcome;

    fn rollback(&self, txid: TransactionId) -> TransactionOutcome;

    /// Unpersisted work is discarded when the coordinator cannot decide.
    fn in_doubt(&self, txid: TransactionId) -> TransactionOutcome {
        self.rollback(txid)
    }
}

/// Open transactions and their buffers. Buffers appear on the first write.
#[derive(Debug, Default)]
pub(crate) struct TransactionTable {
    next_id: AtomicU64,
    inner: Mutex<TableInner>,
}

#[derive(Debug, Default)]
pub(crate) struct TableInner {
    open: BTreeSet<TransactionId>,
    buffers: HashMap<TransactionId, TransactionBuffer>,
}

impl TransactionTable {
    pub(crate) fn begin(&self) -> TransactionId {
        let txid = TransactionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner.lock().open.insert(txid);
        txid
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock()
    }
}

impl TableInner {
    pub(crate) fn is_open(&self, txid: TransactionId) -> bool {
        self.open.contains(&txid)
    }

    pub(crate) fn open_ids(&self) -> Vec<TransactionId> {
        self.open.iter().copied().collect()
    }

    /// Removes the buffer for `txid` so it can be mutated while the others stay readable.
    pub(crate) fn checkout(&mut self, txid: TransactionId) -> Result<TransactionBuffer> {
        if !self.is_open(txid) {
            return Err(anyhow!("transaction {txid} is not open"));
        }
        Ok(self.buffers.remove(&txid).unwrap_or_else(|| {
            tracing::debug!(%txid, "enlisting install ledger in transaction");
            TransactionBuffer::default()
        }))
    }

    pub(crate) fn checkin(&mut self, txid: TransactionId, buffer: TransactionBuffer) {
        self.buffers.insert(txid, buffer);
    }

    pub(crate) fn buffer(&self, txid: TransactionId) -> Option<&TransactionBuffer> {
        self.buffers.get(&txid)
    }

    pub(crate) fn buffers(&self) -> impl Iterator<Item = &TransactionBuffer> {
        self.buffers.values()
    }

    /// Closes `txid`; `None` when it was never opened or is already closed.
    pub(crate) fn close(&mut self, txid: TransactionId) -> Option<Option<TransactionBuffer>> {
        if !self.open.remove(&txid) {
            return None;
        }
        Some(self.buffers.remove(&txid))
    }
}
