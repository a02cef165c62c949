//! Transactions handed to views by the reference engine.

use std::sync::atomic::{AtomicU64, Ordering};

use viewlink_core::{Transaction, TransactionId};

static NEXT_TRANSACTION: AtomicU64 = AtomicU64::new(1);

/// A write transaction with a process-unique id.
#[derive(Debug)]
pub struct WriteTransaction {
    id: TransactionId,
}

impl WriteTransaction {
    #[must_use]
    pub fn begin() -> Self {
        Self {
            id: TransactionId(NEXT_TRANSACTION.fetch_add(1, Ordering::Relaxed)),
        }
    }
}

impl Transaction for WriteTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }
}
