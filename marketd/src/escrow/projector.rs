//! Order item status projection
//!
//! Each successful protocol step ends in exactly one durable write: the new
//! `rawtx` value and the resulting status land in the same transaction.
//! A mid-step failure therefore leaves the status unchanged and `rawtx`
//! holding the last successfully computed value, which retries re-derive
//! from.

use shared::order::{OrderItem, OrderStatus};
use tracing::info;

use crate::error::ProtocolResult;
use crate::storage::{MarketStorage, StorageError};

pub struct OrderStatusProjector {
    storage: MarketStorage,
}

impl OrderStatusProjector {
    pub fn new(storage: MarketStorage) -> Self {
        Self { storage }
    }

    /// Persist the step outcome: overwrite `rawtx` and set the new status
    pub fn apply(
        &self,
        item: &OrderItem,
        status: OrderStatus,
        rawtx: &str,
    ) -> ProtocolResult<OrderItem> {
        let mut updated = item.clone();
        updated.status = status;

        let txn = self.storage.begin_write()?;
        self.storage.put_object(&txn, &item.id, "rawtx", rawtx)?;
        self.storage.store_order_item(&txn, &updated)?;
        txn.commit().map_err(StorageError::from)?;

        info!(
            order_item = %item.id,
            from = %item.status,
            to = %status,
            "order item status projected"
        );
        Ok(updated)
    }
}
