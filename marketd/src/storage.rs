//! redb-based persistence for the protocol node
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `bids` | `(listing_hash, seq)` | `Bid` | Per-listing negotiation log (append-only) |
//! | `orders` | `order_hash` | `Order` | Materialized orders |
//! | `order_items` | `order_item_id` | `OrderItem` | Escrow protocol units |
//! | `order_item_objects` | `(order_item_id, data_id)` | string | Protocol scratchpad |
//! | `item_index` | `item_hash` | `order_item_id` | Escrow message routing |
//!
//! "Latest bid" is defined by the per-listing sequence number allocated at
//! append time, so the ordering survives clock skew between peers. Object
//! entries are overwritten in place; there is no version token, so two
//! concurrent writers for the same order item can clobber each other's
//! `rawtx` — callers serialize per message by design.

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use shared::bid::Bid;
use shared::order::{Order, OrderItem, OrderItemObject};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Bid log: key = (listing item hash, sequence), value = JSON-serialized Bid
const BIDS_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("bids");

/// Orders: key = order hash, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Order items: key = order item id, value = JSON-serialized OrderItem
const ORDER_ITEMS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("order_items");

/// Protocol scratchpad: key = (order item id, data id), value = raw string
const ORDER_ITEM_OBJECTS_TABLE: TableDefinition<(&str, &str), &str> =
    TableDefinition::new("order_item_objects");

/// Routing index: key = listing item hash, value = order item id
const ITEM_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("item_index");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Protocol storage backed by redb
///
/// Commits are durable as soon as `commit()` returns; the database file is
/// always in a consistent state after power loss.
#[derive(Clone)]
pub struct MarketStorage {
    db: Arc<Database>,
}

impl MarketStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BIDS_TABLE)?;
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDER_ITEMS_TABLE)?;
            let _ = write_txn.open_table(ORDER_ITEM_OBJECTS_TABLE)?;
            let _ = write_txn.open_table(ITEM_INDEX_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ==================== Bids ====================

    /// Append a bid to the listing's negotiation log, returning the
    /// allocated sequence number
    pub fn append_bid(&self, txn: &WriteTransaction, bid: &Bid) -> StorageResult<u64> {
        let mut table = txn.open_table(BIDS_TABLE)?;
        let listing = bid.listing_item_hash.as_str();
        let next_seq = {
            let mut range = table.range((listing, 0u64)..=(listing, u64::MAX))?;
            match range.next_back() {
                Some(entry) => entry?.0.value().1 + 1,
                None => 0,
            }
        };
        let bytes = serde_json::to_vec(bid)?;
        table.insert((listing, next_seq), bytes.as_slice())?;
        Ok(next_seq)
    }

    /// Latest bid for a listing, by sequence number
    pub fn latest_bid(&self, listing: &str) -> StorageResult<Option<Bid>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BIDS_TABLE)?;
        let mut range = table.range((listing, 0u64)..=(listing, u64::MAX))?;
        match range.next_back() {
            Some(entry) => {
                let (_, value) = entry?;
                Ok(Some(serde_json::from_slice(value.value())?))
            }
            None => Ok(None),
        }
    }

    /// Full negotiation history for a listing, in append order
    pub fn bids_for_listing(&self, listing: &str) -> StorageResult<Vec<Bid>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BIDS_TABLE)?;
        let mut bids = Vec::new();
        for entry in table.range((listing, 0u64)..=(listing, u64::MAX))? {
            let (_, value) = entry?;
            bids.push(serde_json::from_slice(value.value())?);
        }
        Ok(bids)
    }

    /// Look up a bid row by id (scans the listing's log)
    pub fn find_bid(&self, listing: &str, bid_id: &str) -> StorageResult<Option<Bid>> {
        Ok(self
            .bids_for_listing(listing)?
            .into_iter()
            .find(|b| b.id == bid_id))
    }

    // ==================== Orders ====================

    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let bytes = serde_json::to_vec(order)?;
        table.insert(order.hash.as_str(), bytes.as_slice())?;
        Ok(())
    }

    pub fn get_order(&self, hash: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(hash)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // ==================== Order items ====================

    /// Store an order item and index it by listing item hash
    pub fn store_order_item(&self, txn: &WriteTransaction, item: &OrderItem) -> StorageResult<()> {
        let mut table = txn.open_table(ORDER_ITEMS_TABLE)?;
        let bytes = serde_json::to_vec(item)?;
        table.insert(item.id.as_str(), bytes.as_slice())?;

        let mut index = txn.open_table(ITEM_INDEX_TABLE)?;
        index.insert(item.item_hash.as_str(), item.id.as_str())?;
        Ok(())
    }

    pub fn get_order_item(&self, id: &str) -> StorageResult<Option<OrderItem>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDER_ITEMS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Resolve the order item an escrow message refers to
    pub fn find_order_item_by_hash(&self, item_hash: &str) -> StorageResult<Option<OrderItem>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ITEM_INDEX_TABLE)?;
        let id = match index.get(item_hash)? {
            Some(value) => value.value().to_string(),
            None => return Ok(None),
        };
        drop(index);
        drop(read_txn);
        self.get_order_item(&id)
    }

    // ==================== Order item objects ====================

    /// Insert or overwrite a scratchpad entry (unique per `data_id`)
    pub fn put_object(
        &self,
        txn: &WriteTransaction,
        order_item_id: &str,
        data_id: &str,
        data_value: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(ORDER_ITEM_OBJECTS_TABLE)?;
        table.insert((order_item_id, data_id), data_value)?;
        Ok(())
    }

    pub fn get_object(&self, order_item_id: &str, data_id: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDER_ITEM_OBJECTS_TABLE)?;
        match table.get((order_item_id, data_id))? {
            Some(value) => Ok(Some(value.value().to_string())),
            None => Ok(None),
        }
    }

    /// All scratchpad entries for an order item, in key order
    pub fn objects_for_item(&self, order_item_id: &str) -> StorageResult<Vec<OrderItemObject>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDER_ITEM_OBJECTS_TABLE)?;
        let mut objects = Vec::new();
        // Open-ended prefix scan; keys sort by item id first
        for entry in table.range((order_item_id, "")..)? {
            let (key, value) = entry?;
            if key.value().0 != order_item_id {
                break;
            }
            objects.push(OrderItemObject {
                data_id: key.value().1.to_string(),
                data_value: value.value().to_string(),
            });
        }
        Ok(objects)
    }
}
