//! The contract between the ingestion pipeline and a backing store.
//!
//! [`StoreAdapter`] covers point operations. [`BulkIngestible`] is the
//! capability importers need; a store without it cannot be handed to a
//! batch writer, which is checked at compile time.

use std::future::Future;

use bulkingest_shared::{BulkWriteOutcome, Keyed, Result, WriteMode};

/// Key type of a store's entity.
pub type KeyOf<S> = <<S as StoreAdapter>::Entity as Keyed>::Key;

/// Point operations against a backing store.
pub trait StoreAdapter {
    /// The entity kind this store holds.
    type Entity: Keyed;
    /// Selection criteria for `delete_many` and `count`.
    type Filter;

    /// Fetch the entity stored under `key`.
    fn find_one(
        &self,
        key: &<Self::Entity as Keyed>::Key,
    ) -> impl Future<Output = Result<Option<Self::Entity>>>;

    /// Delete the entity under `key`. Returns `true` if something was deleted.
    fn delete_one(
        &self,
        key: &<Self::Entity as Keyed>::Key,
    ) -> impl Future<Output = Result<bool>>;

    /// Delete every entity matching `filter`. Returns the number deleted.
    fn delete_many(&self, filter: &Self::Filter) -> impl Future<Output = Result<u64>>;

    /// Count entities matching `filter`.
    fn count(&self, filter: &Self::Filter) -> impl Future<Output = Result<u64>>;
}

/// Stores that accept whole batches as one atomic bulk operation.
pub trait BulkIngestible: StoreAdapter {
    /// Largest batch a single `bulk_write` may carry.
    const MAX_BATCH_SIZE: usize;

    /// Write `items` in one operation.
    ///
    /// Item-level rejections (duplicate key on insert, missing key) are
    /// reported in the outcome. `Err` means the call as a whole failed and
    /// nothing from this batch was written.
    fn bulk_write(
        &self,
        items: &[Self::Entity],
        mode: WriteMode,
    ) -> impl Future<Output = Result<BulkWriteOutcome>>;
}
