// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workload record storage.
//!
//! Records are replaced whole on every write, so readers never see a
//! partially applied update. Backends implement [`Store`]; the engine ships
//! [`MemoryStore`].

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;

/// In-place change applied by [`Store::update_with`]; returns true if it
/// modified the record.
pub type Change<T> = Box<dyn FnOnce(&mut T) -> bool + Send>;

/// A record kept in a [`Store`].
pub trait Entity: Clone + Send + Sync + 'static {
    /// Kind name used in error messages.
    const KIND: &'static str;

    /// Unique identifier.
    fn id(&self) -> &str;
}

/// Keyed record storage.
#[async_trait]
pub trait Store<T: Entity>: Send + Sync {
    /// Insert a new record. Fails with `Conflict` if the id is taken.
    async fn create(&self, entity: T) -> Result<()>;

    /// Fetch a record by id. Fails with `NotFound`.
    async fn get(&self, id: &str) -> Result<T>;

    /// Snapshot of all records, in no particular order.
    async fn list(&self) -> Result<Vec<T>>;

    /// Replace an existing record. Fails with `NotFound` if it is absent.
    async fn update(&self, entity: T) -> Result<()>;

    /// Apply `change` to a stored record as one atomic step.
    ///
    /// Returns the record as stored afterwards and whether `change` modified
    /// it. Fails with `NotFound` if the record is absent.
    async fn update_with(&self, id: &str, change: Change<T>) -> Result<(T, bool)>;

    /// Remove a record. Removing an absent id succeeds.
    async fn delete(&self, id: &str) -> Result<()>;
}
