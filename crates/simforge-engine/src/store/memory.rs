// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process store behind a single read/write lock.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Change, Entity, Store};
use crate::error::{Error, Result};

/// In-memory [`Store`] backend.
pub struct MemoryStore<T> {
    records: RwLock<HashMap<String, T>>,
}

impl<T> MemoryStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> Store<T> for MemoryStore<T> {
    async fn create(&self, entity: T) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(entity.id()) {
            return Err(Error::Conflict {
                entity: T::KIND,
                id: entity.id().to_string(),
            });
        }
        records.insert(entity.id().to_string(), entity);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<T> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(T::KIND, id))
    }

    async fn list(&self) -> Result<Vec<T>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn update(&self, entity: T) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(entity.id()) {
            Some(slot) => {
                *slot = entity;
                Ok(())
            }
            None => Err(Error::not_found(T::KIND, entity.id())),
        }
    }

    async fn update_with(&self, id: &str, change: Change<T>) -> Result<(T, bool)> {
        let mut records = self.records.write().await;
        let slot = records
            .get_mut(id)
            .ok_or_else(|| Error::not_found(T::KIND, id))?;
        let mut candidate = slot.clone();
        if !change(&mut candidate) {
            return Ok((slot.clone(), false));
        }
        *slot = candidate.clone();
        Ok((candidate, true))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.write().await.remove(id);
        Ok(())
    }
}
