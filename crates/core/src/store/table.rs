//! Keyed record table.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ids::EntityId;

/// A record kind held in the store.
pub trait Entity: Clone + Serialize + DeserializeOwned {
    /// Kind name used in logs and errors.
    const KIND: &'static str;

    fn id(&self) -> &EntityId;
}

/// Records of one kind keyed by id.
///
/// Serialised as a list sorted by id, so snapshots are byte-stable.
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: HashMap<EntityId, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<T: Entity> Table<T> {
    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.rows.get(id)
    }

    /// Owned copy for load-modify-save.
    pub fn load(&self, id: &EntityId) -> Option<T> {
        self.rows.get(id).cloned()
    }

    /// Existing record, or the one built by `create`. The flag is true when
    /// the record did not exist. Nothing is written until [`Table::save`].
    pub fn load_or_create(&self, id: &EntityId, create: impl FnOnce() -> T) -> (T, bool) {
        match self.rows.get(id) {
            Some(row) => (row.clone(), false),
            None => (create(), true),
        }
    }

    pub fn save(&mut self, row: T) {
        self.rows.insert(row.id().clone(), row);
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<T> {
        self.rows.remove(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.rows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }
}

impl<T: Entity> Serialize for Table<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut rows: Vec<&T> = self.rows.values().collect();
        rows.sort_by(|a, b| a.id().cmp(b.id()));
        rows.serialize(serializer)
    }
}

impl<'de, T: Entity> Deserialize<'de> for Table<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<T>::deserialize(deserializer)?;
        Ok(Self {
            rows: rows.into_iter().map(|r| (r.id().clone(), r)).collect(),
        })
    }
}
