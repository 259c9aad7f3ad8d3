//! Per-run typed multimap shared between pipeline stages.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Values published by one stage for the stages that follow.
///
/// Keyed by type: the table-definition importer publishes every parsed
/// [`Table`](crate::core::Table), the database-information stages publish a
/// single [`DatabaseInformation`](crate::core::DatabaseInformation), and so on.
/// Values keep insertion order within a type.
#[derive(Default)]
pub struct Context {
    entries: HashMap<TypeId, Vec<Box<dyn Any + Send + Sync>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value.
    pub fn put<T: Any + Send + Sync>(&mut self, value: T) {
        self.entries
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Box::new(value));
    }

    /// Add every value of an iterator.
    pub fn put_all<T, I>(&mut self, values: I)
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = T>,
    {
        let slot = self.entries.entry(TypeId::of::<T>()).or_default();
        slot.extend(values.into_iter().map(|v| Box::new(v) as Box<dyn Any + Send + Sync>));
    }

    /// The first value of type `T`, if any.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|values| values.first())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Every value of type `T`, in insertion order.
    pub fn get_all<T: Any + Send + Sync>(&self) -> Vec<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .map(|values| values.iter().filter_map(|v| v.downcast_ref::<T>()).collect())
            .unwrap_or_default()
    }

    /// Number of values stored for type `T`.
    pub fn count<T: Any + Send + Sync>(&self) -> usize {
        self.entries.get(&TypeId::of::<T>()).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("types", &self.entries.len())
            .finish()
    }
}
