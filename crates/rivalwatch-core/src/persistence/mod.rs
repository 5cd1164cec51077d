pub mod in_memory;

pub use in_memory::InMemoryStore;

use std::time::SystemTime;

use crate::models::{
    ChangeEvent, CompetitorId, CoreResult, NewSubscriber, Subscriber, SubscriberId,
};

pub type PersistenceResult<T> = CoreResult<T>;

pub trait MigrationStore: Send + Sync {
    fn current_version(&self) -> PersistenceResult<i64>;

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()>;
}

pub trait ChangeHistoryStore: Send + Sync {
    fn append_change(&self, change: &ChangeEvent) -> PersistenceResult<()>;

    /// Newest first; equal timestamps keep insertion order.
    fn list_changes(
        &self,
        competitor: Option<CompetitorId>,
        limit: usize,
    ) -> PersistenceResult<Vec<ChangeEvent>>;

    /// Changes strictly newer than `cutoff`, oldest first.
    fn changes_since(&self, cutoff: SystemTime) -> PersistenceResult<Vec<ChangeEvent>>;

    /// Drops the oldest entries until at most `max_entries` remain. Returns
    /// the number of entries removed.
    fn prune_to(&self, max_entries: usize) -> PersistenceResult<usize>;
}

pub trait SubscriberStore: Send + Sync {
    fn insert_subscriber(&self, subscriber: &NewSubscriber) -> PersistenceResult<Subscriber>;

    /// Returns whether a subscriber with that id existed.
    fn remove_subscriber(&self, id: SubscriberId) -> PersistenceResult<bool>;

    /// Ordered by id.
    fn list_subscribers(&self) -> PersistenceResult<Vec<Subscriber>>;
}
