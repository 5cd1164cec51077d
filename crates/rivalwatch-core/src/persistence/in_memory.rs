use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use crate::models::{
    ChangeEvent, CompetitorId, CoreError, CoreErrorKind, NewSubscriber, Subscriber, SubscriberId,
};
use crate::persistence::{ChangeHistoryStore, PersistenceResult, SubscriberStore};

/// Process-local store. History and subscribers are lost when it is dropped.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    changes: Vec<ChangeEvent>,
    next_subscriber_id: u64,
    subscribers: Vec<Subscriber>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> PersistenceResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| {
            CoreError::new(CoreErrorKind::Internal, "in-memory store mutex poisoned")
        })
    }
}

impl ChangeHistoryStore for InMemoryStore {
    fn append_change(&self, change: &ChangeEvent) -> PersistenceResult<()> {
        self.lock_state()?.changes.push(change.clone());
        Ok(())
    }

    fn list_changes(
        &self,
        competitor: Option<CompetitorId>,
        limit: usize,
    ) -> PersistenceResult<Vec<ChangeEvent>> {
        let state = self.lock_state()?;
        let mut selected: Vec<&ChangeEvent> = state
            .changes
            .iter()
            .filter(|change| competitor.is_none_or(|id| change.competitor_id == id))
            .collect();

        // Stable sort: ties stay in insertion order.
        selected.sort_by(|first, second| second.timestamp.cmp(&first.timestamp));

        Ok(selected.into_iter().take(limit).cloned().collect())
    }

    fn changes_since(&self, cutoff: SystemTime) -> PersistenceResult<Vec<ChangeEvent>> {
        let state = self.lock_state()?;
        Ok(state
            .changes
            .iter()
            .filter(|change| change.timestamp > cutoff)
            .cloned()
            .collect())
    }

    fn prune_to(&self, max_entries: usize) -> PersistenceResult<usize> {
        let mut state = self.lock_state()?;
        let excess = state.changes.len().saturating_sub(max_entries);
        state.changes.drain(..excess);
        Ok(excess)
    }
}

impl SubscriberStore for InMemoryStore {
    fn insert_subscriber(&self, subscriber: &NewSubscriber) -> PersistenceResult<Subscriber> {
        let mut state = self.lock_state()?;
        state.next_subscriber_id = state.next_subscriber_id.saturating_add(1);

        let stored = Subscriber {
            id: SubscriberId(state.next_subscriber_id),
            channel: subscriber.channel,
            address: subscriber.address.clone(),
            filters: subscriber.filters.clone(),
            created_at: subscriber.created_at,
        };
        state.subscribers.push(stored.clone());

        Ok(stored)
    }

    fn remove_subscriber(&self, id: SubscriberId) -> PersistenceResult<bool> {
        let mut state = self.lock_state()?;
        let before = state.subscribers.len();
        state.subscribers.retain(|subscriber| subscriber.id != id);
        Ok(state.subscribers.len() != before)
    }

    fn list_subscribers(&self) -> PersistenceResult<Vec<Subscriber>> {
        Ok(self.lock_state()?.subscribers.clone())
    }
}
