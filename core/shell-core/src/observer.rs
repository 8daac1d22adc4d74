//! Minimal subscribe/notify registry shared by the observable stores.

use std::fmt;

/// Handle returned by `subscribe`; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub(crate) struct Listeners<T: ?Sized> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Box<dyn Fn(&T) + Send + Sync>)>,
}

impl<T: ?Sized> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, listener: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let listener: Box<dyn Fn(&T) + Send + Sync> = Box::new(listener);
        self.entries.push((id, listener));
        id
    }

    /// Returns false if the id was never issued or already removed.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub(crate) fn notify(&self, value: &T) {
        for (_, listener) in &self.entries {
            listener(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T: ?Sized> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}
