use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of highlight ids. Collisions are not assumed impossible: the store
/// rejects a colliding id with `DuplicateId`.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;

    /// Called with ids that entered a list from outside the generator, such
    /// as imported records, so they are never minted again.
    fn observe(&self, _id: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    pub fn starting_at(prefix: impl Into<String>, first: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(first),
        }
    }

}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }

    fn observe(&self, id: &str) {
        let seen = id
            .strip_prefix(self.prefix.as_str())
            .and_then(|suffix| suffix.parse::<u64>().ok());
        if let Some(seen) = seen {
            self.next.fetch_max(seen.saturating_add(1), Ordering::Relaxed);
        }
    }
}
