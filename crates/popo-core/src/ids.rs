//! Id generation for new profiles, processes and steps.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::EntityId;

/// Source of fresh entity ids.
pub trait IdGenerator {
    fn generate(&self) -> String;

    fn next_id(&self) -> EntityId {
        EntityId::Text(self.generate())
    }
}

/// Random UUID v4 ids. Used for real documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` ids, counting from 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}

impl<T: IdGenerator + ?Sized> IdGenerator for Box<T> {
    fn generate(&self) -> String {
        (**self).generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn random_ids_are_unique_uuids() {
        let ids: HashSet<String> = (0..64).map(|_| RandomIds.generate()).collect();
        assert_eq!(ids.len(), 64);
        assert!(ids.iter().all(|id| uuid::Uuid::parse_str(id).is_ok()));
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new("t");
        assert_eq!(ids.generate(), "t-1");
        assert_eq!(ids.next_id(), EntityId::from("t-2"));
    }
}
