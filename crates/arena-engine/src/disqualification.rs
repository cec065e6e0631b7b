//! Run-wide record of disqualified strategies

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct Inner {
    members: HashSet<String>,
    order: Vec<String>,
}

/// Strategies excluded from every pairing for the rest of the run.
///
/// Written by the arbiter, read by the scheduler before each pairing.
/// Entries are never removed.
#[derive(Debug, Default)]
pub struct DisqualificationSet {
    inner: RwLock<Inner>,
}

impl DisqualificationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the strategy was not already disqualified
    pub fn insert(&self, name: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !inner.members.insert(name.to_string()) {
            return false;
        }
        inner.order.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .members
            .contains(name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disqualified names in the order they were disqualified
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_once() {
        let set = DisqualificationSet::new();
        assert!(set.is_empty());
        assert!(set.insert("joss"));
        assert!(!set.insert("joss"));
        assert!(set.contains("joss"));
        assert!(!set.contains("tit-for-tat"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_snapshot_keeps_order() {
        let set = DisqualificationSet::new();
        set.insert("b");
        set.insert("a");
        set.insert("b");
        assert_eq!(set.snapshot(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_concurrent_inserts() {
        let set = Arc::new(DisqualificationSet::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || set.insert(&format!("s{}", i % 4)))
            })
            .collect();
        let fresh = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|inserted| *inserted)
            .count();
        assert_eq!(fresh, 4);
        assert_eq!(set.len(), 4);
    }
}
