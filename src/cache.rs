use parking_lot::ReentrantMutex;
use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use crate::{any::AnyInstance, disposal::Disposer};

pub(crate) type KeyLock = Arc<ReentrantMutex<()>>;

/// Instances cached by a lifetime manager together with the disposers of everything it tracks.
///
/// Each key gets its own construction lock, so building one instance never blocks another key.
pub(crate) struct Cache<K> {
    pub(crate) map: BTreeMap<K, AnyInstance>,
    pub(crate) locks: BTreeMap<K, KeyLock>,
    pub(crate) tracked: TrackedSet<K>,
    pub(crate) disposed: bool,
}

impl<K: Ord + Clone> Cache<K> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            locks: BTreeMap::new(),
            tracked: TrackedSet::new(),
            disposed: false,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, key: &K) -> Option<AnyInstance> {
        self.map.get(key).cloned()
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Construction lock of `key`, created on first use
    #[must_use]
    pub(crate) fn lock_for(&mut self, key: &K) -> KeyLock {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
            .clone()
    }

    #[inline]
    pub(crate) fn insert(&mut self, key: K, instance: AnyInstance, disposers: Vec<Disposer>) {
        for disposer in disposers {
            self.tracked.push(key.clone(), disposer);
        }
        self.map.insert(key, instance);
    }

    /// Removes the entries matching `predicate`, returning their disposers in tracking order
    #[must_use]
    pub(crate) fn take_matching(&mut self, predicate: impl Fn(&K) -> bool) -> Vec<Disposer> {
        self.map.retain(|key, _| !predicate(key));
        self.locks.retain(|key, _| !predicate(key));
        self.tracked.take_matching(predicate)
    }

    /// Clears the cache and marks it disposed, returning all disposers in tracking order
    #[must_use]
    pub(crate) fn drain(&mut self) -> Vec<Disposer> {
        self.disposed = true;
        self.map.clear();
        self.locks.clear();
        self.tracked.take_all()
    }
}

pub(crate) struct TrackedSet<K>(pub(crate) VecDeque<(K, Disposer)>);

impl<K> TrackedSet<K> {
    pub(crate) fn new() -> Self {
        Self(VecDeque::new())
    }

    pub(crate) fn push(&mut self, key: K, disposer: Disposer) {
        self.0.push_back((key, disposer));
    }

    #[must_use]
    pub(crate) fn take_all(&mut self) -> Vec<Disposer> {
        self.0.drain(..).map(|(_, disposer)| disposer).collect()
    }

    #[must_use]
    pub(crate) fn take_matching(&mut self, predicate: impl Fn(&K) -> bool) -> Vec<Disposer> {
        let (taken, kept) = self.0.drain(..).partition::<VecDeque<_>, _>(|(key, _)| predicate(key));
        self.0 = kept;
        taken.into_iter().map(|(_, disposer)| disposer).collect()
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::Cache;
    use crate::{any::erase, disposal::Disposer};

    use std::sync::Arc;

    #[test]
    fn test_lock_per_key() {
        let mut cache = Cache::<(u8, Option<u8>)>::new();

        let lock = cache.lock_for(&(1, Some(1)));
        assert!(Arc::ptr_eq(&lock, &cache.lock_for(&(1, Some(1)))));
        assert!(!Arc::ptr_eq(&lock, &cache.lock_for(&(2, Some(1)))));

        // Another key stays available while one is held
        let _guard = lock.lock();
        assert!(cache.lock_for(&(2, Some(1))).try_lock().is_some());

        let _ = cache.take_matching(|(_, scope)| *scope == Some(1));
        assert!(cache.locks.is_empty());
    }

    #[test]
    fn test_take_matching_keeps_order() {
        let mut cache = Cache::<(u8, Option<u8>)>::new();
        for (key, name) in [((1, None), "a"), ((2, Some(1)), "b"), ((3, Some(1)), "c"), ((4, Some(2)), "d")] {
            cache.insert(key, erase(Arc::new(key.0)), vec![Disposer::from_fn(name, || Ok(()))]);
        }

        let taken = cache.take_matching(|(_, scope)| *scope == Some(1));
        assert_eq!(taken.iter().map(Disposer::service).collect::<Vec<_>>(), ["b", "c"]);
        assert_eq!(cache.map.len(), 2);
        assert_eq!(cache.tracked.len(), 2);

        let drained = cache.drain();
        assert_eq!(drained.iter().map(Disposer::service).collect::<Vec<_>>(), ["a", "d"]);
        assert!(cache.disposed);
        assert!(cache.map.is_empty());
    }
}
