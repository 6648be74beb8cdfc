//! Copy-on-write maps for read-mostly session tables.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

/// A map whose readers never block.
///
/// Readers load the current snapshot atomically. Writers serialize on a
/// mutex, clone the snapshot, apply their change and publish the result, so
/// a reader sees either the whole update or none of it.
pub(crate) struct SnapshotMap<K, V> {
    current: ArcSwap<HashMap<K, V>>,
    writer: Mutex<()>,
}

impl<K, V> SnapshotMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(HashMap::new()),
            writer: Mutex::new(()),
        }
    }

    /// The current snapshot.
    pub(crate) fn load(&self) -> Arc<HashMap<K, V>> {
        self.current.load_full()
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.current.load().get(key).cloned()
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.current.load().contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.current.load().len()
    }

    /// Applies `f` to a private copy and publishes it.
    ///
    /// The copy is discarded when `f` fails, leaving the published map intact.
    pub(crate) fn update<R, E>(
        &self,
        f: impl FnOnce(&mut HashMap<K, V>) -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = HashMap::clone(&self.current.load());
        let result = f(&mut next)?;
        self.current.store(Arc::new(next));
        Ok(result)
    }

    pub(crate) fn clear(&self) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.current.store(Arc::new(HashMap::new()));
    }
}

impl<K, V> fmt::Debug for SnapshotMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotMap")
            .field("len", &self.current.load().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_update_publishes_atomically() {
        let map: SnapshotMap<i32, &str> = SnapshotMap::new();
        let before = map.load();
        map.update(|m| {
            m.insert(1, "one");
            Ok::<_, ()>(())
        })
        .unwrap();
        assert!(before.is_empty());
        assert_eq!(map.get(&1), Some("one"));
    }

    #[test]
    fn test_failed_update_is_discarded() {
        let map: SnapshotMap<i32, i32> = SnapshotMap::new();
        let result = map.update(|m| {
            m.insert(1, 1);
            Err::<(), _>("rejected")
        });
        assert_eq!(result, Err("rejected"));
        assert!(!map.contains_key(&1));
    }

    #[test]
    fn test_concurrent_writers_all_land() {
        let map = Arc::new(SnapshotMap::<i32, i32>::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for j in 0..50 {
                        map.update(|m| {
                            m.insert(i * 100 + j, j);
                            Ok::<_, ()>(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), 400);
    }

    #[test]
    fn test_clear() {
        let map: SnapshotMap<&str, i32> = SnapshotMap::new();
        map.update(|m| {
            m.insert("a", 1);
            Ok::<_, ()>(())
        })
        .unwrap();
        map.clear();
        assert_eq!(map.len(), 0);
    }
}
