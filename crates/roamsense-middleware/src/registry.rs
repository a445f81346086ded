//! Process-wide single-instance registry.
//!
//! Each physical sensor stream must be subscribed exactly once per process,
//! so providers are constructed through [`get_or_init`]: the first call for
//! a `(type, key)` pair builds the instance, every later call returns the
//! same [`Arc`] and drops its own arguments unused.
//!
//! [`reset`] forgets an instance so tests (or a supervised restart) can
//! build a fresh one.  Instances that are still referenced
//! elsewhere keep running until their last `Arc` is dropped.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tracing::debug;

type Slot = Arc<dyn Any + Send + Sync>;

static REGISTRY: LazyLock<Mutex<HashMap<(TypeId, String), Slot>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Return the registered `T` for `key`, building it with `init` on first use.
///
/// `init` runs while the registry lock is held and must not call back into
/// the registry.
pub fn get_or_init<T, F>(key: &str, init: F) -> Arc<T>
where
    T: Any + Send + Sync,
    F: FnOnce() -> T,
{
    let id = (TypeId::of::<T>(), key.to_string());
    let mut map = REGISTRY.lock();
    if let Some(existing) = map.get(&id).cloned().and_then(|slot| slot.downcast::<T>().ok()) {
        debug!(key, "reusing registered instance");
        return existing;
    }
    let fresh = Arc::new(init());
    map.insert(id, fresh.clone());
    fresh
}

/// The registered `T` for `key`, if any.
pub fn get<T: Any + Send + Sync>(key: &str) -> Option<Arc<T>> {
    REGISTRY
        .lock()
        .get(&(TypeId::of::<T>(), key.to_string()))
        .cloned()
        .and_then(|slot| slot.downcast::<T>().ok())
}

/// Forget the `T` registered under `key`.  Returns whether one existed.
pub fn reset<T: Any + Send + Sync>(key: &str) -> bool {
    REGISTRY
        .lock()
        .remove(&(TypeId::of::<T>(), key.to_string()))
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Probe(u32);

    #[derive(Debug)]
    struct OtherProbe(u32);

    #[test]
    fn first_construction_wins() {
        let builds = AtomicUsize::new(0);
        let a = get_or_init("first-wins", || {
            builds.fetch_add(1, Ordering::SeqCst);
            Probe(1)
        });
        let b = get_or_init("first-wins", || {
            builds.fetch_add(1, Ordering::SeqCst);
            Probe(2)
        });
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.0, 1);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        reset::<Probe>("first-wins");
    }

    #[test]
    fn keys_and_types_are_independent() {
        let a = get_or_init("k1", || Probe(1));
        let b = get_or_init("k2", || Probe(2));
        let c = get_or_init("k1", || OtherProbe(3));
        assert_eq!((a.0, b.0, c.0), (1, 2, 3));
        reset::<Probe>("k1");
        reset::<Probe>("k2");
        reset::<OtherProbe>("k1");
    }

    #[test]
    fn reset_allows_rebuild() {
        let a = get_or_init("rebuild", || Probe(1));
        assert!(get::<Probe>("rebuild").is_some());
        assert!(reset::<Probe>("rebuild"));
        assert!(!reset::<Probe>("rebuild"));
        assert!(get::<Probe>("rebuild").is_none());
        let b = get_or_init("rebuild", || Probe(2));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.0, 2);
        reset::<Probe>("rebuild");
    }

    #[test]
    fn concurrent_first_use_builds_once() {
        #[derive(Debug)]
        struct Racer;
        static BUILDS: AtomicUsize = AtomicUsize::new(0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    get_or_init("race", || {
                        BUILDS.fetch_add(1, Ordering::SeqCst);
                        Racer
                    })
                })
            })
            .collect();
        let instances: Vec<Arc<Racer>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
        reset::<Racer>("race");
    }
}
