//! Type-keyed, write-once cache of base assets.
//!
//! Each key type gets its own slot with its own lock, so the derivation for
//! one type runs at most once per process and never blocks other types.
//! A failed derivation leaves the slot empty for the next caller.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use log::debug;
use parking_lot::Mutex;

type Slot = Arc<Mutex<Option<Arc<[u8]>>>>;

static SLOTS: LazyLock<Mutex<HashMap<TypeId, Slot>>> = LazyLock::new(Default::default);

fn slot<K: 'static>() -> Slot {
    Arc::clone(SLOTS.lock().entry(TypeId::of::<K>()).or_default())
}

/// Cached bytes for `K`, deriving them with `init` on first use.
pub fn get_or_try_init<K, E, F>(init: F) -> Result<Arc<[u8]>, E>
where
    K: 'static,
    F: FnOnce() -> Result<Vec<u8>, E>,
{
    let slot = slot::<K>();
    let mut cached = slot.lock();
    if let Some(data) = cached.as_ref() {
        return Ok(Arc::clone(data));
    }
    let data: Arc<[u8]> = init()?.into();
    debug!("cached {} bytes of base data for {}", data.len(), type_name::<K>());
    *cached = Some(Arc::clone(&data));
    Ok(data)
}

/// Cached bytes for `K` if they were already derived.
pub fn peek<K: 'static>() -> Option<Arc<[u8]>> {
    let slot = SLOTS.lock().get(&TypeId::of::<K>()).cloned()?;
    let cached = slot.lock();
    cached.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_init_runs_once() {
        struct Key;
        let calls = AtomicUsize::new(0);
        let derive = || -> Result<Vec<u8>, ()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1, 2, 3])
        };

        let first = get_or_try_init::<Key, _, _>(derive).unwrap();
        let second = get_or_try_init::<Key, _, _>(derive).unwrap();
        assert_eq!(&*first, &[1, 2, 3]);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_keys_are_independent() {
        struct Left;
        struct Right;
        let left = get_or_try_init::<Left, (), _>(|| Ok(vec![0xAA])).unwrap();
        let right = get_or_try_init::<Right, (), _>(|| Ok(vec![0xBB])).unwrap();
        assert_eq!(&*left, &[0xAA]);
        assert_eq!(&*right, &[0xBB]);
    }

    #[test]
    fn test_failure_is_not_cached() {
        struct Flaky;
        assert!(peek::<Flaky>().is_none());
        let err = get_or_try_init::<Flaky, _, _>(|| Err("missing rom"));
        assert_eq!(err.unwrap_err(), "missing rom");
        assert!(peek::<Flaky>().is_none());

        let ok = get_or_try_init::<Flaky, &str, _>(|| Ok(vec![9])).unwrap();
        assert_eq!(&*ok, &[9]);
        assert_eq!(peek::<Flaky>().as_deref(), Some(&[9u8][..]));
    }

    #[test]
    fn test_racing_threads_derive_once() {
        struct Raced;
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    get_or_try_init::<Raced, (), _>(|| {
                        CALLS.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        Ok(vec![7; 64])
                    })
                    .unwrap()
                })
            })
            .collect();
        let results: Vec<Arc<[u8]>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| **r == [7u8; 64]));
    }
}
