//! The handle table.

use std::collections::HashMap;
use std::ffi::c_void;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::handle::{Handle, TypeTag};

/// Registered address. The registry never dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawPtr(*mut c_void);

// SAFETY: the registry only stores and returns addresses; whoever
// dereferences a retrieved pointer is responsible for synchronizing
// access to the pointee and for not using it after release.
unsafe impl Send for RawPtr {}

#[derive(Debug, Default)]
struct Table {
    entries: HashMap<Handle, RawPtr>,
    counters: HashMap<TypeTag, u64>,
}

/// Thread-safe, non-owning map from handles to native pointers.
///
/// Ids are assigned per tag starting at 0 and never reused, including
/// across [`flush`](HandleRegistry::flush). Every operation takes the same
/// lock; the lock is not held while a caller uses a retrieved pointer.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    table: Mutex<Table>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ptr` under `tag` and return its new handle.
    pub fn store<T>(&self, tag: &TypeTag, ptr: *mut T) -> Handle {
        let mut table = self.table.lock();
        let counter = table.counters.entry(tag.clone()).or_insert(0);
        let handle = Handle {
            tag: tag.clone(),
            id: *counter,
        };
        *counter += 1;
        table.entries.insert(handle.clone(), RawPtr(ptr.cast()));
        debug!(%handle, "stored");
        handle
    }

    /// The pointer registered under `handle`.
    pub fn retrieve<T>(&self, handle: &Handle) -> Result<*mut T> {
        self.table
            .lock()
            .entries
            .get(handle)
            .map(|p| p.0.cast())
            .ok_or_else(|| RegistryError::HandleMiss {
                handle: handle.to_string(),
            })
    }

    /// Parse a token and look it up. Malformed text is rejected before lookup.
    pub fn retrieve_token<T>(&self, token: &str) -> Result<*mut T> {
        let handle: Handle = token.parse()?;
        self.retrieve(&handle)
    }

    /// Drop one entry; returns whether it was live. The pointee is untouched.
    pub fn release(&self, handle: &Handle) -> bool {
        let removed = self.table.lock().entries.remove(handle).is_some();
        debug!(%handle, removed, "released");
        removed
    }

    /// Drop every entry without touching pointees. Counters are kept.
    pub fn flush(&self) -> usize {
        let mut table = self.table.lock();
        let dropped = table.entries.len();
        table.entries.clear();
        debug!(dropped, "flushed");
        dropped
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tag(name: &str) -> TypeTag {
        TypeTag::new(name).unwrap()
    }

    #[test]
    fn store_then_retrieve_returns_same_pointer() {
        let reg = HandleRegistry::new();
        let mut value = 42i32;
        let ptr: *mut i32 = &mut value;
        let h = reg.store(&tag("int"), ptr);
        assert_eq!(h.to_string(), "ref int 0");
        assert_eq!(reg.retrieve::<i32>(&h).unwrap(), ptr);
        assert_eq!(reg.retrieve_token::<i32>("ref int 0").unwrap(), ptr);
    }

    #[test]
    fn release_then_retrieve_misses() {
        let reg = HandleRegistry::new();
        let mut value = 1u8;
        let h = reg.store(&tag("uint8_t"), &mut value as *mut u8);
        assert!(reg.release(&h));
        assert!(!reg.release(&h));
        assert_eq!(
            reg.retrieve::<u8>(&h).unwrap_err(),
            RegistryError::HandleMiss {
                handle: "ref uint8_t 0".into()
            }
        );
    }

    #[test]
    fn malformed_token_is_rejected_before_lookup() {
        let reg = HandleRegistry::new();
        let err = reg.retrieve_token::<u8>("ref uint8_t").unwrap_err();
        assert!(matches!(err, RegistryError::MalformedToken { .. }));
    }

    #[test]
    fn counters_are_per_tag_and_survive_flush() {
        let reg = HandleRegistry::new();
        let mut a = 0i32;
        let mut b = 0.0f64;
        let h0 = reg.store(&tag("A"), &mut a as *mut i32);
        let h1 = reg.store(&tag("A"), &mut a as *mut i32);
        let hb = reg.store(&tag("B"), &mut b as *mut f64);
        assert_eq!((h0.id, h1.id, hb.id), (0, 1, 0));

        assert_eq!(reg.flush(), 3);
        assert!(reg.is_empty());
        assert!(reg.retrieve::<i32>(&h0).is_err());

        let h2 = reg.store(&tag("A"), &mut a as *mut i32);
        assert_eq!(h2.id, 2);
    }

    #[test]
    fn handles_from_other_tags_do_not_alias() {
        let reg = HandleRegistry::new();
        let mut a = 0i32;
        reg.store(&tag("A"), &mut a as *mut i32);
        assert!(reg.retrieve_token::<i32>("ref B 0").is_err());
    }

    #[test]
    fn concurrent_stores_get_distinct_ids() {
        let reg = Arc::new(HandleRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    (0..100usize)
                        .map(|i| reg.store(&tag("T"), i as *mut u8).id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<u64> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 800);
        assert_eq!(reg.len(), 800);
    }
}
