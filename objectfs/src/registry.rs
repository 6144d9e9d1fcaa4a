//! Handle registry
//!
//! Keeps every value the native side holds a handle to alive until the
//! matching unpin. Lookups hand out `Arc`s, so the table lock is never held
//! while a backend call runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::idgen::{Handle, IdGen};
use crate::wrappers::{ObjectRef, ReaderRef, StorageRef, WriterRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Reader,
    Writer,
    Object,
    Storage,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Object => "object",
            Self::Storage => "storage",
        };
        f.write_str(name)
    }
}

/// One registry entry
pub enum Pinned {
    Reader(Arc<ReaderRef>),
    Writer(Arc<WriterRef>),
    Object(Arc<ObjectRef>),
    Storage(Arc<StorageRef>),
}

impl Pinned {
    #[must_use]
    pub fn kind(&self) -> HandleKind {
        match self {
            Self::Reader(_) => HandleKind::Reader,
            Self::Writer(_) => HandleKind::Writer,
            Self::Object(_) => HandleKind::Object,
            Self::Storage(_) => HandleKind::Storage,
        }
    }
}

/// A wrapper type that can live in the registry.
pub trait PinKind: Sized {
    const KIND: HandleKind;

    fn into_pinned(value: Arc<Self>) -> Pinned;

    fn as_pinned(pinned: &Pinned) -> Option<&Arc<Self>>;
}

macro_rules! pin_kind {
    ($ty:ty, $variant:ident) => {
        impl PinKind for $ty {
            const KIND: HandleKind = HandleKind::$variant;

            fn into_pinned(value: Arc<Self>) -> Pinned {
                Pinned::$variant(value)
            }

            fn as_pinned(pinned: &Pinned) -> Option<&Arc<Self>> {
                match pinned {
                    Pinned::$variant(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

pin_kind!(ReaderRef, Reader);
pin_kind!(WriterRef, Writer);
pin_kind!(ObjectRef, Object);
pin_kind!(StorageRef, Storage);

/// Table of live handles
///
/// Handles are never reused within one registry.
#[derive(Default)]
pub struct Registry {
    ids: IdGen,
    entries: Mutex<HashMap<Handle, Pinned>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` and return its new handle.
    pub fn pin<T: PinKind>(&self, value: T) -> Handle {
        self.pin_arc(Arc::new(value))
    }

    pub fn pin_arc<T: PinKind>(&self, value: Arc<T>) -> Handle {
        let handle = self.ids.get_next();
        self.entries.lock().insert(handle, T::into_pinned(value));
        trace!(%handle, kind = %T::KIND, "pinned");
        handle
    }

    /// Shared reference to the value behind `handle`.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` if nothing is pinned under `handle`, `WrongHandleKind`
    /// if something of another type is.
    pub fn get<T: PinKind>(&self, handle: Handle) -> Result<Arc<T>> {
        let entries = self.entries.lock();
        let pinned = entries.get(&handle).ok_or(Error::InvalidHandle(handle))?;
        T::as_pinned(pinned)
            .cloned()
            .ok_or_else(|| Error::WrongHandleKind {
                handle,
                expected: T::KIND,
                actual: pinned.kind(),
            })
    }

    /// Remove `handle` and return its value.
    ///
    /// A handle of the wrong kind is left in place.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::get`].
    pub fn unpin<T: PinKind>(&self, handle: Handle) -> Result<Arc<T>> {
        let value = {
            let mut entries = self.entries.lock();
            let pinned = entries.get(&handle).ok_or(Error::InvalidHandle(handle))?;
            let value = T::as_pinned(pinned)
                .cloned()
                .ok_or_else(|| Error::WrongHandleKind {
                    handle,
                    expected: T::KIND,
                    actual: pinned.kind(),
                })?;
            entries.remove(&handle);
            value
        };
        trace!(%handle, kind = %T::KIND, "unpinned");
        Ok(value)
    }

    /// Number of live handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registry(live={})", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objstore::Object;
    use std::time::UNIX_EPOCH;

    fn object(key: &str) -> ObjectRef {
        ObjectRef::new(Object::new(key, 1, UNIX_EPOCH))
    }

    #[test]
    fn pin_get_unpin() {
        let registry = Registry::new();
        let a = registry.pin(object("a"));
        let b = registry.pin(object("b"));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.get::<ObjectRef>(a).unwrap().key(), "a");
        assert_eq!(registry.unpin::<ObjectRef>(b).unwrap().key(), "b");
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.get::<ObjectRef>(b),
            Err(Error::InvalidHandle(h)) if h == b
        ));

        registry.unpin::<ObjectRef>(a).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn value_outlives_unpin_while_in_use() {
        let registry = Registry::new();
        let h = registry.pin(object("k"));
        let in_use = registry.get::<ObjectRef>(h).unwrap();
        registry.unpin::<ObjectRef>(h).unwrap();
        assert_eq!(in_use.key(), "k");
    }

    #[test]
    fn wrong_kind_is_rejected_and_kept() {
        let registry = Registry::new();
        let h = registry.pin(object("k"));

        match registry.unpin::<ReaderRef>(h) {
            Err(Error::WrongHandleKind {
                expected, actual, ..
            }) => {
                assert_eq!(expected, HandleKind::Reader);
                assert_eq!(actual, HandleKind::Object);
            }
            _ => panic!("expected WrongHandleKind"),
        }
        assert_eq!(registry.len(), 1);
        assert!(registry.get::<ObjectRef>(h).is_ok());
    }

    #[test]
    fn concurrent_pin_unpin() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 200;

        let registry = Registry::new();
        let handles: Vec<Handle> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..THREADS)
                .map(|t| {
                    let registry = &registry;
                    s.spawn(move || {
                        let mut seen = Vec::with_capacity(PER_THREAD);
                        for i in 0..PER_THREAD {
                            let key = format!("{t}/{i}");
                            let h = registry.pin(object(&key));
                            assert_eq!(registry.get::<ObjectRef>(h).unwrap().key(), key);
                            seen.push(h);
                            if i % 2 == 1 {
                                registry.unpin::<ObjectRef>(seen[i - 1]).unwrap();
                                registry.unpin::<ObjectRef>(h).unwrap();
                            }
                        }
                        seen
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect()
        });

        let unique: std::collections::HashSet<_> = handles.iter().copied().collect();
        assert_eq!(unique.len(), THREADS * PER_THREAD);
        assert!(!unique.contains(&Handle::NULL));
        assert!(registry.is_empty());
    }

    #[test]
    fn handles_are_not_reused() {
        let registry = Registry::new();
        let first = registry.pin(object("k"));
        registry.unpin::<ObjectRef>(first).unwrap();
        let second = registry.pin(object("k"));
        assert_ne!(first, second);
        assert!(!second.is_null());
    }
}
