use std::sync::{Mutex, PoisonError};

use state::InitCell;

use crate::error::Result;

/// Lazily built, process-scoped value with exactly-once construction.
///
/// Readers after the first successful build never take a lock. Concurrent
/// first callers are serialized so the builder runs once; a failed build is
/// not cached and the next caller retries.
pub struct SharedContextRegistry<T> {
    cell: InitCell<T>,
    init: Mutex<()>,
}

impl<T: Send + Sync> SharedContextRegistry<T> {
    pub fn new() -> Self {
        Self {
            cell: InitCell::new(),
            init: Mutex::new(()),
        }
    }

    /// Returns the shared value, building it with `create` on first use.
    pub fn get_or_try_init<F>(&self, create: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.cell.try_get() {
            return Ok(value);
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.cell.try_get() {
            return Ok(value);
        }

        let value = create()?;
        self.cell.set(value);
        log::debug!("shared context initialized");
        Ok(self.cell.get())
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.try_get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.try_get().is_some()
    }

    /// Removes the shared value for controlled teardown.
    pub fn take(&mut self) -> Option<T> {
        self.cell.take()
    }
}

impl<T: Send + Sync> Default for SharedContextRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::error::Error;

    #[test]
    fn builds_once_under_contention() {
        let registry = Arc::new(SharedContextRegistry::<String>::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let builds = builds.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let value = registry
                        .get_or_try_init(|| {
                            builds.fetch_add(1, Ordering::SeqCst);
                            // Widen the race window.
                            thread::sleep(Duration::from_millis(20));
                            Ok("root".to_string())
                        })
                        .unwrap();
                    value as *const String as usize
                })
            })
            .collect();

        let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn later_calls_do_not_rebuild() {
        let registry = SharedContextRegistry::new();
        assert!(!registry.is_initialized());

        assert_eq!(*registry.get_or_try_init(|| Ok(1)).unwrap(), 1);
        assert_eq!(*registry.get_or_try_init(|| Ok(2)).unwrap(), 1);
        assert_eq!(registry.get(), Some(&1));
    }

    #[test]
    fn failures_are_not_cached() {
        let registry = SharedContextRegistry::<u32>::new();
        let err = registry
            .get_or_try_init(|| Err(Error::context_state("no display")))
            .unwrap_err();
        assert!(matches!(err, Error::ContextState { .. }));
        assert!(!registry.is_initialized());

        assert_eq!(*registry.get_or_try_init(|| Ok(5)).unwrap(), 5);
    }

    #[test]
    fn take_releases_the_value() {
        let mut registry = SharedContextRegistry::new();
        registry.get_or_try_init(|| Ok(vec![1, 2, 3])).unwrap();
        assert_eq!(registry.take(), Some(vec![1, 2, 3]));
        assert!(!registry.is_initialized());
    }
}
