//! Thread-safe event id counter.
//!
//! Every event entering the dispatch pipeline gets an id from this counter.
//! Clients echo the id back when they acknowledge processing, so ids must be
//! positive and never equal the invalid sentinel `-1`.
//!
//! # Thread safety
//!
//! The counter uses `AtomicI32` internally.  An atomic read-modify-write is a
//! single indivisible step, so the input-reader thread and the IPC thread
//! (which assigns ids to injected events) can both call `next()` without a
//! lock and without ever receiving the same id.

use std::sync::atomic::{AtomicI32, Ordering};

/// Id value meaning "no event" / "already processed".
pub const INVALID_EVENT_ID: i32 = -1;

/// A thread-safe, monotonically increasing counter for event ids.
///
/// Ids start at 1 and increment by 1 with each call to [`SequenceCounter::next`].
/// After `i32::MAX` the counter wraps back to 1, never producing zero or a
/// negative id.
///
/// # Examples
///
/// ```rust
/// use mmi_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
pub struct SequenceCounter {
    inner: AtomicI32,
}

impl SequenceCounter {
    /// Creates a new counter whose first id is 1.
    pub fn new() -> Self {
        Self {
            inner: AtomicI32::new(1),
        }
    }

    /// Returns the next event id and atomically advances the counter.
    ///
    /// # Atomic ordering
    ///
    /// `Ordering::Relaxed` is sufficient: ids only need to be unique, they do
    /// not publish any other memory.
    pub fn next(&self) -> i32 {
        let advanced = self
            .inner
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                Some(if cur == i32::MAX { 1 } else { cur + 1 })
            });
        // The closure always returns `Some`, so both arms carry the old value.
        match advanced {
            Ok(id) | Err(id) => id,
        }
    }

    /// Returns the id the next call to `next()` would hand out.
    pub fn current(&self) -> i32 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn starting_at(id: i32) -> SequenceCounter {
        SequenceCounter {
            inner: AtomicI32::new(id),
        }
    }

    #[test]
    fn test_first_ids_are_one_two_three() {
        let counter = SequenceCounter::new();

        let ids = [counter.next(), counter.next(), counter.next()];

        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn test_wrap_skips_zero_and_invalid() {
        // Arrange
        let counter = starting_at(i32::MAX);

        // Act
        let last = counter.next();
        let wrapped = counter.next();

        // Assert
        assert_eq!(last, i32::MAX);
        assert_eq!(wrapped, 1);
        assert_ne!(wrapped, INVALID_EVENT_ID);
    }

    #[test]
    fn test_reader_and_ipc_threads_never_share_an_id() {
        // Arrange
        let counter = Arc::new(SequenceCounter::new());
        let per_thread = 2_000;

        // Act
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || (0..per_thread).map(|_| counter.next()).collect::<Vec<i32>>())
            })
            .collect();
        let ids: HashSet<i32> = workers
            .into_iter()
            .flat_map(|w| w.join().expect("worker"))
            .collect();

        // Assert
        assert_eq!(ids.len(), 4 * per_thread);
        assert!(ids.iter().all(|&id| id > 0));
    }

    #[test]
    fn test_current_peeks_without_advancing() {
        let counter = starting_at(41);

        assert_eq!(counter.current(), 41);
        assert_eq!(counter.next(), 41);
        assert_eq!(counter.current(), 42);
    }
}
