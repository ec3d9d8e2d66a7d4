//! Deadline-ordered index of per-connection expiry callbacks.
//!
//! Entries are ordered by `(expires, id)`: the id breaks ties so two
//! connections expiring at the same instant are both kept and always fire in
//! the same order. Each id has at most one entry; refreshing moves the entry
//! instead of adding a second one.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::timer::TimerError;
use crate::ensure;

/// Invoked once when the entry expires.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// Stand-in expiry for timeouts too large for [`Instant`], about 30 years.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + timeout`, saturated to [`FAR_FUTURE`] when the sum overflows.
fn expiry_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout).or_else(|| now.checked_add(FAR_FUTURE)).unwrap_or(now)
}

struct TimerEntry {
    expires: Instant,
    callback: TimerCallback,
}

#[derive(Default)]
pub struct DeadlineIndex {
    ordered: BTreeSet<(Instant, u64)>,
    entries: HashMap<u64, TimerEntry>,
}

impl fmt::Debug for DeadlineIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlineIndex")
            .field("len", &self.entries.len())
            .field("earliest", &self.ordered.first())
            .finish()
    }
}

impl DeadlineIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    /// The current expiry of `id`, if it has an entry.
    pub fn deadline(&self, id: u64) -> Option<Instant> {
        self.entries.get(&id).map(|entry| entry.expires)
    }

    /// Inserts an entry expiring `timeout` from now. A timeout that can't be
    /// represented as an [`Instant`] is saturated to about 30 years.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::DuplicateId`] when `id` already has an entry, use
    /// [`refresh`](Self::refresh) instead.
    pub fn add<F>(&mut self, id: u64, timeout: Duration, callback: F) -> Result<(), TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_at(id, expiry_after(Instant::now(), timeout), callback)
    }

    /// Inserts an entry expiring at `expires`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::DuplicateId`] when `id` already has an entry.
    pub fn add_at<F>(&mut self, id: u64, expires: Instant, callback: F) -> Result<(), TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        ensure!(!self.entries.contains_key(&id), TimerError::DuplicateId(id));

        self.ordered.insert((expires, id));
        self.entries.insert(id, TimerEntry { expires, callback: Box::new(callback) });
        trace!(id, "timer added");
        Ok(())
    }

    /// Moves the entry of `id` to expire `timeout` from now.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::UnknownId`] when `id` has no entry; nothing is inserted.
    pub fn refresh(&mut self, id: u64, timeout: Duration) -> Result<(), TimerError> {
        self.refresh_at(id, expiry_after(Instant::now(), timeout))
    }

    /// Moves the entry of `id` to expire at `expires`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::UnknownId`] when `id` has no entry.
    pub fn refresh_at(&mut self, id: u64, expires: Instant) -> Result<(), TimerError> {
        let entry = self.entries.get_mut(&id).ok_or(TimerError::UnknownId(id))?;

        self.ordered.remove(&(entry.expires, id));
        entry.expires = expires;
        self.ordered.insert((expires, id));
        Ok(())
    }

    /// Removes the entry of `id` without invoking its callback.
    pub fn remove(&mut self, id: u64) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                self.ordered.remove(&(entry.expires, id));
                trace!(id, "timer removed");
                true
            }
            None => false,
        }
    }

    /// Removes every entry expiring at or before `now`, in `(expires, id)`
    /// order, and returns their callbacks without invoking them.
    pub fn take_expired(&mut self, now: Instant) -> Vec<(u64, TimerCallback)> {
        let mut expired = Vec::new();

        while let Some(&(expires, id)) = self.ordered.first() {
            if expires > now {
                break;
            }
            self.ordered.pop_first();
            if let Some(entry) = self.entries.remove(&id) {
                expired.push((id, entry.callback));
            }
        }

        expired
    }

    /// Removes and invokes the callbacks of every entry expiring at or before
    /// `now`, returning how many fired.
    pub fn pop_expired(&mut self, now: Instant) -> usize {
        let expired = self.take_expired(now);
        let count = expired.len();
        for (id, callback) in expired {
            trace!(id, "timer expired");
            callback();
        }
        count
    }

    /// Time left until the earliest remaining entry, after firing the expired ones.
    ///
    /// Returns `None` when the index is empty.
    pub fn next_deadline(&mut self, now: Instant) -> Option<Duration> {
        self.pop_expired(now);
        self.earliest_remaining(now)
    }

    fn earliest_remaining(&self, now: Instant) -> Option<Duration> {
        self.ordered.first().map(|&(expires, _id)| expires.saturating_duration_since(now))
    }
}

/// A [`DeadlineIndex`] shared between tasks, guarded by one mutex.
///
/// Expired callbacks are invoked after the lock is released, so a callback may
/// itself call back into the index.
#[derive(Debug, Clone, Default)]
pub struct SharedDeadlineIndex {
    inner: Arc<Mutex<DeadlineIndex>>,
}

impl SharedDeadlineIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DeadlineIndex> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.lock().contains(id)
    }

    /// # Errors
    ///
    /// See [`DeadlineIndex::add`].
    pub fn add<F>(&self, id: u64, timeout: Duration, callback: F) -> Result<(), TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.lock().add(id, timeout, callback)
    }

    /// # Errors
    ///
    /// See [`DeadlineIndex::refresh`].
    pub fn refresh(&self, id: u64, timeout: Duration) -> Result<(), TimerError> {
        self.lock().refresh(id, timeout)
    }

    pub fn remove(&self, id: u64) -> bool {
        self.lock().remove(id)
    }

    pub fn pop_expired(&self, now: Instant) -> usize {
        let expired = self.lock().take_expired(now);
        let count = expired.len();
        for (id, callback) in expired {
            trace!(id, "timer expired");
            callback();
        }
        count
    }

    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.pop_expired(now);
        self.lock().earliest_remaining(now)
    }
}
