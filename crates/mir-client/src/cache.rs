//! [`TimedCache`] – a catalog list kept for a fixed refresh interval.
//!
//! A disabled cache refetches on every access, which is the resolver's
//! default: catalogs are small and read fresh each time.

use std::time::{Duration, Instant};

use mir_types::MirError;

/// Holds one fetched list together with the instant it was fetched.
pub struct TimedCache<T> {
    ttl: Option<Duration>,
    entry: Option<(Instant, Vec<T>)>,
}

impl<T> TimedCache<T> {
    /// A cache that never serves a stored list.
    pub fn disabled() -> Self {
        Self {
            ttl: None,
            entry: None,
        }
    }

    /// A cache that serves the stored list until `ttl` has elapsed.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            entry: None,
        }
    }

    /// `true` when the next access will be served without calling `fetch`.
    pub fn is_fresh(&self) -> bool {
        match (&self.entry, self.ttl) {
            (Some((fetched_at, _)), Some(ttl)) => fetched_at.elapsed() <= ttl,
            _ => false,
        }
    }

    /// Return the stored list, calling `fetch` first when it is stale.
    ///
    /// A failed fetch leaves the previous entry in place.
    pub fn get_or_refresh<F>(&mut self, fetch: F) -> Result<&[T], MirError>
    where
        F: FnOnce() -> Result<Vec<T>, MirError>,
    {
        if !self.is_fresh() {
            let items = fetch()?;
            self.entry = Some((Instant::now(), items));
        }
        Ok(self
            .entry
            .as_ref()
            .map(|(_, items)| items.as_slice())
            .unwrap_or(&[]))
    }

    /// Drop the stored list so the next access refetches.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
