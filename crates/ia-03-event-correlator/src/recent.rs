//! Recently resolved ids.
//!
//! Two rotating windows: an id stays recognisable for at least one window
//! and at most two. Only used to tell duplicates from unmatched events.

use parking_lot::Mutex;
use shared_types::CorrelationId;
use std::collections::HashSet;
use std::time::{Duration, Instant};

struct Windows {
    current: HashSet<CorrelationId>,
    previous: HashSet<CorrelationId>,
    window_start: Instant,
}

pub(crate) struct RecentlyResolved {
    windows: Mutex<Windows>,
    window: Duration,
}

impl RecentlyResolved {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            windows: Mutex::new(Windows {
                current: HashSet::new(),
                previous: HashSet::new(),
                window_start: Instant::now(),
            }),
            window,
        }
    }

    pub(crate) fn mark(&self, id: CorrelationId) {
        let mut windows = self.windows.lock();
        self.maybe_rotate(&mut windows);
        windows.current.insert(id);
    }

    pub(crate) fn contains(&self, id: &CorrelationId) -> bool {
        let mut windows = self.windows.lock();
        self.maybe_rotate(&mut windows);
        windows.current.contains(id) || windows.previous.contains(id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        let windows = self.windows.lock();
        windows.current.len() + windows.previous.len()
    }

    fn maybe_rotate(&self, windows: &mut Windows) {
        let elapsed = windows.window_start.elapsed();
        if elapsed < self.window {
            return;
        }
        if elapsed >= self.window * 2 {
            windows.previous.clear();
            windows.current.clear();
        } else {
            windows.previous = std::mem::take(&mut windows.current);
        }
        windows.window_start = Instant::now();
    }
}
