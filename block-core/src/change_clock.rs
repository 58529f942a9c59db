use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Process-wide monotonic allocator of change indices (§4.1).
///
/// Never exposes zero: the clock starts at 0 and the first `tick()` returns
/// 1, so a freshly-initialised connection's `report_index` of 0 is
/// guaranteed to be "older than everything".
#[derive(Debug, Default)]
pub struct ChangeClock {
    counter: AtomicU64,
}

impl ChangeClock {
    pub fn new() -> Self {
        ChangeClock {
            counter: AtomicU64::new(0),
        }
    }

    /// Allocates and returns a fresh, strictly-increasing change index.
    pub fn tick(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the most recently allocated index without allocating a new
    /// one. Useful for tests; never used to gate visibility decisions.
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn first_tick_is_one() {
        let clock = ChangeClock::new();
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
    }

    #[test]
    fn concurrent_ticks_are_unique_and_monotonic() {
        let clock = Arc::new(ChangeClock::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let clock = Arc::clone(&clock);
            handles.push(thread::spawn(move || {
                (0..1000).map(|_| clock.tick()).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        let before = all.len();
        all.dedup();
        assert_eq!(all.len(), before, "no duplicate ticks");
        assert_eq!(all, (1..=8000).collect::<Vec<_>>());
    }
}
