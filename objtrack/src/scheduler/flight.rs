//! Single-flight guard for detection calls.
//!
//! [`InFlightFlag::try_acquire`] wins with a compare-and-swap; the returned
//! [`InFlightPermit`] clears the flag when dropped, so the flag is released
//! on success, error, panic unwind and task cancellation alike.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag that is set while a detection call is outstanding.
#[derive(Debug, Clone, Default)]
pub struct InFlightFlag {
    busy: Arc<AtomicBool>,
}

impl InFlightFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag. Returns `None` if another call holds it.
    pub fn try_acquire(&self) -> Option<InFlightPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_in_flight(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of holding the flag. Releases it on drop.
#[derive(Debug)]
pub struct InFlightPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_acquire_and_release() {
        let flag = InFlightFlag::new();
        let permit = flag.try_acquire();
        assert!(permit.is_some());
        assert!(flag.is_in_flight());
        assert!(flag.try_acquire().is_none());

        drop(permit);
        assert!(!flag.is_in_flight());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let flag = InFlightFlag::new();
        let cloned = flag.clone();
        let result = thread::spawn(move || {
            let _permit = cloned.try_acquire();
            panic!("detection blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!flag.is_in_flight());
    }

    #[test]
    fn test_exactly_one_winner_per_window() {
        const THREADS: usize = 16;

        for _ in 0..50 {
            let flag = InFlightFlag::new();
            let barrier = Arc::new(Barrier::new(THREADS));
            let (tx, rx) = std::sync::mpsc::channel();

            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let flag = flag.clone();
                    let barrier = Arc::clone(&barrier);
                    let tx = tx.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        let permit = flag.try_acquire();
                        let won = permit.is_some();
                        // Hold the permit until every contender has tried.
                        barrier.wait();
                        tx.send(won).unwrap();
                        drop(permit);
                    })
                })
                .collect();
            drop(tx);
            for handle in handles {
                handle.join().unwrap();
            }

            let winners = rx.iter().filter(|won| *won).count();
            assert_eq!(winners, 1);
            assert!(!flag.is_in_flight());
        }
    }
}
