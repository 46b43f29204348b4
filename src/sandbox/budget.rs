//! sandbox/budget.rs
//!
//! Counting semaphore that bounds how many sandboxed processes exist at
//! once. Shared through an `Arc`, never a global, so each engine (and each
//! test) can own an independent budget.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct ConcurrencyBudget {
    capacity: usize,
    available: Mutex<usize>,
    freed: Condvar,
}

impl ConcurrencyBudget {
    /// A zero capacity would block forever, so it is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            available: Mutex::new(capacity),
            freed: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        *self.lock()
    }

    /// Block until a unit is free. Waiters are not served in any particular
    /// order.
    pub fn acquire(&self) -> BudgetPermit<'_> {
        let mut available = self.lock();
        while *available == 0 {
            available = self
                .freed
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        BudgetPermit { budget: self }
    }

    pub fn try_acquire(&self) -> Option<BudgetPermit<'_>> {
        let mut available = self.lock();
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(BudgetPermit { budget: self })
    }

    fn release(&self) {
        let mut available = self.lock();
        *available = (*available + 1).min(self.capacity);
        drop(available);
        self.freed.notify_one();
    }

    // A panic while holding the lock cannot leave the counter half-updated,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One unit of the budget, returned when dropped.
#[derive(Debug)]
pub struct BudgetPermit<'a> {
    budget: &'a ConcurrencyBudget,
}

impl Drop for BudgetPermit<'_> {
    fn drop(&mut self) {
        self.budget.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn permits_are_returned_on_drop() {
        let budget = ConcurrencyBudget::new(2);
        let a = budget.acquire();
        let b = budget.acquire();
        assert_eq!(budget.available(), 0);
        assert!(budget.try_acquire().is_none());
        drop(a);
        assert_eq!(budget.available(), 1);
        drop(b);
        assert_eq!(budget.available(), 2);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let budget = ConcurrencyBudget::new(0);
        assert_eq!(budget.capacity(), 1);
        assert!(budget.try_acquire().is_some());
    }

    #[test]
    fn permit_is_released_when_holder_panics() {
        let budget = Arc::new(ConcurrencyBudget::new(1));
        let b = Arc::clone(&budget);
        let joined = thread::spawn(move || {
            let _permit = b.acquire();
            panic!("boom");
        })
        .join();
        assert!(joined.is_err());
        assert_eq!(budget.available(), 1);
    }

    #[test]
    fn never_exceeds_capacity() {
        let budget = Arc::new(ConcurrencyBudget::new(3));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let budget = Arc::clone(&budget);
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let _permit = budget.acquire();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(budget.available(), 3);
    }
}
