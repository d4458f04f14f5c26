//! Mutual exclusion and minimum-interval throttling for one PLC connection.
//!
//! [`CommunicationGate`] owns the resource it guards, so the connection can
//! only be reached through the gate. Every pass through the gate:
//!
//! 1. waits for exclusive access (strictly, with no proceed-anyway escape),
//! 2. sleeps until at least the configured interval has elapsed since the
//!    previous pass released the gate,
//! 3. runs the caller's closure,
//! 4. records the release instant and hands the lock to the next waiter.
//!
//! Interval math uses [`Instant`], which is monotonic.
//!
//! # Example
//!
//! ```
//! use s7_gate::CommunicationGate;
//! use std::time::{Duration, Instant};
//!
//! let gate = CommunicationGate::new(Vec::<u8>::new(), Duration::from_millis(20));
//!
//! gate.run(|log, _| log.push(1));
//! let start = Instant::now();
//! gate.run(|log, _| log.push(2));
//!
//! assert!(start.elapsed() >= Duration::from_millis(20));
//! assert_eq!(gate.peek(|log| log.clone()), vec![1, 2]);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::warn;

#[derive(Debug)]
struct Slot<C> {
    resource: C,
    last_release: Option<Instant>,
}

/// What happened while a caller was admitted through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Time slept to honour the minimum interval.
    pub waited: Duration,
    /// The previous release instant lay in the future; the full interval was
    /// slept instead of the remainder.
    pub clock_anomaly: bool,
}

/// Exclusive, throttled access to a resource.
#[derive(Debug)]
pub struct CommunicationGate<C> {
    slot: Mutex<Slot<C>>,
    interval_ms: AtomicU64,
}

impl<C> CommunicationGate<C> {
    /// Creates a gate around `resource` with the given minimum interval
    /// between consecutive passes.
    pub fn new(resource: C, interval: Duration) -> Self {
        Self {
            slot: Mutex::new(Slot {
                resource,
                last_release: None,
            }),
            interval_ms: AtomicU64::new(interval.as_millis() as u64),
        }
    }

    /// Returns the minimum interval between passes.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    /// Changes the minimum interval. Applies to the next admission.
    pub fn set_interval(&self, interval: Duration) {
        self.interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
    }

    /// Returns when the gate was last released, if ever.
    pub fn last_release(&self) -> Option<Instant> {
        self.slot.lock().last_release
    }

    /// Passes through the gate, blocking until exclusive and spaced.
    ///
    /// The release instant is recorded when `f` returns, whatever it returns.
    pub fn run<R>(&self, f: impl FnOnce(&mut C, Admission) -> R) -> R {
        let guard = self.slot.lock();
        self.pass(guard, f)
    }

    /// Like [`run`](Self::run), but gives up if exclusive access is not
    /// obtained within `timeout`. The interval sleep is not part of the
    /// timeout.
    pub fn run_timeout<R>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&mut C, Admission) -> R,
    ) -> Option<R> {
        let guard = self.slot.try_lock_for(timeout)?;
        Some(self.pass(guard, f))
    }

    /// Inspects the resource under the lock, without throttling and without
    /// counting as a pass.
    pub fn peek<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.slot.lock().resource)
    }

    /// Consumes the gate and returns the resource.
    pub fn into_inner(self) -> C {
        self.slot.into_inner().resource
    }

    #[cfg(test)]
    pub(crate) fn set_last_release(&self, at: Instant) {
        self.slot.lock().last_release = Some(at);
    }

    fn pass<R>(
        &self,
        mut guard: MutexGuard<'_, Slot<C>>,
        f: impl FnOnce(&mut C, Admission) -> R,
    ) -> R {
        let admission = self.admit(guard.last_release);
        let result = f(&mut guard.resource, admission);
        guard.last_release = Some(Instant::now());
        MutexGuard::unlock_fair(guard);
        result
    }

    fn admit(&self, last_release: Option<Instant>) -> Admission {
        let interval = self.interval();
        let Some(last) = last_release else {
            return Admission {
                waited: Duration::ZERO,
                clock_anomaly: false,
            };
        };

        let (waited, clock_anomaly) = match Instant::now().checked_duration_since(last) {
            Some(elapsed) => (interval.saturating_sub(elapsed), false),
            None => {
                warn!(
                    interval_ms = interval.as_millis() as u64,
                    "last release lies in the future, waiting full interval"
                );
                (interval, true)
            }
        };

        if !waited.is_zero() {
            std::thread::sleep(waited);
        }
        Admission {
            waited,
            clock_anomaly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tracing_test::traced_test;

    #[test]
    fn test_first_pass_does_not_wait() {
        let gate = CommunicationGate::new((), Duration::from_millis(200));
        let admission = gate.run(|_, admission| admission);
        assert_eq!(admission.waited, Duration::ZERO);
        assert!(!admission.clock_anomaly);
        assert!(gate.last_release().is_some());
    }

    #[test]
    fn test_interval_between_passes() {
        let gate = CommunicationGate::new((), Duration::from_millis(50));
        gate.run(|_, _| ());
        let released = gate.last_release().unwrap();

        let admitted_at = gate.run(|_, _| Instant::now());
        assert!(admitted_at.duration_since(released) >= Duration::from_millis(50));
    }

    #[test]
    fn test_no_wait_after_interval_elapsed() {
        let gate = CommunicationGate::new((), Duration::from_millis(10));
        gate.run(|_, _| ());
        thread::sleep(Duration::from_millis(30));
        let admission = gate.run(|_, admission| admission);
        assert_eq!(admission.waited, Duration::ZERO);
    }

    #[test]
    #[traced_test]
    fn test_clock_anomaly_waits_full_interval() {
        let gate = CommunicationGate::new((), Duration::from_millis(20));
        gate.set_last_release(Instant::now() + Duration::from_secs(60));

        let admission = gate.run(|_, admission| admission);
        assert!(admission.clock_anomaly);
        assert_eq!(admission.waited, Duration::from_millis(20));
        assert!(logs_contain("last release lies in the future"));
    }

    #[test]
    fn test_set_interval() {
        let gate = CommunicationGate::new((), Duration::from_millis(100));
        gate.set_interval(Duration::from_millis(5));
        assert_eq!(gate.interval(), Duration::from_millis(5));
    }

    #[test]
    fn test_release_recorded_when_closure_fails() {
        let gate = CommunicationGate::new((), Duration::ZERO);
        let result: Result<(), &str> = gate.run(|_, _| Err("boom"));
        assert!(result.is_err());
        assert!(gate.last_release().is_some());
    }

    #[test]
    fn test_run_timeout_gives_up_while_held() {
        let gate = Arc::new(CommunicationGate::new((), Duration::ZERO));
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let holder = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.run(|_, _| {
                    entered_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(200));
                })
            })
        };

        entered_rx.recv().unwrap();
        assert!(gate
            .run_timeout(Duration::from_millis(20), |_, _| ())
            .is_none());
        holder.join().unwrap();
        assert!(gate.run_timeout(Duration::from_millis(20), |_, _| ()).is_some());
    }

    #[test]
    fn test_concurrent_passes_never_overlap() {
        let gate = Arc::new(CommunicationGate::new(0usize, Duration::from_millis(2)));
        let inside = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..10 {
                        gate.run(|count, _| {
                            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                            *count += 1;
                            thread::sleep(Duration::from_millis(1));
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(Arc::try_unwrap(gate).unwrap().into_inner(), 40);
    }
}
