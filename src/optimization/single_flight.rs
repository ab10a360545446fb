//! One-time initialisation shared by concurrent callers.
//!
//! The first caller runs the initializer while the others block on a
//! condition variable and receive the same outcome. A failed attempt is
//! reported to every caller that waited on it, and the next call starts a
//! fresh attempt instead of caching the failure.

use crate::graph::debt_graph::Debt;
use crate::optimization::solver::{SettlementInstruction, SettlementSolver, SolverError};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

enum State<T> {
    Idle,
    Loading { generation: u64 },
    Loaded(T),
}

struct Inner<T, E> {
    state: State<T>,
    generation: u64,
    last_failure: Option<(u64, E)>,
}

pub struct SingleFlight<T, E> {
    inner: Mutex<Inner<T, E>>,
    ready: Condvar,
}

impl<T: Clone, E: Clone> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, E: Clone> SingleFlight<T, E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Idle,
                generation: 0,
                last_failure: None,
            }),
            ready: Condvar::new(),
        }
    }

    /// The loaded value, if an attempt has succeeded.
    pub fn get(&self) -> Option<T> {
        match &self.inner.lock().state {
            State::Loaded(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.inner.lock().state, State::Loaded(_))
    }

    /// Return the loaded value, running `init` if nothing is loaded and no
    /// attempt is in flight.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut inner = self.inner.lock();
        let generation = loop {
            match inner.state {
                State::Loaded(ref value) => return Ok(value.clone()),
                State::Idle => {
                    inner.generation += 1;
                    let generation = inner.generation;
                    inner.state = State::Loading { generation };
                    break generation;
                }
                State::Loading { generation: waiting_on } => {
                    while matches!(
                        inner.state,
                        State::Loading { generation } if generation == waiting_on
                    ) {
                        self.ready.wait(&mut inner);
                    }
                    if let State::Loaded(ref value) = inner.state {
                        return Ok(value.clone());
                    }
                    if let Some((failed, ref err)) = inner.last_failure {
                        if failed == waiting_on {
                            return Err(err.clone());
                        }
                    }
                    // The loader went away without an outcome; try again.
                }
            }
        };
        drop(inner);

        let mut attempt = Attempt {
            flight: self,
            done: false,
        };
        let result = init();

        let mut inner = self.inner.lock();
        match &result {
            Ok(value) => {
                inner.state = State::Loaded(value.clone());
                inner.last_failure = None;
            }
            Err(err) => {
                inner.state = State::Idle;
                inner.last_failure = Some((generation, err.clone()));
            }
        }
        attempt.done = true;
        drop(inner);
        self.ready.notify_all();
        result
    }
}

/// Resets an in-flight attempt if the initializer unwinds.
struct Attempt<'a, T, E> {
    flight: &'a SingleFlight<T, E>,
    done: bool,
}

impl<T, E> Drop for Attempt<'_, T, E> {
    fn drop(&mut self) {
        if !self.done {
            self.flight.inner.lock().state = State::Idle;
            self.flight.ready.notify_all();
        }
    }
}

type SolverFactory = dyn Fn() -> Result<Arc<dyn SettlementSolver>, SolverError> + Send + Sync;

/// A solver whose backing implementation is built on first use.
///
/// Suited to solvers with expensive setup, such as ones loaded across a
/// foreign boundary. Concurrent first calls share a single construction.
pub struct LazySolver {
    name: String,
    factory: Box<SolverFactory>,
    solver: SingleFlight<Arc<dyn SettlementSolver>, SolverError>,
}

impl LazySolver {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn SettlementSolver>, SolverError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(factory),
            solver: SingleFlight::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.solver.is_loaded()
    }
}

impl fmt::Debug for LazySolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySolver")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl SettlementSolver for LazySolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn solve(&self, debts: &[Debt]) -> Result<Vec<SettlementInstruction>, SolverError> {
        let solver = self.solver.get_or_try_init(|| {
            debug!("initialising solver '{}'", self.name);
            (self.factory)().map_err(|err| {
                warn!("solver '{}' failed to initialise: {}", self.name, err);
                err
            })
        })?;
        solver.solve(debts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::money::Money;
    use crate::optimization::greedy::GreedySolver;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_loads_once() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = flight
                .get_or_try_init(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.get(), Some(7));
    }

    #[test]
    fn test_failure_permits_retry() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();

        let err = flight.get_or_try_init(|| Err("offline".to_string())).unwrap_err();
        assert_eq!(err, "offline");
        assert!(!flight.is_loaded());

        assert_eq!(flight.get_or_try_init(|| Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_panicking_init_resets() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            flight.get_or_try_init(|| -> Result<u32, String> { panic!("loader crashed") })
        }));
        assert!(outcome.is_err());
        assert!(!flight.is_loaded());

        assert_eq!(flight.get_or_try_init(|| Ok(5)).unwrap(), 5);
    }

    #[test]
    fn test_concurrent_callers_share_one_attempt() {
        let flight: Arc<SingleFlight<u32, String>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    flight.get_or_try_init(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok(42)
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_waiters_receive_the_failure() {
        let flight: Arc<SingleFlight<u32, String>> = Arc::new(SingleFlight::new());
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    flight.get_or_try_init(|| {
                        thread::sleep(Duration::from_millis(50));
                        Err("boom".to_string())
                    })
                })
            })
            .collect();

        // Every caller sees an error; none is left hanging.
        for handle in handles {
            assert!(handle.join().unwrap().is_err());
        }
        assert!(!flight.is_loaded());
    }

    #[test]
    fn test_lazy_solver_builds_on_first_solve() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let solver = LazySolver::new("lazy-greedy", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(GreedySolver) as Arc<dyn SettlementSolver>)
        });
        assert!(!solver.is_initialized());

        let debts = vec![Debt::new("a", "b", Money::from_cents(100))];
        assert_eq!(solver.solve(&debts).unwrap().len(), 1);
        assert_eq!(solver.solve(&debts).unwrap().len(), 1);
        assert!(solver.is_initialized());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_solver_retries_after_init_failure() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let solver = LazySolver::new("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SolverError::Init {
                    solver: "flaky".into(),
                    reason: "library not loaded".into(),
                })
            } else {
                Ok(Arc::new(GreedySolver) as Arc<dyn SettlementSolver>)
            }
        });

        let debts = vec![Debt::new("a", "b", Money::from_cents(100))];
        assert!(matches!(solver.solve(&debts), Err(SolverError::Init { .. })));
        assert!(solver.solve(&debts).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
