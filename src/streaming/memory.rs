//! Soft memory ceiling for in-flight streaming data.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

/// How an admission request was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request fit under the ceiling.
    Fits,
    /// The request alone exceeds the ceiling and was admitted because nothing
    /// else was in flight.
    Oversized,
}

/// Snapshot of budget usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Bytes currently charged.
    pub current_bytes: usize,

    /// Highest charge observed right after an admission.
    pub peak_bytes: usize,

    /// The ceiling.
    pub limit_bytes: usize,

    /// Admissions granted.
    pub admissions: u64,

    /// Admissions that had to wait for memory to be released.
    pub waits: u64,
}

#[derive(Debug, Default)]
struct State {
    current: usize,
    peak: usize,
    admissions: u64,
    waits: u64,
    closed: bool,
}

/// Byte budget shared between the chunk reader and the consumer.
///
/// The reader [`acquire`](Self::acquire)s before buffering a chunk and blocks
/// while the budget is exhausted; the consumer [`release`](Self::release)s as
/// data leaves the pipeline.
#[derive(Debug)]
pub struct MemoryBudget {
    limit: usize,
    state: Mutex<State>,
    released: Condvar,
}

const WAIT_SLICE: Duration = Duration::from_millis(50);

impl MemoryBudget {
    /// Create a budget of `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            state: Mutex::new(State::default()),
            released: Condvar::new(),
        }
    }

    /// Ceiling in bytes.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Charge `bytes`, blocking until they fit.
    ///
    /// A request larger than the whole ceiling is granted only once nothing
    /// else is charged. Fails with `Timeout` when `deadline` passes while
    /// waiting and with `Cancelled` when the budget is closed.
    pub fn acquire(&self, bytes: usize, deadline: Option<Instant>) -> Result<Admission> {
        let mut state = self.state.lock();
        let mut waited = false;

        loop {
            if state.closed {
                return Err(DriftError::cancelled("memory budget closed"));
            }

            let fits = state.current.saturating_add(bytes) <= self.limit;
            if fits || state.current == 0 {
                state.current += bytes;
                state.peak = state.peak.max(state.current);
                state.admissions += 1;
                if waited {
                    state.waits += 1;
                }
                return Ok(if fits {
                    Admission::Fits
                } else {
                    Admission::Oversized
                });
            }

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DriftError::timeout(
                            "deadline passed while waiting for memory",
                        ));
                    }
                    (deadline - now).min(WAIT_SLICE)
                }
                None => WAIT_SLICE,
            };
            waited = true;
            self.released.wait_for(&mut state, slice);
        }
    }

    /// Charge `bytes` without waiting or touching the peak.
    pub fn charge(&self, bytes: usize) {
        self.state.lock().current += bytes;
    }

    /// Return `bytes` to the budget and wake waiters.
    pub fn release(&self, bytes: usize) {
        {
            let mut state = self.state.lock();
            state.current = state.current.saturating_sub(bytes);
        }
        self.released.notify_all();
    }

    /// Fail current and future waiters.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.released.notify_all();
    }

    /// Current usage.
    pub fn usage(&self) -> MemoryUsage {
        let state = self.state.lock();
        MemoryUsage {
            current_bytes: state.current,
            peak_bytes: state.peak,
            limit_bytes: self.limit,
            admissions: state.admissions,
            waits: state.waits,
        }
    }
}
