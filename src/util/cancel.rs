//! Cooperative cancellation and deadlines.
//!
//! A [`CancellationToken`] is a cheap, cloneable handle shared between the
//! orchestrator and the workers it drives. Cancellation is a request: code
//! holding a token checks it at convenient points and stops early, but nothing
//! is interrupted forcibly. A token may carry a deadline, and child tokens
//! observe both their own state and every ancestor's.
//!
//! ```
//! use std::time::Duration;
//! use tokdrift::util::CancellationToken;
//!
//! let run = CancellationToken::new();
//! let item = run.child_with_timeout(Duration::from_secs(5));
//! assert!(!item.is_cancelled());
//!
//! run.cancel();
//! assert!(item.is_cancelled());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{DriftError, Result};

/// Observable state of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Neither cancelled nor past its deadline.
    Active,
    /// `cancel()` was called on this token or an ancestor.
    Cancelled,
    /// The deadline of this token or an ancestor has passed.
    Expired,
}

#[derive(Debug)]
struct TokenInner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<CancellationToken>,
}

/// Handle used to request cooperative cancellation.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Create a root token with no deadline.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Create a root token that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Instant::now().checked_add(timeout), None)
    }

    /// Create a child that is cancelled whenever this token is.
    pub fn child(&self) -> Self {
        Self::build(None, Some(self.clone()))
    }

    /// Create a child with its own deadline `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        Self::build(Instant::now().checked_add(timeout), Some(self.clone()))
    }

    fn build(deadline: Option<Instant>, parent: Option<CancellationToken>) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                deadline,
                parent,
            }),
        }
    }

    /// Request cancellation of this token and all of its children.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Current state, walking up the parent chain.
    pub fn state(&self) -> TokenState {
        let now = Instant::now();
        let mut current = Some(self);
        let mut expired = false;

        while let Some(token) = current {
            if token.inner.cancelled.load(Ordering::SeqCst) {
                return TokenState::Cancelled;
            }
            if token.inner.deadline.is_some_and(|deadline| now >= deadline) {
                expired = true;
            }
            current = token.inner.parent.as_ref();
        }

        if expired {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }

    /// Whether work guarded by this token should stop.
    pub fn is_cancelled(&self) -> bool {
        self.state() != TokenState::Active
    }

    /// Earliest deadline in the chain, if any.
    pub fn deadline(&self) -> Option<Instant> {
        let mut earliest = self.inner.deadline;
        let mut current = self.inner.parent.as_ref();

        while let Some(token) = current {
            earliest = match (earliest, token.inner.deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            current = token.inner.parent.as_ref();
        }

        earliest
    }

    /// Time left before the earliest deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Return an error describing why work should stop, or `Ok` if active.
    pub fn check(&self, operation: &str) -> Result<()> {
        match self.state() {
            TokenState::Active => Ok(()),
            TokenState::Cancelled => Err(DriftError::cancelled(operation.to_string())),
            TokenState::Expired => Err(DriftError::timeout(format!(
                "{operation} exceeded its deadline"
            ))),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_propagates_to_children() {
        let root = CancellationToken::new();
        let child = root.child();
        let grandchild = child.child();

        assert_eq!(grandchild.state(), TokenState::Active);
        root.cancel();
        assert_eq!(child.state(), TokenState::Cancelled);
        assert_eq!(grandchild.state(), TokenState::Cancelled);
    }

    #[test]
    fn test_child_cancel_does_not_touch_parent() {
        let root = CancellationToken::new();
        let child = root.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn test_deadline_expiry() {
        let token = CancellationToken::with_timeout(Duration::from_millis(5));
        assert!(token.remaining().is_some());

        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(token.state(), TokenState::Expired);
        assert!(token.check("tokenize").unwrap_err().is_timeout());
    }

    #[test]
    fn test_earliest_deadline_wins() {
        let root = CancellationToken::with_timeout(Duration::from_secs(1));
        let child = root.child_with_timeout(Duration::from_secs(60));

        let remaining = child.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(1));
    }

    #[test]
    fn test_check_reports_cancellation() {
        let token = CancellationToken::new();
        assert!(token.check("chunk").is_ok());

        token.cancel();
        match token.check("chunk") {
            Err(DriftError::Cancelled(msg)) => assert_eq!(msg, "chunk"),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
