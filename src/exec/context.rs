// ABOUTME: Cancellable, deadline-bearing context passed to every external call.
// ABOUTME: Child contexts inherit parent cancellation and can only shorten the deadline.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why an [`ExecContext`] stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline, threaded through every stage.
#[derive(Debug, Clone)]
pub struct ExecContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecContext {
    /// A context with no deadline that is only stopped by [`ExecContext::cancel`].
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a child context bounded by `timeout`.
    ///
    /// A zero timeout adds no deadline of its own, so the parent governs.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            return self.child();
        }
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child context that expires at `deadline` or at the parent's, whichever is first.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child context sharing the parent's deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Non-blocking check used before starting a new external call.
    pub fn expiry(&self) -> Option<Expiry> {
        if self.token.is_cancelled() {
            return Some(Expiry::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Expiry::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn expired(&self) -> Expiry {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => Expiry::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => Expiry::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                Expiry::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_keeps_parent_deadline() {
        let parent = ExecContext::new().with_timeout(Duration::from_secs(60));
        let child = parent.with_timeout(Duration::ZERO);
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn child_cannot_extend_parent_deadline() {
        let parent = ExecContext::new().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(3600));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn cancelling_parent_cancels_child() {
        let parent = ExecContext::new();
        let child = parent.with_timeout(Duration::from_secs(30));
        parent.cancel();
        assert_eq!(child.expiry(), Some(Expiry::Cancelled));
    }

    #[tokio::test]
    async fn expired_resolves_on_deadline() {
        let ctx = ExecContext::new().with_timeout(Duration::from_millis(10));
        assert_eq!(ctx.expired().await, Expiry::DeadlineExceeded);
        assert_eq!(ctx.expiry(), Some(Expiry::DeadlineExceeded));
    }
}
