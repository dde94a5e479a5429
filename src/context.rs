//! Caller-supplied cancellation and deadlines
//!
//! A [`FetchContext`] travels with every fetch. Each suspension point of the
//! fetch pipeline runs under [`FetchContext::guard`], which races the stage
//! against the cancel token and the deadline. Losing the race drops the stage
//! future, releasing whatever it held (an open response stream included).

use crate::error::{Error, Result};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Suspension points of a fetch, reported in cancellation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Waiting for a rate limit permit
    RateLimit,
    /// Waiting for the transport to return a response
    Send,
    /// Reading the response body
    ReadBody,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStage::RateLimit => f.write_str("waiting for a rate limit permit"),
            FetchStage::Send => f.write_str("waiting for a response"),
            FetchStage::ReadBody => f.write_str("reading the response body"),
        }
    }
}

/// A cloneable cancellation signal.
///
/// All clones observe the same flag. Cancelling is one-way.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation and wake every waiter.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::Release) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Wait until cancellation is requested.
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}

/// Cancellation scope for a single fetch (or a group of fetches sharing it)
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    token: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl FetchContext {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Abort once `timeout` has elapsed from now.
    ///
    /// A timeout too large to represent as an instant leaves the deadline unset.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Abort once `deadline` is reached
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Abort when `token` is cancelled
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.token.as_ref()
    }

    /// Fail fast if the context is already done
    pub fn check(&self, stage: FetchStage) -> Result<()> {
        if self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled { stage });
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(Error::DeadlineExceeded { stage });
        }
        Ok(())
    }

    /// Run `fut` unless the context is cancelled or expires first.
    ///
    /// The context is checked before `fut` is polled, so a done context never
    /// starts the stage.
    pub async fn guard<F: Future>(&self, stage: FetchStage, fut: F) -> Result<F::Output> {
        self.check(stage)?;

        tokio::select! {
            biased;
            () = wait_cancelled(self.token.as_ref()) => Err(Error::Cancelled { stage }),
            () = wait_deadline(self.deadline) => Err(Error::DeadlineExceeded { stage }),
            out = fut => Ok(out),
        }
    }
}

async fn wait_cancelled(token: Option<&CancelToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_context_is_never_done() {
        let ctx = FetchContext::background();
        assert!(ctx.check(FetchStage::Send).is_ok());
        assert!(ctx.deadline().is_none());
        assert!(ctx.cancel_token().is_none());
    }

    #[tokio::test]
    async fn test_cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        token.cancel();
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_means_no_deadline() {
        let ctx = FetchContext::background().with_timeout(Duration::MAX);
        assert!(ctx.deadline().is_none());

        let out = ctx.guard(FetchStage::Send, async { "done" }).await.unwrap();
        assert_eq!(out, "done");
    }

    #[tokio::test]
    async fn test_guard_passes_output_through() {
        let ctx = FetchContext::background().with_timeout(Duration::from_secs(5));
        let out = ctx.guard(FetchStage::Send, async { 7 }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_guard_does_not_poll_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = FetchContext::background().with_cancel_token(token);

        let mut polled = false;
        let result = ctx
            .guard(FetchStage::RateLimit, async {
                polled = true;
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::Cancelled {
                stage: FetchStage::RateLimit
            })
        ));
        assert!(!polled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_times_out() {
        let ctx = FetchContext::background().with_timeout(Duration::from_millis(50));
        let result = ctx
            .guard(
                FetchStage::ReadBody,
                tokio::time::sleep(Duration::from_secs(60)),
            )
            .await;

        assert!(matches!(
            result,
            Err(Error::DeadlineExceeded {
                stage: FetchStage::ReadBody
            })
        ));
    }

    #[tokio::test]
    async fn test_guard_aborts_on_cancel_mid_stage() {
        let token = CancelToken::new();
        let ctx = FetchContext::background().with_cancel_token(token.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result = ctx
            .guard(FetchStage::Send, tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert!(matches!(
            result,
            Err(Error::Cancelled {
                stage: FetchStage::Send
            })
        ));
    }
}
