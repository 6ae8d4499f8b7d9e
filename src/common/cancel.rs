//! Cancellation and deadlines shared by every blocking stage
//!
//! A [`CancelToken`] is tripped once (Ctrl-C, SIGTERM) and observed by all
//! stages. A [`StageContext`] pairs it with the per-case deadline so tool
//! invocations and the completion monitor are bounded the same way.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::error::Stage;
use super::{Error, Result};

/// Cloneable, one-shot cancellation signal
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Trip the token; every clone observes it
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is tripped
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so `changed` cannot fail here
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Trip the token on Ctrl-C (and SIGTERM on Unix)
    pub fn cancel_on_signal(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::warn!("Interrupted, stopping after the current stage");
            token.cancel();
        });
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::debug!("SIGTERM handler unavailable: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Cancellation plus an optional deadline for one test case
#[derive(Clone, Debug)]
pub struct StageContext {
    cancel: CancelToken,
    deadline: Option<Instant>,
    budget: Option<Duration>,
}

impl StageContext {
    /// Start a context whose deadline is `budget` from now (`None` = unbounded)
    pub fn new(cancel: CancelToken, budget: Option<Duration>) -> Self {
        Self {
            deadline: budget.map(|b| Instant::now() + b),
            budget,
            cancel,
        }
    }

    /// A context that is never cancelled and never expires
    pub fn unbounded() -> Self {
        Self::new(CancelToken::new(), None)
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Drive `fut` to completion unless cancelled or past the deadline
    ///
    /// `fut` is dropped on cancellation or expiry; child processes spawned
    /// with `kill_on_drop` are reclaimed with it.
    pub async fn guard<T, F>(&self, stage: Stage, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let expired = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = fut => result,
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = expired => Err(Error::StageTimeout {
                stage,
                secs: self.budget.map(|b| b.as_secs()).unwrap_or_default(),
            }),
        }
    }
}
