//! Lock polling with cancellation
//!
//! Both phases of the cluster lock are taken by retrying a non-blocking
//! try-lock at a fixed interval. The wait ends early when the cancel handle
//! fires.

use crate::error::{EvolveError, EvolveResult};
use evolve_db::DbResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub(crate) const APPLICATION_LOCK: &str = "application lock";
pub(crate) const METADATA_LOCK: &str = "metadata table lock";

/// Retry schedule for lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub interval: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl LockPolicy {
    pub fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Cloneable handle that interrupts lock waits of one `Evolve` instance.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation. Waits already in progress return
    /// `EvolveError::Cancelled` at their next wake-up.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Poll `try_lock` until it reports success.
pub(crate) async fn wait_for_lock<F, Fut>(
    lock: &'static str,
    policy: LockPolicy,
    cancel: &CancelHandle,
    mut try_lock: F,
) -> EvolveResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<bool>>,
{
    let mut rx = cancel.subscribe();
    let mut attempts: u32 = 0;

    loop {
        if *rx.borrow() {
            return Err(EvolveError::Cancelled { lock });
        }

        attempts += 1;
        if try_lock().await? {
            log::debug!("Acquired {lock} after {attempts} attempt(s)");
            return Ok(());
        }

        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                return Err(EvolveError::LockTimeout { lock, attempts });
            }
        }

        log::info!(
            "Cannot acquire the {lock}: another migration is running. Retrying in {}s",
            policy.interval.as_secs_f64()
        );

        tokio::select! {
            _ = tokio::time::sleep(policy.interval) => {}
            _ = cancelled(&mut rx) => return Err(EvolveError::Cancelled { lock }),
        }
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
