use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{RegistryError, Result};

/// Races every network operation of one logical call against an optional
/// cancellation token and an optional deadline.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Guard<'a> {
    cancel: Option<&'a CancellationToken>,
    deadline: Option<Instant>,
}

impl<'a> Guard<'a> {
    pub fn cancellable(cancel: &'a CancellationToken) -> Self {
        Guard {
            cancel: Some(cancel),
            deadline: None,
        }
    }

    pub fn until(deadline: Instant) -> Self {
        Guard {
            cancel: None,
            deadline: Some(deadline),
        }
    }

    /// Fails if the call was cancelled or ran out of time
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(RegistryError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(RegistryError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Runs `fut` unless the call is aborted first. An aborted `fut` is dropped.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = cancelled(self.cancel) => Err(RegistryError::Cancelled),
            _ = elapsed(self.deadline) => Err(RegistryError::DeadlineExceeded),
            res = fut => res,
        }
    }
}

async fn cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
