//! Owned, cancellable tokio task
//!
//! A [`ScopedTask`] pairs a spawned future with a `CancellationToken`. The
//! token is checked before the future on every poll, so cancelling stops
//! it at its next await point. Dropping the handle cancels the task as
//! well: a task never outlives the value that owns it.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::types::{Error, Result};

/// Handle to a spawned task that is cancelled when dropped
#[derive(Debug)]
pub struct ScopedTask {
    name: String,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScopedTask {
    /// Spawn `make(token)` on the current runtime
    ///
    /// The token handed to `make` is the one that cancels the task, so the
    /// future may also pass it on or poll it itself.
    pub fn spawn<F, Fut>(name: impl Into<String>, make: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_with_token(name, CancellationToken::new(), make)
    }

    /// Spawn a task cancelled by a child of `parent`
    pub fn spawn_child<F, Fut>(name: impl Into<String>, parent: &CancellationToken, make: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_with_token(name, parent.child_token(), make)
    }

    fn spawn_with_token<F, Fut>(name: impl Into<String>, token: CancellationToken, make: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let future = make(token.clone());
        let cancel = token.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            debug!("Task started: {}", task_name);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Task cancelled: {}", task_name);
                }
                _ = future => {
                    debug!("Task completed: {}", task_name);
                }
            }
        });

        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    /// Token that cancels this task
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Check if task is finished
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request cancellation without waiting
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the task to stop
    ///
    /// If the task does not stop within `timeout` it is aborted and an error
    /// is returned.
    pub async fn shutdown(mut self, timeout: Duration) -> Result<()> {
        self.token.cancel();

        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(Err(e)) => Err(Error::Task(format!("Task {} panicked: {}", self.name, e))),
            Err(_) => {
                warn!("Task {} did not stop within {:?}, aborting", self.name, timeout);
                handle.abort();
                Err(Error::Task(format!("Task {} shutdown timed out", self.name)))
            }
        }
    }

    /// Wait for the task to finish on its own
    pub async fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| Error::Task(format!("Task {} failed: {}", self.name, e))),
            None => Ok(()),
        }
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
