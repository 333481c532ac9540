//! Results of backend synchronisation.
//!
//! Optimistic mutations hand back a [`SyncTask`] for the backend call they
//! started. Dropping it detaches the call; awaiting [`SyncTask::outcome`]
//! yields the [`RemoteOutcome`].

use std::future::Future;

use tokio::task::JoinHandle;

use crate::error::CartError;

/// What happened on the backend side of a cart operation.
#[derive(Debug)]
pub enum RemoteOutcome {
    /// Guest session, or nothing to send.
    LocalOnly,
    /// Backend accepted the change.
    Synced,
    /// Backend call failed; the local state was kept as-is.
    Failed(CartError),
}

impl RemoteOutcome {
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    #[must_use]
    pub const fn error(&self) -> Option<&CartError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Result<(), CartError>> for RemoteOutcome {
    fn from(result: Result<(), CartError>) -> Self {
        match result {
            Ok(()) => Self::Synced,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Handle on a backend call started by an optimistic mutation.
#[derive(Debug)]
pub struct SyncTask {
    handle: Option<JoinHandle<RemoteOutcome>>,
}

impl SyncTask {
    /// No backend call was needed.
    #[must_use]
    pub const fn local() -> Self {
        Self { handle: None }
    }

    /// Run `call` on the Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<F>(call: F) -> Self
    where
        F: Future<Output = RemoteOutcome> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(call)),
        }
    }

    /// Whether a backend call is attached.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait for the backend call to finish.
    pub async fn outcome(self) -> RemoteOutcome {
        match self.handle {
            None => RemoteOutcome::LocalOnly,
            Some(handle) => handle
                .await
                .unwrap_or_else(|e| RemoteOutcome::Failed(CartError::TaskJoin(e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_task_reports_local_only() {
        let task = SyncTask::local();
        assert!(!task.is_remote());
        assert!(matches!(task.outcome().await, RemoteOutcome::LocalOnly));
    }

    #[tokio::test]
    async fn test_spawned_task_reports_result() {
        let task = SyncTask::spawn(async { RemoteOutcome::from(Err(CartError::NotAuthenticated)) });
        assert!(task.is_remote());
        let outcome = task.outcome().await;
        assert!(outcome.is_failed());
        assert!(matches!(outcome.error(), Some(CartError::NotAuthenticated)));
    }

    fn exploding_call() -> RemoteOutcome {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicking_task_maps_to_join_error() {
        let task = SyncTask::spawn(async { exploding_call() });
        assert!(matches!(
            task.outcome().await,
            RemoteOutcome::Failed(CartError::TaskJoin(_))
        ));
    }
}
