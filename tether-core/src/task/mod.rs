//! Session-scoped background tasks.
//!
//! Every task spawned into a [`TaskSet`] races against the set's
//! `CancellationToken`, so cancelling the token (or calling
//! [`TaskSet::shutdown`]) stops all of them together.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TaskError;

pub struct LinkTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl LinkTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Tasks tied to one connection (heartbeat, telemetry, ...).
pub struct TaskSet {
    token: CancellationToken,
    tasks: Vec<LinkTask>,
}

impl TaskSet {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            tasks: Vec::new(),
        }
    }

    /// Spawn `fut` on the runtime. It is dropped as soon as the set's token
    /// is cancelled.
    pub fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|t| !t.is_finished());
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => debug!(task = name, "task cancelled"),
                _ = fut => debug!(task = name, "task finished"),
            }
        });
        self.tasks.push(LinkTask { name, handle });
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel every task and wait for them to unwind.
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.handle.await {
                warn!(task = task.name, "task ended abnormally: {e}");
            }
        }
    }
}

/// Run `fut` with a deadline, mapping expiry to [`TaskError::Timeout`].
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, TaskError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| TaskError::Timeout(deadline))
}

/// Sleep for `delay` unless `token` fires first. Returns `false` when
/// cancelled.
pub async fn sleep_or_cancel(delay: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
