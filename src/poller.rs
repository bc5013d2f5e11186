use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::service::Client;
use crate::session::SessionEvent;

/// How often an in-flight browse is asked for progress.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Owned handle to the background progress poll for one browse request.
///
/// Acquired when the session enters the pending state and released on
/// every way out of it; dropping the handle aborts the task, so no timer
/// outlives the request that needed it.
pub(crate) struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Poll the service for `username`'s progress every [`POLL_INTERVAL`]
    /// (first reading immediately), forwarding each one into the session's
    /// event channel tagged with the request generation.
    pub(crate) fn spawn(
        mut client: Client,
        username: String,
        generation: u64,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(POLL_INTERVAL);
            loop {
                ticks.tick().await;
                match client.browse_status(&username).await {
                    Ok(status) => {
                        let update = SessionEvent::StatusUpdated { generation, status };
                        if events.send(update).await.is_err() {
                            // Session gone, nothing left to report to.
                            return;
                        }
                    }
                    Err(error) => {
                        // Progress is best-effort; skip the reading.
                        tracing::debug!("progress poll for {username} failed: {error}");
                    }
                }
            }
        });

        Self { task }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{BrowseStatus, Command};
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn forwards_progress_readings_until_dropped() {
        let (client, mut commands) = Client::new();
        let backend = tokio::spawn(async move {
            let mut percent = 0.0;
            while let Some(command) = commands.next().await {
                if let Command::Status { sender, .. } = command {
                    percent += 25.0;
                    let _ = sender.send(Ok(BrowseStatus {
                        percent_complete: percent,
                    }));
                }
            }
        });

        let (sender, mut events) = mpsc::channel(8);
        let poller = PollerHandle::spawn(client, "alice".to_owned(), 7, sender);

        match events.recv().await {
            Some(SessionEvent::StatusUpdated { generation, status }) => {
                assert_eq!(generation, 7);
                assert!(status.percent_complete > 0.0);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        drop(poller);

        // The aborted task releases its sender; after any buffered
        // readings the channel closes instead of ticking forever.
        while let Some(event) = events.recv().await {
            assert!(matches!(event, SessionEvent::StatusUpdated { .. }));
        }
        backend.abort();
    }
}
