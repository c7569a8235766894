// Fire-and-forget dispatch of notices for one background pass.
//
// Each send runs on its own task with a timeout, so a slow or failing
// channel never holds up billing work. `finish` waits for the outstanding
// sends and tallies them so a pass still completes within its tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::modules::notifications::models::Notice;
use crate::modules::notifications::services::NotificationService;

/// Delivery tally for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

pub struct NoticeBatch {
    notifier: Arc<dyn NotificationService>,
    timeout: Duration,
    tasks: JoinSet<bool>,
}

impl NoticeBatch {
    pub fn new(notifier: Arc<dyn NotificationService>, timeout: Duration) -> Self {
        Self {
            notifier,
            timeout,
            tasks: JoinSet::new(),
        }
    }

    /// Start sending a notice in the background
    pub fn dispatch(&mut self, notice: Notice) {
        let notifier = Arc::clone(&self.notifier);
        let timeout = self.timeout;

        self.tasks.spawn(async move {
            match tokio::time::timeout(timeout, notifier.send(&notice)).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    warn!(
                        channel = notifier.name(),
                        kind = notice.kind(),
                        recipient = notice.recipient().email.as_str(),
                        error = %e,
                        "Notice delivery failed"
                    );
                    false
                }
                Err(_) => {
                    warn!(
                        channel = notifier.name(),
                        kind = notice.kind(),
                        recipient = notice.recipient().email.as_str(),
                        timeout_ms = timeout.as_millis() as u64,
                        "Notice delivery timed out"
                    );
                    false
                }
            }
        });
    }

    /// Wait for every dispatched send and report the outcome
    pub async fn finish(mut self) -> DispatchReport {
        let mut report = DispatchReport::default();

        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(true) => report.sent += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    error!(error = %e, "Notice delivery task panicked");
                    report.failed += 1;
                }
            }
        }

        report
    }
}
