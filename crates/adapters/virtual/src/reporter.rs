//! Usage reporter that logs reports instead of calling a backend.

use tokio::sync::mpsc;

use bentech_app::ports::UsageReporter;
use bentech_domain::error::CollaboratorError;
use bentech_domain::usage::UsageReport;

/// Logs every report, and forwards it to an optional channel.
#[derive(Debug, Clone, Default)]
pub struct LogReporter {
    sink: Option<mpsc::UnboundedSender<UsageReport>>,
}

impl LogReporter {
    /// A reporter that also forwards reports to the returned receiver.
    #[must_use]
    pub fn forwarding() -> (Self, mpsc::UnboundedReceiver<UsageReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sink: Some(tx) }, rx)
    }
}

impl UsageReporter for LogReporter {
    async fn report(&self, report: UsageReport) -> Result<(), CollaboratorError> {
        tracing::info!(
            started_at = %report.started_at,
            duration = ?report.duration(),
            rolls = ?report.rolls,
            subscribed = report.subscription.is_some(),
            "usage report",
        );
        match &self.sink {
            Some(sink) => sink
                .send(report)
                .map_err(|_| CollaboratorError::Unavailable),
            None => Ok(()),
        }
    }
}
