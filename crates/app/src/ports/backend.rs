//! Backend port — relays usage reports to the remote service.

use std::future::Future;

use bentech_domain::error::CollaboratorError;
use bentech_domain::usage::UsageReport;

/// Delivers completed-visit reports to the backend.
pub trait UsageReporter: Send + Sync {
    /// Send one report.
    fn report(
        &self,
        report: UsageReport,
    ) -> impl Future<Output = Result<(), CollaboratorError>> + Send;
}

impl<T: UsageReporter> UsageReporter for std::sync::Arc<T> {
    fn report(
        &self,
        report: UsageReport,
    ) -> impl Future<Output = Result<(), CollaboratorError>> + Send {
        (**self).report(report)
    }
}
