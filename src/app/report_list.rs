use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{DomainError, ReportId, UserId};
use crate::ports::BackendApi;

/// Called with the newly selected report.
pub type ReportListener = Box<dyn Fn(&ReportId) + Send + Sync>;

/// Mirrors the server-held list of a user's reports and owns the selection.
///
/// Selection only changes through this type; every change is reported to
/// the listener.
pub struct ReportSelector {
    backend: Arc<dyn BackendApi>,
    user_id: Option<UserId>,
    reports: RwLock<Vec<ReportId>>,
    selected: RwLock<Option<ReportId>>,
    listener: Option<ReportListener>,
}

impl ReportSelector {
    pub fn new(backend: Arc<dyn BackendApi>, user_id: Option<UserId>) -> Self {
        Self {
            backend,
            user_id,
            reports: RwLock::new(Vec::new()),
            selected: RwLock::new(None),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: ReportListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn reports(&self) -> Vec<ReportId> {
        self.reports.read().clone()
    }

    pub fn selected(&self) -> Option<ReportId> {
        self.selected.read().clone()
    }

    /// Fetch the report list. The first report becomes the selection when
    /// nothing is selected yet.
    ///
    /// Without a user nothing is fetched. A failed fetch leaves the list empty.
    pub async fn load(&self) -> Result<Vec<ReportId>, DomainError> {
        let Some(user_id) = &self.user_id else {
            debug!("No user, report list stays empty");
            self.reports.write().clear();
            return Ok(Vec::new());
        };

        let reports = match self.backend.user_reports(user_id).await {
            Ok(reports) => reports,
            Err(e) => {
                warn!(error = %e, "Report list fetch failed");
                self.reports.write().clear();
                return Err(e);
            }
        };
        info!(count = reports.len(), "Reports loaded");
        *self.reports.write() = reports.clone();

        let first = {
            let mut selected = self.selected.write();
            match (selected.as_ref(), reports.first()) {
                (None, Some(first)) => {
                    *selected = Some(first.clone());
                    Some(first.clone())
                }
                _ => None,
            }
        };
        if let Some(first) = first {
            self.notify(&first);
        }

        Ok(reports)
    }

    /// Make `report_id` the active report.
    pub fn select(&self, report_id: ReportId) {
        *self.selected.write() = Some(report_id.clone());
        debug!(report_id = %report_id, "Report selected");
        self.notify(&report_id);
    }

    /// Save a report document to `dest`.
    pub async fn download(&self, report_id: &ReportId, dest: &Path) -> Result<u64, DomainError> {
        self.backend.download_report(report_id, dest).await
    }

    fn notify(&self, report_id: &ReportId) {
        if let Some(listener) = &self.listener {
            listener(report_id);
        }
    }
}
