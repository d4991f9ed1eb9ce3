use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::chat::nullable_list;

/// Opaque identifier of a previously uploaded report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReportId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// `GET /get-user-reports` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportListResponse {
    #[serde(default, deserialize_with = "nullable_list")]
    pub report_ids: Vec<ReportId>,
}

/// `POST /upload-report-file` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: Option<String>,
}
