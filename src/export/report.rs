use serde::Serialize;
use std::path::Path;

use crate::error::AppResult;

/// Account created during an export, with its generated password
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedUser {
    pub observer: String,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

/// Counters of one export run
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub group_id: i64,
    pub users_found: usize,
    pub users_created: usize,
    pub user_errors: usize,
    pub sources_found: usize,
    pub sources_created: usize,
    pub series_found: usize,
    pub series_created: usize,
    pub uploads: usize,
    pub measurements: usize,
    pub photos_uploaded: usize,
    pub relocated: usize,
    pub created_users: Vec<CreatedUser>,
    /// Error that stopped the export or the relocation before it finished
    pub aborted: Option<String>,
}

impl ExportReport {
    pub fn log_summary(&self) {
        tracing::info!(
            group = self.group_id,
            users_found = self.users_found,
            users_created = self.users_created,
            user_errors = self.user_errors,
            sources_found = self.sources_found,
            sources_created = self.sources_created,
            series_found = self.series_found,
            series_created = self.series_created,
            uploads = self.uploads,
            measurements = self.measurements,
            photos_uploaded = self.photos_uploaded,
            relocated = self.relocated,
            aborted = self.aborted.is_some(),
            "Export finished"
        );
    }

    /// Write the created accounts and their passwords as CSV.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Csv` if the file cannot be written.
    pub fn write_credentials(&self, path: &Path) -> AppResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for user in &self.created_users {
            writer.serialize(user)?;
        }
        writer.flush()?;

        tracing::info!(
            path = %path.display(),
            users = self.created_users.len(),
            "Wrote credentials of created users"
        );
        Ok(())
    }
}
