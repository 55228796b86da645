//! Export of the local EC observations to fixeau.com.
//!
//! One run walks the snapshot top-down:
//! - group named after the project
//! - users, one per observer (optional)
//! - data sources, one per Akvo device (optional)
//! - per measuring point: photo, then one series per category with a bulk
//!   upload of its measurements

pub mod convert;
pub mod photos;
pub mod report;
pub mod resolve;

use futures::TryStreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::AppResult;
use crate::fixeau::FixeauClient;
use crate::fixeau::models::{FolderPatch, SOURCE_TYPE_AKVO, Source};
use crate::local::{MeasuringPoint, Snapshot};

use convert::Category;
use photos::PhotoUploader;
use report::{CreatedUser, ExportReport};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Folder for new data sources and series
    pub folder: Option<i64>,
    pub with_users: bool,
    pub with_sources: bool,
    pub with_photos: bool,
    pub media_root: PathBuf,
}

impl ExportOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            folder: Some(config.folder),
            with_users: false,
            with_sources: false,
            with_photos: true,
            media_root: config.media_root.clone(),
        }
    }
}

/// Export `snapshot` through `client`.
///
/// User and source failures are logged and skipped. A failure while exporting
/// the series of a measuring point stops the run; the report then carries the
/// error in `aborted`.
///
/// # Errors
///
/// Returns an error if the group cannot be resolved.
pub async fn run(
    client: &FixeauClient,
    snapshot: &Snapshot,
    options: &ExportOptions,
) -> AppResult<ExportReport> {
    let mut report = ExportReport::default();

    let group = resolve::group(client, &snapshot.project_name).await?;
    report.group_id = group.entity.id;
    tracing::debug!(
        id = group.entity.id,
        name = %group.entity.name,
        created = group.created,
        "Resolved group"
    );

    let usernames = if options.with_users {
        export_users(client, snapshot, report.group_id, &mut report).await
    } else {
        HashMap::new()
    };

    if options.with_sources {
        export_sources(client, snapshot, &usernames, options.folder, &mut report).await;
    }

    tracing::info!(points = snapshot.points.len(), "Creating time series");
    let mut photos = PhotoUploader::new(client, options.media_root.clone());

    for point in &snapshot.points {
        if let Err(e) = export_point(client, point, options, &mut photos, &mut report).await {
            tracing::error!(error = %e, point = %point, "Aborting export");
            report.aborted = Some(e.to_string());
            break;
        }
    }

    report.photos_uploaded = photos.uploaded;
    Ok(report)
}

/// Export, then optionally move sources and series into `relocate_to`, then
/// write the credentials of created users to `credentials`.
///
/// A failed relocation is recorded in `aborted` like a failed export, and the
/// credentials file is written in both cases.
///
/// # Errors
///
/// Returns an error if the group cannot be resolved or the credentials file
/// cannot be written.
pub async fn execute(
    client: &FixeauClient,
    snapshot: &Snapshot,
    options: &ExportOptions,
    relocate_to: Option<i64>,
    credentials: Option<&Path>,
) -> AppResult<ExportReport> {
    let mut report = run(client, snapshot, options).await?;

    if let Some(folder) = relocate_to
        && report.aborted.is_none()
    {
        match relocate(client, snapshot, folder).await {
            Ok(relocated) => report.relocated = relocated,
            Err(e) => {
                tracing::error!(error = %e, folder, "Relocation failed");
                report.aborted = Some(format!("Relocation failed: {e}"));
            }
        }
    }

    if let Some(path) = credentials {
        report.write_credentials(path)?;
        tracing::info!(
            path = %path.display(),
            users = report.created_users.len(),
            "Wrote credentials"
        );
    }

    Ok(report)
}

async fn export_users(
    client: &FixeauClient,
    snapshot: &Snapshot,
    group: i64,
    report: &mut ExportReport,
) -> HashMap<i32, String> {
    tracing::info!(observers = snapshot.observers.len(), "Creating users");
    let mut usernames = HashMap::new();

    for observer in &snapshot.observers {
        match resolve::user(client, observer, group).await {
            Ok(resolved) => {
                if let Some(password) = resolved.password {
                    report.users_created += 1;
                    tracing::info!(
                        id = resolved.user.id,
                        username = %resolved.user.username,
                        observer = %observer,
                        "Created user"
                    );
                    report.created_users.push(CreatedUser {
                        observer: observer.to_string(),
                        username: resolved.user.username.clone(),
                        password,
                        email: observer.email.clone(),
                    });
                } else {
                    report.users_found += 1;
                    tracing::debug!(
                        id = resolved.user.id,
                        username = %resolved.user.username,
                        observer = %observer,
                        "Found user"
                    );
                }
                usernames.insert(observer.id, resolved.user.username);
            }
            Err(e) => {
                report.user_errors += 1;
                tracing::error!(error = %e, observer = %observer, "Failed to create user");
            }
        }
    }

    usernames
}

async fn export_sources(
    client: &FixeauClient,
    snapshot: &Snapshot,
    usernames: &HashMap<i32, String>,
    folder: Option<i64>,
    report: &mut ExportReport,
) {
    let devices = snapshot.devices();
    tracing::info!(devices = devices.len(), "Creating data sources");

    for (device, observers) in &devices {
        let users: Vec<String> = observers
            .iter()
            .filter_map(|id| usernames.get(id).cloned())
            .collect();

        match resolve::source(client, device, users, report.group_id, folder).await {
            Ok(source) if source.created => {
                report.sources_created += 1;
                tracing::debug!(device = %device, "Created data source");
            }
            Ok(_) => {
                report.sources_found += 1;
                tracing::debug!(device = %device, "Found existing data source");
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    device = %device,
                    "Failed to create data source, skipping remaining devices"
                );
                break;
            }
        }
    }
}

async fn export_point(
    client: &FixeauClient,
    point: &MeasuringPoint,
    options: &ExportOptions,
    photos: &mut PhotoUploader<'_>,
    report: &mut ExportReport,
) -> AppResult<()> {
    let point_photo = if options.with_photos {
        photos.resolve(point.photo.as_deref()).await
    } else {
        None
    };

    for category in Category::ALL {
        let observations = category.observations(point);
        if observations.is_empty() {
            continue;
        }

        let series = resolve::series(client, point, category, options.folder, point_photo.clone())
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    point = %point,
                    category = ?category.label(),
                    "Failed to resolve time series"
                );
            })?;

        if series.created {
            report.series_created += 1;
        } else {
            report.series_found += 1;
        }
        tracing::debug!(
            id = series.entity.id,
            point = %point,
            category = ?category.label(),
            created = series.created,
            "Resolved time series"
        );

        let mut measurements = Vec::with_capacity(observations.len());
        for observation in observations {
            let photo = if options.with_photos {
                photos.resolve(observation.photo.as_deref()).await
            } else {
                None
            };
            measurements.push(convert::new_measurement(
                point,
                observation,
                series.entity.id,
                photo,
            ));
        }

        let response: Value = client
            .create("/measurement/", &measurements)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    point = %point,
                    category = ?category.label(),
                    "Failed to upload measurements"
                );
            })?;

        report.uploads += 1;
        report.measurements += measurements.len();
        tracing::debug!(
            series = series.entity.id,
            sent = measurements.len(),
            added = response.get("count").and_then(serde_json::Value::as_u64),
            "Added measurements"
        );
    }

    Ok(())
}

/// Move every Akvo data source and every EC series of the snapshot into `folder`.
///
/// Returns the number of patched sources and series.
///
/// # Errors
///
/// Returns the first API error; nothing is retried.
pub async fn relocate(client: &FixeauClient, snapshot: &Snapshot, folder: i64) -> AppResult<usize> {
    let patch = FolderPatch { folder };
    let mut relocated = 0;

    tracing::info!(folder, "Updating data sources");
    let sources: Vec<Source> = client
        .list("/source/", &[("source_type", SOURCE_TYPE_AKVO)])
        .try_collect()
        .await?;
    for source in &sources {
        let _: Value = client.partial_update("/source/", &source.id, &patch).await?;
        relocated += 1;
    }

    tracing::info!(folder, "Updating series");
    for point in &snapshot.points {
        for category in Category::ALL {
            if let Some(series) = resolve::find_series(client, point, category).await? {
                tracing::debug!(id = series.id, name = %series.name, "Update series");
                let _: Value = client.partial_update("/series/", series.id, &patch).await?;
                relocated += 1;
            }
        }
    }

    Ok(relocated)
}
