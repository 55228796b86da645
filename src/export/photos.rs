use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::AppResult;
use crate::fixeau::FixeauClient;
use crate::fixeau::models::Photo;

/// Uploads photos referenced by local records.
///
/// Photos are keyed by their path relative to the media root, so files with
/// the same name in different folders stay distinct. Failures never abort the
/// export: they are logged and the record is exported without a photo.
pub struct PhotoUploader<'a> {
    client: &'a FixeauClient,
    media_root: PathBuf,
    resolved: HashMap<String, Photo>,
    pub uploaded: usize,
}

impl<'a> PhotoUploader<'a> {
    #[must_use]
    pub fn new(client: &'a FixeauClient, media_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            media_root: media_root.into(),
            resolved: HashMap::new(),
            uploaded: 0,
        }
    }

    /// Find or upload the photo stored at `relative_path` under the media root.
    pub async fn resolve(&mut self, relative_path: Option<&str>) -> Option<Photo> {
        let key = relative_path
            .map(|p| p.trim().trim_start_matches('/'))
            .filter(|p| !p.is_empty())?
            .to_string();

        if let Some(photo) = self.resolved.get(&key) {
            return Some(photo.clone());
        }

        match self.find_or_upload(&key).await {
            Ok(photo) => {
                self.resolved.insert(key, photo.clone());
                Some(photo)
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %key, "Photo upload failed, skipping");
                None
            }
        }
    }

    async fn find_or_upload(&mut self, key: &str) -> AppResult<Photo> {
        let existing = self
            .client
            .find_first::<Photo>("/photo/", &[("name", key)])
            .await?;

        if let Some(photo) = existing.filter(|p| p.name.as_deref() == Some(key)) {
            tracing::debug!(id = photo.id, name = %key, "Found existing photo");
            return Ok(photo);
        }

        let photo = self
            .client
            .upload_photo(&self.media_root.join(key), key)
            .await?;
        self.uploaded += 1;
        tracing::debug!(id = photo.id, url = %photo.url, "Uploaded photo");
        Ok(photo)
    }
}
