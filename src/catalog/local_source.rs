//! On-device media: the local store collaborator and its catalog adapter.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use lofty::file::AudioFile;
use log::{debug, warn};

use super::{MediaItem, MediaKind, LOCAL_ID_PREFIX};
use crate::{error::CatalogError, media_file_discovery::collect_media_files_from_folder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Raw asset as reported by the device media store.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAsset {
    pub id: String,
    pub filename: String,
    pub uri: String,
    pub duration_secs: Option<f64>,
}

/// Device media library collaborator.
pub trait LocalMediaStore: Send + Sync {
    fn request_permission(&self) -> PermissionStatus;
    fn list_audio(&self, limit: usize) -> Result<Vec<LocalAsset>, CatalogError>;
    fn list_video(&self, limit: usize) -> Result<Vec<LocalAsset>, CatalogError>;
}

/// Media store backed by configured folders on disk.
pub struct FolderMediaStore {
    audio_folders: Vec<PathBuf>,
    video_folders: Vec<PathBuf>,
    access_granted: bool,
}

impl FolderMediaStore {
    pub fn new(audio_folders: Vec<PathBuf>, video_folders: Vec<PathBuf>, access_granted: bool) -> Self {
        Self {
            audio_folders,
            video_folders,
            access_granted,
        }
    }

    fn scan(&self, kind: MediaKind, limit: usize) -> Result<Vec<LocalAsset>, CatalogError> {
        let folders = match kind {
            MediaKind::Audio => &self.audio_folders,
            MediaKind::Video => &self.video_folders,
        };

        let mut assets = Vec::new();
        for folder in folders {
            let files = match collect_media_files_from_folder(folder, kind) {
                Ok(files) => files,
                Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                    return Err(CatalogError::PermissionDenied);
                }
                Err(err) => {
                    warn!("Skipping media folder {}: {}", folder.display(), err);
                    continue;
                }
            };
            for path in files {
                if assets.len() >= limit {
                    return Ok(assets);
                }
                assets.push(asset_from_path(&path, kind));
            }
        }
        Ok(assets)
    }
}

fn asset_from_path(path: &Path, kind: MediaKind) -> LocalAsset {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    // Only video assets carry a probed duration; audio durations arrive from the engine.
    let duration_secs = match kind {
        MediaKind::Video => probe_duration_secs(path),
        MediaKind::Audio => None,
    };
    LocalAsset {
        id: path.to_string_lossy().to_string(),
        filename,
        uri: format!("file://{}", path.display()),
        duration_secs,
    }
}

/// Reads the container duration, if the file can be parsed.
pub fn probe_duration_secs(path: &Path) -> Option<f64> {
    match lofty::read_from_path(path) {
        Ok(tagged_file) => {
            let secs = tagged_file.properties().duration().as_secs_f64();
            (secs > 0.0).then_some(secs)
        }
        Err(err) => {
            debug!("Could not probe duration of {}: {}", path.display(), err);
            None
        }
    }
}

impl LocalMediaStore for FolderMediaStore {
    fn request_permission(&self) -> PermissionStatus {
        if self.access_granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    fn list_audio(&self, limit: usize) -> Result<Vec<LocalAsset>, CatalogError> {
        self.scan(MediaKind::Audio, limit)
    }

    fn list_video(&self, limit: usize) -> Result<Vec<LocalAsset>, CatalogError> {
        self.scan(MediaKind::Video, limit)
    }
}

/// Turns local assets into namespaced catalog items.
pub struct LocalCatalogAdapter {
    store: Arc<dyn LocalMediaStore>,
    audio_limit: usize,
    video_limit: usize,
}

impl LocalCatalogAdapter {
    pub fn new(store: Arc<dyn LocalMediaStore>, audio_limit: usize, video_limit: usize) -> Self {
        Self {
            store,
            audio_limit,
            video_limit,
        }
    }

    /// Fails with `PermissionDenied` when the store refuses access.
    pub fn list(&self, kind: MediaKind) -> Result<Vec<MediaItem>, CatalogError> {
        if self.store.request_permission() == PermissionStatus::Denied {
            return Err(CatalogError::PermissionDenied);
        }

        let assets = match kind {
            MediaKind::Audio => self.store.list_audio(self.audio_limit)?,
            MediaKind::Video => self.store.list_video(self.video_limit)?,
        };
        Ok(assets
            .into_iter()
            .map(|asset| MediaItem {
                id: format!("{LOCAL_ID_PREFIX}{}", asset.id),
                title: asset.filename,
                uri: asset.uri,
                duration_secs: asset.duration_secs,
            })
            .collect())
    }
}
