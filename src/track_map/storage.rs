// Storage implementations for track map persistence

use crate::errors::MapperError;
use crate::track_map::types::PathAsset;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Number of backups kept per track
const MAX_BACKUPS: usize = 5;

/// Trait defining the interface for track map storage operations
pub trait PathStore {
    /// Save a track map to persistent storage under its track id
    fn save_path(&mut self, asset: &PathAsset) -> Result<(), MapperError>;

    /// Load the track map for a track id, `None` when nothing was recorded yet
    fn load_path(&mut self, track_id: &str) -> Result<Option<PathAsset>, MapperError>;

    /// List all track ids with a stored map
    fn list_available_tracks(&self) -> Result<Vec<String>, MapperError>;

    /// Delete the track map for a track id
    fn delete_path(&mut self, track_id: &str) -> Result<(), MapperError>;

    /// Check if a track map exists for a given track id
    fn path_exists(&self, track_id: &str) -> Result<bool, MapperError>;
}

/// Normalize a track id for consistent file naming and lookup
pub fn normalize_track_id(track_id: &str) -> String {
    track_id
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn validate_for_save(asset: &PathAsset) -> Result<(), MapperError> {
    if asset.track_id.trim().is_empty() {
        return Err(MapperError::PathValidationError {
            reason: "Track id cannot be empty".to_string(),
        });
    }
    if asset.is_empty() {
        return Err(MapperError::PathValidationError {
            reason: "Track map has no samples".to_string(),
        });
    }
    asset
        .validate()
        .map_err(|reason| MapperError::PathValidationError { reason })
}

/// File-based track map storage, one JSON file per track
pub struct FileBasedPathStore {
    /// Base directory for storing track map files
    storage_path: PathBuf,
    /// Maps already read or written, keyed by normalized track id
    cache: HashMap<String, PathAsset>,
}

impl FileBasedPathStore {
    /// Create a new file-based storage instance
    pub fn new(storage_path: PathBuf) -> Result<Self, MapperError> {
        if !storage_path.exists() {
            fs::create_dir_all(&storage_path)
                .map_err(|e| MapperError::ConfigIOError { source: e })?;
        }

        Ok(Self {
            storage_path,
            cache: HashMap::new(),
        })
    }

    /// Create storage in the default application data directory
    pub fn new_default() -> Result<Self, MapperError> {
        Self::new(Self::default_storage_path()?)
    }

    /// Get the default storage path for track maps
    pub fn default_storage_path() -> Result<PathBuf, MapperError> {
        let app_data_dir = dirs::data_dir().ok_or(MapperError::NoConfigDir)?;
        Ok(app_data_dir.join("trackmap").join("track_map"))
    }

    /// Drop every cached map so the next load reads the files again
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Get the storage directory path
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    fn file_path_for_track(&self, track_id: &str) -> PathBuf {
        self.storage_path
            .join(format!("{}.json", normalize_track_id(track_id)))
    }

    fn attempt_load_from_file(&self, file_path: &Path) -> Result<PathAsset, MapperError> {
        let content =
            fs::read_to_string(file_path).map_err(|e| MapperError::FileOperationError {
                operation: "read_track_map".to_string(),
                reason: format!("Failed to read file: {}", e),
            })?;

        if content.trim().is_empty() {
            return Err(MapperError::PathStoreError {
                reason: "Track map file is empty".to_string(),
            });
        }

        let asset: PathAsset =
            serde_json::from_str(&content).map_err(|e| MapperError::PathStoreError {
                reason: format!("Failed to parse JSON: {}", e),
            })?;

        asset
            .validate()
            .map_err(|reason| MapperError::PathValidationError { reason })?;
        Ok(asset)
    }

    /// Backup files for a track, newest first
    fn backup_files(&self, track_id: &str) -> Result<Vec<PathBuf>, MapperError> {
        let prefix = format!("{}.json.backup.", normalize_track_id(track_id));
        let entries =
            fs::read_dir(&self.storage_path).map_err(|e| MapperError::FileOperationError {
                operation: "list_backups".to_string(),
                reason: format!("Cannot read directory: {}", e),
            })?;

        let mut backup_files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .collect();

        backup_files.sort_by_key(|path| {
            fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        });
        backup_files.reverse();
        Ok(backup_files)
    }

    fn attempt_load_from_backup(&self, track_id: &str) -> Result<PathAsset, MapperError> {
        for backup_path in self.backup_files(track_id)? {
            if let Ok(asset) = self.attempt_load_from_file(&backup_path) {
                info!("Loaded track map from backup: {:?}", backup_path);
                return Ok(asset);
            }
        }

        Err(MapperError::PathStoreError {
            reason: "No valid backup files found".to_string(),
        })
    }

    fn create_backup_if_exists(&self, track_id: &str) -> Result<(), MapperError> {
        let file_path = self.file_path_for_track(track_id);
        if !file_path.exists() {
            return Ok(());
        }

        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(|e| MapperError::FileOperationError {
                operation: "create_backup".to_string(),
                reason: format!("Failed to get timestamp: {}", e),
            })?
            .as_millis();

        let backup_path = file_path.with_extension(format!("json.backup.{}", timestamp));
        fs::copy(&file_path, &backup_path).map_err(|e| MapperError::FileOperationError {
            operation: "create_backup".to_string(),
            reason: format!("Failed to create backup: {}", e),
        })?;

        debug!("Created backup: {:?}", backup_path);
        Ok(())
    }

    /// Write through a temporary file so a crash mid-write never leaves a truncated map
    fn save_to_file_atomic(&self, asset: &PathAsset) -> Result<(), MapperError> {
        let file_path = self.file_path_for_track(&asset.track_id);
        let temp_path = file_path.with_extension("json.tmp");

        let content =
            serde_json::to_string(asset).map_err(|e| MapperError::PathStoreError {
                reason: format!("Failed to serialize track map: {}", e),
            })?;

        {
            let mut temp_file =
                fs::File::create(&temp_path).map_err(|e| MapperError::FileOperationError {
                    operation: "create_temp_file".to_string(),
                    reason: format!("Failed to create temporary file: {}", e),
                })?;

            temp_file
                .write_all(content.as_bytes())
                .and_then(|_| temp_file.sync_all())
                .map_err(|e| MapperError::FileOperationError {
                    operation: "write_temp_file".to_string(),
                    reason: format!("Failed to write temporary file: {}", e),
                })?;
        }

        fs::rename(&temp_path, &file_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            MapperError::FileOperationError {
                operation: "atomic_move".to_string(),
                reason: format!("Failed to move temporary file to final location: {}", e),
            }
        })
    }

    fn cleanup_old_backups(&self, track_id: &str) -> Result<(), MapperError> {
        for old_backup in self.backup_files(track_id)?.into_iter().skip(MAX_BACKUPS) {
            if let Err(e) = fs::remove_file(&old_backup) {
                warn!("Failed to remove old backup {:?}: {}", old_backup, e);
            } else {
                debug!("Removed old backup: {:?}", old_backup);
            }
        }
        Ok(())
    }
}

impl PathStore for FileBasedPathStore {
    fn save_path(&mut self, asset: &PathAsset) -> Result<(), MapperError> {
        info!(
            "Saving track map for {} ({} samples)",
            asset.track_id,
            asset.coordinates.len()
        );

        if let Err(validation_error) = validate_for_save(asset) {
            error!("Track map validation failed: {}", validation_error);
            return Err(validation_error);
        }

        if let Err(backup_error) = self.create_backup_if_exists(&asset.track_id) {
            warn!("Failed to create backup: {}", backup_error);
        }

        self.save_to_file_atomic(asset)?;
        // only a map that reached the disk is cached
        self.cache
            .insert(normalize_track_id(&asset.track_id), asset.clone());

        if let Err(cleanup_error) = self.cleanup_old_backups(&asset.track_id) {
            warn!("Failed to clean up old backups: {}", cleanup_error);
        }
        Ok(())
    }

    fn load_path(&mut self, track_id: &str) -> Result<Option<PathAsset>, MapperError> {
        if track_id.is_empty() {
            return Err(MapperError::InvalidUserInput {
                field: "track_id".to_string(),
                reason: "Track id cannot be empty".to_string(),
            });
        }

        let key = normalize_track_id(track_id);
        if let Some(asset) = self.cache.get(&key) {
            debug!("Found track map in cache for {}", track_id);
            return Ok(Some(asset.clone()));
        }

        let file_path = self.file_path_for_track(track_id);
        if !file_path.exists() {
            debug!("No track map file for {}", track_id);
            return Ok(None);
        }

        let asset = match self.attempt_load_from_file(&file_path) {
            Ok(asset) => asset,
            Err(e) => {
                warn!("Failed to load track map for {}: {}", track_id, e);
                self.attempt_load_from_backup(track_id)?
            }
        };
        self.cache.insert(key, asset.clone());
        Ok(Some(asset))
    }

    fn list_available_tracks(&self) -> Result<Vec<String>, MapperError> {
        let entries =
            fs::read_dir(&self.storage_path).map_err(|e| MapperError::FileOperationError {
                operation: "list_tracks".to_string(),
                reason: format!("Cannot read directory: {}", e),
            })?;

        let mut tracks = Vec::new();
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                match self.attempt_load_from_file(&path) {
                    Ok(asset) => tracks.push(asset.track_id),
                    Err(_) => {
                        // fall back to the file name for unreadable maps
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            tracks.push(stem.to_string());
                        }
                    }
                }
            }
        }

        tracks.sort();
        Ok(tracks)
    }

    fn delete_path(&mut self, track_id: &str) -> Result<(), MapperError> {
        self.cache.remove(&normalize_track_id(track_id));
        let file_path = self.file_path_for_track(track_id);
        if file_path.exists() {
            fs::remove_file(&file_path).map_err(|e| MapperError::FileOperationError {
                operation: "delete_track_map".to_string(),
                reason: format!("Failed to remove {:?}: {}", file_path, e),
            })?;
        }
        Ok(())
    }

    fn path_exists(&self, track_id: &str) -> Result<bool, MapperError> {
        Ok(self.file_path_for_track(track_id).exists())
    }
}

/// In-memory track map storage, keyed by normalized track id
#[derive(Default)]
pub struct MemoryPathStore {
    assets: HashMap<String, PathAsset>,
    saves: usize,
}

impl MemoryPathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves, handy to assert on persistence requests
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl PathStore for MemoryPathStore {
    fn save_path(&mut self, asset: &PathAsset) -> Result<(), MapperError> {
        validate_for_save(asset)?;
        self.assets
            .insert(normalize_track_id(&asset.track_id), asset.clone());
        self.saves += 1;
        Ok(())
    }

    fn load_path(&mut self, track_id: &str) -> Result<Option<PathAsset>, MapperError> {
        Ok(self.assets.get(&normalize_track_id(track_id)).cloned())
    }

    fn list_available_tracks(&self) -> Result<Vec<String>, MapperError> {
        let mut tracks: Vec<String> = self
            .assets
            .values()
            .map(|asset| asset.track_id.clone())
            .collect();
        tracks.sort();
        Ok(tracks)
    }

    fn delete_path(&mut self, track_id: &str) -> Result<(), MapperError> {
        self.assets.remove(&normalize_track_id(track_id));
        Ok(())
    }

    fn path_exists(&self, track_id: &str) -> Result<bool, MapperError> {
        Ok(self.assets.contains_key(&normalize_track_id(track_id)))
    }
}
