use crate::error::OutputError;
use crate::model::OrchestrationMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Persistence boundary for finished maps. A map is written once and never
/// overwritten.
pub trait MapStore: Send + Sync {
    /// Persist the map, returning where it landed
    fn store(&self, map: &OrchestrationMap) -> Result<PathBuf, OutputError>;
}

/// On-disk envelope around a stored map
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredMap {
    pub stored_at: DateTime<Utc>,
    /// SHA-256 of `map.rendered_text`, hex encoded
    pub rendered_sha256: String,
    pub map: OrchestrationMap,
}

impl StoredMap {
    pub fn new(map: OrchestrationMap) -> Self {
        Self {
            stored_at: Utc::now(),
            rendered_sha256: digest(&map.rendered_text),
            map,
        }
    }

    pub fn is_intact(&self) -> bool {
        self.rendered_sha256 == digest(&self.map.rendered_text)
    }
}

fn digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Writes `<dir>/<message id>.json` and `<dir>/<message id>.txt`
pub struct FileMapStore {
    dir: PathBuf,
}

impl FileMapStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn create_once(path: &Path, message_id: &str) -> Result<File, OutputError> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => OutputError::AlreadyStored(message_id.to_string()),
                _ => OutputError::WriteMap(e),
            })
    }
}

/// Best-effort removal of files this store just created
fn discard(paths: &[&Path]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Could not remove partial map {}: {}", path.display(), e);
        }
    }
}

impl MapStore for FileMapStore {
    fn store(&self, map: &OrchestrationMap) -> Result<PathBuf, OutputError> {
        fs::create_dir_all(&self.dir).map_err(OutputError::CreateDir)?;

        let stem = file_stem(&map.message.id);
        let json_path = self.dir.join(format!("{}.json", stem));
        let text_path = self.dir.join(format!("{}.txt", stem));

        let record = StoredMap::new(map.clone());
        let json = serde_json::to_string_pretty(&record)?;

        // Claim both names before writing so a clash leaves nothing behind
        let mut json_file = Self::create_once(&json_path, &map.message.id)?;
        let mut text_file = match Self::create_once(&text_path, &map.message.id) {
            Ok(file) => file,
            Err(e) => {
                drop(json_file);
                discard(&[&json_path]);
                return Err(e);
            }
        };

        let written = json_file
            .write_all(json.as_bytes())
            .and_then(|()| text_file.write_all(map.rendered_text.as_bytes()));
        if let Err(e) = written {
            drop(json_file);
            drop(text_file);
            discard(&[&json_path, &text_path]);
            return Err(OutputError::WriteMap(e));
        }

        info!("Stored map for {} at {}", map.message.id, json_path.display());
        Ok(json_path)
    }
}

/// Load a map previously written by [`FileMapStore`]
pub fn load_map(path: &Path) -> Result<OrchestrationMap, OutputError> {
    let content = fs::read_to_string(path).map_err(|source| OutputError::ReadMap {
        path: path.to_path_buf(),
        source,
    })?;
    let record: StoredMap = serde_json::from_str(&content)?;
    if !record.is_intact() {
        tracing::warn!(
            "Rendered text of {} does not match its stored digest",
            path.display()
        );
    }
    Ok(record.map)
}

/// Message ids become file names, so keep them to a safe character set
fn file_stem(message_id: &str) -> String {
    let stem: String = message_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "message".to_string()
    } else {
        stem
    }
}
