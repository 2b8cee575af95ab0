//! On-disk storage for fetched room data
//!
//! Everything the tools write lives under a per-room directory (see
//! [`layout`]). Files that other runs depend on (event batches and the
//! resume checkpoint) are written with [`write_atomic`]: a temporary
//! sibling is written, synced and renamed over the destination.

pub mod error;
pub mod layout;

pub use error::{StorageError, StorageResult};
pub use layout::{artifact_file_name, is_artifact, room_dir_name, RoomStorage};

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Parsed contents of a newline-delimited JSON file
#[derive(Debug)]
pub struct NdjsonContents<T> {
    pub items: Vec<T>,
    /// Non-blank lines that failed to parse
    pub malformed: usize,
}

/// Milliseconds since the unix epoch, used to stamp output files
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Write `data` to `path`, creating parent directories first.
///
/// The bytes are synced to disk before the rename, so once this returns the
/// file is either fully present or untouched.
pub async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }

    let temp_path = temp_sibling(path);
    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| StorageError::io(&temp_path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| StorageError::io(&temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| StorageError::io(path, e))?;

    Ok(())
}

/// Write one entry per line, each terminated by `\n`.
pub async fn write_lines<I, S>(path: &Path, lines: I) -> StorageResult<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut content = String::new();
    let mut count = 0;
    for line in lines {
        content.push_str(line.as_ref());
        content.push('\n');
        count += 1;
    }
    write_atomic(path, content.as_bytes()).await?;
    Ok(count)
}

/// List files in `dir` accepted by `filter`, sorted by name.
pub async fn list_files<F>(dir: &Path, filter: F) -> StorageResult<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    if !dir.exists() {
        return Err(StorageError::not_found(dir.display()));
    }

    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))?;
    let mut files = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::io(dir, e))?
    {
        let path = entry.path();
        if path.is_file() && filter(&path) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Read a newline-delimited JSON file. Lines that do not parse as `T` are
/// logged and counted instead of failing the whole file.
pub async fn read_ndjson<T: DeserializeOwned>(path: &Path) -> StorageResult<NdjsonContents<T>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;

    let mut items = Vec::new();
    let mut malformed = 0;
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!("Skipping malformed line {} of {}: {}", index + 1, path.display(), e);
                malformed += 1;
            }
        }
    }

    Ok(NdjsonContents { items, malformed })
}

/// Read the non-blank lines of a text file, trimmed
pub async fn read_lines(path: &Path) -> StorageResult<Vec<String>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
