use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::immich::AssetSource;

/// Downloads the original bytes of `asset_id` and replaces the file at `path`.
///
/// Returns the number of bytes written.
pub async fn download_to<S>(source: &S, asset_id: &str, path: &Path) -> Result<usize>
where
    S: AssetSource + Sync,
{
    if asset_id.trim().is_empty() {
        return Err(Error::EmptyAssetId);
    }
    let bytes = source.download_original(asset_id).await?;
    write_atomically(path, &bytes).await?;
    Ok(bytes.len())
}

/// Writes into a sibling `.part` file and renames it over `path`, so readers
/// see either the old image or the complete new one.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| Error::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let staging = staging_path(path);
    if let Err(source) = tokio::fs::write(&staging, bytes).await {
        // may be partially written
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(Error::Write {
            path: staging,
            source,
        });
    }

    if let Err(source) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(Error::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    debug!(path = %path.display(), bytes = bytes.len(), "image file replaced");
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("frame"));
    name.push(".part");
    path.with_file_name(name)
}
