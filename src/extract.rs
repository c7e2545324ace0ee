//! Gzip + tar extraction with path-traversal protection.
//!
//! Grounded in the teacher's `plan.rs::download_package` (gzip streaming
//! pipeline: `BufReader` → `GzipDecoder` → `tokio_tar::Archive`) and
//! `original_source/src/zepo/commands/InstallCommand.cpp::resolveRequirements`,
//! which downloads a tarball to disk and decompresses it as a separate,
//! independently-skippable step (`zepo-installation.lock`). Unlike the
//! teacher, which calls `archive.unpack` directly, entries are iterated one
//! at a time so each entry's path can be validated with `scoped_join` before
//! touching the filesystem — npm tarballs are untrusted input and a
//! malicious `../../etc/passwd` entry must not escape the destination root.

use std::path::Path;

use async_compression::tokio::bufread::GzipDecoder;
use color_eyre::eyre::Result;
use futures::TryStreamExt;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_tar::Archive;

use crate::error::ZepoError;
use crate::scoped_path::scoped_join;

#[tracing::instrument]
pub async fn extract_tarball(archive_path: &Path, destination: &Path) -> Result<()> {
    tokio::fs::create_dir_all(destination).await?;

    let file = File::open(archive_path)
        .await
        .map_err(|e| ZepoError::Extract {
            entry: archive_path.display().to_string(),
            cause: e.to_string(),
        })?;
    let reader = BufReader::with_capacity(1024 * 1024, file);
    let reader = GzipDecoder::new(reader);

    let mut archive = Archive::new(reader);
    let mut entries = archive.entries().map_err(|e| ZepoError::Extract {
        entry: "<archive>".to_string(),
        cause: e.to_string(),
    })?;

    while let Some(mut entry) = entries.try_next().await.map_err(|e| ZepoError::Extract {
        entry: "<stream>".to_string(),
        cause: e.to_string(),
    })? {
        let entry_path = entry
            .path()
            .map_err(|e| ZepoError::Extract {
                entry: "<unknown>".to_string(),
                cause: e.to_string(),
            })?
            .into_owned();

        let target = scoped_join(destination, &entry_path).map_err(|e| ZepoError::Extract {
            entry: entry_path.display().to_string(),
            cause: e.to_string(),
        })?;

        if entry.header().entry_type().is_dir() {
            tokio::fs::create_dir_all(&target).await?;
            continue;
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut buf = Vec::new();
        entry
            .read_to_end(&mut buf)
            .await
            .map_err(|e| ZepoError::Extract {
                entry: entry_path.display().to_string(),
                cause: e.to_string(),
            })?;

        tokio::fs::write(&target, &buf)
            .await
            .map_err(|e| ZepoError::Extract {
                entry: entry_path.display().to_string(),
                cause: e.to_string(),
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoped_path::scoped_join;

    #[test]
    fn scoped_join_rejects_escape_attempts() {
        let tmp = tempfile_root();
        let escaped = scoped_join(&tmp, "../../etc/passwd").unwrap();
        assert!(escaped.starts_with(&tmp));
    }

    fn tempfile_root() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("zepo-extract-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
