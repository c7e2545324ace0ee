//! Download-then-extract install pipeline.
//!
//! Grounded in `original_source/src/zepo/commands/InstallCommand.cpp::resolveRequirements`:
//! download is skipped if the tarball already exists under `downloads/`,
//! extraction is skipped if `packages/<name>/<version>/zepo-installation.lock`
//! already exists, and the lock is created only after a successful extract.
//! Concurrency follows the teacher's `plan.rs::execute_plan`
//! (`futures::try_join_all` over per-item `tokio::spawn`).

use futures::future::try_join_all;
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::error::Result as ZepoResult;
use crate::extract;
use crate::paths::app_paths;
use crate::progress::{log_progress, log_verbose};
use crate::registry;
use crate::resolver::PackageSelect;

fn tarball_file_name(tarball_url: &str) -> String {
    tarball_url
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(tarball_url)
        .to_string()
}

#[tracing::instrument(skip(config))]
async fn download_one(config: &Config, select: &PackageSelect) -> ZepoResult<std::path::PathBuf> {
    let paths = app_paths();
    let download_path = paths.downloads.join(tarball_file_name(&select.tarball));

    if tokio::fs::metadata(&download_path).await.is_ok() {
        log_verbose(&format!(
            "skipped downloading {}@{} (already present)",
            select.name, select.selected
        ));
        return Ok(download_path);
    }

    log_verbose(&format!(
        "downloading {}@{} from {}",
        select.name, select.selected, select.tarball
    ));

    let mut response = registry::download_tarball(config, &select.tarball).await?;

    let tmp_path = download_path.with_extension("part");
    let mut file = tokio::fs::File::create(&tmp_path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, &download_path).await?;

    Ok(download_path)
}

#[tracing::instrument(skip(config))]
async fn install_one(config: Config, select: PackageSelect) -> ZepoResult<()> {
    let paths = app_paths();

    let download_path = download_one(&config, &select).await?;

    let package_dir = paths.packages.join(&select.name).join(&select.selected);
    let lock_path = package_dir.join("zepo-installation.lock");

    if tokio::fs::metadata(&lock_path).await.is_ok() {
        log_verbose(&format!(
            "{}@{} already installed",
            select.name, select.selected
        ));
        return Ok(());
    }

    extract::extract_tarball(&download_path, &package_dir).await?;

    let tmp_lock = package_dir.join("zepo-installation.lock.tmp");
    tokio::fs::write(&tmp_lock, b"").await?;
    tokio::fs::rename(&tmp_lock, &lock_path).await?;

    log_progress(&format!("installed {}@{}", select.name, select.selected));

    Ok(())
}

/// Installs every resolved package selection concurrently.
pub async fn install_all(config: Config, selections: Vec<PackageSelect>) -> ZepoResult<()> {
    try_join_all(selections.into_iter().map(|select| {
        let config = config.clone();
        async move {
            tokio::spawn(async move { install_one(config, select).await })
                .await
                .expect("install task panicked")
        }
    }))
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_file_name_from_tarball_url() {
        assert_eq!(
            tarball_file_name("https://registry.npmjs.org/left-pad/-/left-pad-1.3.0.tgz"),
            "left-pad-1.3.0.tgz"
        );
    }
}
