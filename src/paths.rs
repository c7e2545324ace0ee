//! Process-wide application directories, initialized once at startup.
//!
//! Grounded in the teacher's `ARGS: Lazy<Args>` global (`main.rs`) and
//! `original_source/src/zepo/Global.hpp`'s `applicationPaths` singleton
//! (`downloadsPath`, `packagesPath`, `generatorsPath`, `targetsPath`).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use color_eyre::eyre::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub downloads: PathBuf,
    pub packages: PathBuf,
    pub builds: PathBuf,
    pub generators: PathBuf,
    pub targets: PathBuf,
}

static APP_PATHS: OnceLock<AppPaths> = OnceLock::new();

impl AppPaths {
    fn under(root: &Path) -> Self {
        Self {
            downloads: root.join("downloads"),
            packages: root.join("packages"),
            builds: root.join("builds"),
            generators: root.join("generators"),
            targets: root.join("targets"),
        }
    }

    async fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.downloads,
            &self.packages,
            &self.builds,
            &self.generators,
            &self.targets,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Initializes the process-wide paths under `root` (typically `--cwd` joined
/// with `.zepo`), creating the directories if missing. Must be called
/// exactly once, before `app_paths()` is used.
pub async fn init(root: &Path) -> Result<()> {
    let paths = AppPaths::under(root);
    paths.ensure_dirs().await?;
    APP_PATHS
        .set(paths)
        .map_err(|_| color_eyre::eyre::eyre!("AppPaths already initialized"))?;
    Ok(())
}

/// Accesses the process-wide paths. Panics if `init` has not run yet, which
/// would be a startup-ordering bug rather than a recoverable condition.
pub fn app_paths() -> &'static AppPaths {
    APP_PATHS.get().expect("AppPaths::init was not called")
}
