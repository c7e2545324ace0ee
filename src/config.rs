//! Process-wide configuration, read once from `config.json` colocated with
//! the executable.
//!
//! Narrowed from the teacher's multi-registry `Vec<Registry>` shape to a
//! single registry, grounded in `original_source/src/zepo/Configuration.hpp`
//! (`struct Configuration { std::string registry; }`).

use std::path::PathBuf;

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(default)]
pub struct Config {
    pub registry: String,
    pub auth_username: Option<String>,
    pub auth_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: "https://registry.npmjs.org".to_string(),
            auth_username: None,
            auth_password: None,
        }
    }
}

fn config_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate current executable")?;
    let dir = exe
        .parent()
        .context("executable path has no parent directory")?;
    Ok(dir.join("config.json"))
}

#[tracing::instrument]
pub async fn read_config() -> Result<Config> {
    let path = config_path()?;

    match read_to_string(&path).await {
        Ok(contents) => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_npm_registry() {
        assert_eq!(Config::default().registry, "https://registry.npmjs.org");
    }
}
