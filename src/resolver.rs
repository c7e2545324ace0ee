//! Flat, lockfile-free dependency resolution.
//!
//! Generalizes the teacher's `resolve::Graph::append` (DashMap-guarded
//! relations, recursive fan-out) to the simpler shape described in
//! `original_source/src/zepo/commands/InstallCommand.cpp`'s
//! `PackageInstallingContext::addRequirement`: no persisted graph, just a
//! flat list of `PackageSelect` built up as requirements are walked.
//! Range compilation is cached per expression, mirroring
//! `PackageInstallingContext::getRange`'s `versionRangeCaches_`.

use std::sync::Arc;

use async_recursion::async_recursion;
use color_eyre::eyre::Result;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::ZepoError;
use crate::range::Range;
use crate::registry;

#[derive(Debug, Clone)]
pub struct PackageSelect {
    pub source: String,
    pub name: String,
    pub required: String,
    pub selected: String,
    pub tarball: String,
}

pub struct Resolver {
    config: Config,
    range_cache: DashMap<String, Range>,
    seen: DashMap<(String, String), ()>,
    selected: Arc<Mutex<Vec<PackageSelect>>>,
}

fn is_unsupported_source(version_expr: &str) -> bool {
    version_expr.starts_with("file:")
        || version_expr.starts_with("git+")
        || version_expr.starts_with("git:")
        || version_expr.starts_with("http:")
        || version_expr.starts_with("https:")
}

impl Resolver {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            range_cache: DashMap::new(),
            seen: DashMap::new(),
            selected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn compile_range(&self, expr: &str) -> Result<Range> {
        if let Some(cached) = self.range_cache.get(expr) {
            return Ok(cached.clone());
        }

        let range = Range::parse(expr)?;
        self.range_cache.insert(expr.to_string(), range.clone());
        Ok(range)
    }

    /// Resolves `name`'s requirement under `source` (the requiring package,
    /// or the root manifest's name) at `version_expr`, recursing into its
    /// transitive dependencies. `file:`/`git+`/`git:`/`http(s):` sources are
    /// accepted and silently skipped — this system does not vendor or clone
    /// them, matching the original's fallthrough no-op branches.
    #[async_recursion]
    pub async fn add_requirement(
        &self,
        source: String,
        name: String,
        version_expr: String,
    ) -> Result<()> {
        if is_unsupported_source(&version_expr) {
            return Ok(());
        }

        let range = self.compile_range(&version_expr)?;

        let info = registry::fetch_metadata(&self.config, &name).await?;
        let sorted = info.sorted_versions()?;

        let (version, record) = sorted
            .iter()
            .rev()
            .find(|(v, _)| range.satisfies(v))
            .ok_or_else(|| ZepoError::NoMatchingVersion {
                name: name.clone(),
                expression: version_expr.clone(),
            })?;

        let dedup_key = (name.clone(), version.to_string());
        if self.seen.insert(dedup_key, ()).is_some() {
            return Ok(());
        }

        {
            let mut selected = self.selected.lock().await;
            selected.push(PackageSelect {
                source,
                name: name.clone(),
                required: version_expr,
                selected: version.to_string(),
                tarball: record.dist.tarball.clone(),
            });
        }

        let dependencies: Vec<(String, String)> = record
            .dependencies
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect();

        futures::future::try_join_all(dependencies.into_iter().map(|(dep_name, dep_version)| {
            let name = name.clone();
            async move { self.add_requirement(name, dep_name, dep_version).await }
        }))
        .await?;

        Ok(())
    }

    pub async fn into_selections(self) -> Vec<PackageSelect> {
        Arc::try_unwrap(self.selected)
            .expect("no outstanding references when resolution completes")
            .into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_unsupported_sources() {
        assert!(is_unsupported_source("file:../local"));
        assert!(is_unsupported_source("git+ssh://example.com/repo.git"));
        assert!(is_unsupported_source("git:example.com/repo.git"));
        assert!(is_unsupported_source("http://example.com/pkg.tgz"));
        assert!(is_unsupported_source("https://example.com/pkg.tgz"));
        assert!(!is_unsupported_source("^1.2.3"));
    }
}
