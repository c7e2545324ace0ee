//! Package-build orchestration: evaluate a package's `zepofile.js` build
//! script and collect its reported output paths.
//!
//! Grounded in `original_source/src/zepo/pkg_manager/Build.cpp`
//! (`resolveZepofile`, `buildPackage` overloads, `reportToAbsolutePaths`)
//! and `BuildOptions.hpp`/`BuildReport.hpp` for the data shapes, including
//! `OutputPathCollection`'s three-shape custom parse (`Interfaces.cpp::PackagePaths::parse`:
//! a JSON array, a single string, or `null`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Context as _, Result};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::error::ZepoError;
use crate::manifest::Manifest;
use crate::paths::app_paths;
use crate::range::Range;
use crate::sandbox::Sandbox;

#[derive(Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    pub target_system: Option<String>,
    pub target_arch: Option<String>,
}

/// A package's build script may report a path collection as a JSON array of
/// strings, a single string, or `null` (treated as empty) — this is the
/// idiomatic-serde realization of the "custom parse member preempts the
/// reflective path" escape hatch.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputPathCollection {
    pub paths: Vec<String>,
}

impl<'de> Deserialize<'de> for OutputPathCollection {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Many(Vec<String>),
            One(String),
        }

        let shape: Option<Shape> = Option::deserialize(deserializer)?;
        Ok(match shape {
            None => OutputPathCollection { paths: vec![] },
            Some(Shape::Many(paths)) => OutputPathCollection { paths },
            Some(Shape::One(path)) => OutputPathCollection { paths: vec![path] },
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BuildReport {
    pub paths: BTreeMap<String, OutputPathCollection>,
    #[serde(rename = "type")]
    pub package_type: String,
}

fn resolve_zepofile(package_root: &Path, manifest: &Manifest) -> Option<PathBuf> {
    let zepofile = package_root.join(manifest.entry_file());
    zepofile.exists().then_some(zepofile)
}

fn report_to_absolute_paths(report: &mut BuildReport, package_root: &Path) {
    for collection in report.paths.values_mut() {
        for path_str in &mut collection.paths {
            let candidate = Path::new(path_str);
            if candidate.is_relative() {
                *path_str = package_root.join(candidate).to_string_lossy().to_string();
            }
        }
    }
}

/// Finds the installed version directory satisfying `range`, mirroring
/// `PkgUtils.cpp::findPackageRoot`'s directory scan.
fn find_installed_version(package_name: &str, range: &Range) -> Result<PathBuf> {
    let versions_dir = app_paths().packages.join(package_name);

    if !versions_dir.is_dir() {
        return Err(eyre!(
            "failed to find package \"{package_name}\", did you forget to `zepo install` it?"
        ));
    }

    for entry in std::fs::read_dir(&versions_dir)
        .with_context(|| format!("failed to read {}", versions_dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        if let Ok(version) = crate::version::Version::parse(&file_name) {
            if range.satisfies(&version) {
                return Ok(entry.path().join("package"));
            }
        }
    }

    Err(ZepoError::NotInstalled {
        name: package_name.to_string(),
        range: format!("{range:?}"),
    }
    .into())
}

/// Runs `build(options)` from a resolved `zepofile.js`, if the file exists
/// and exports a `build` function. Returns `None` when there's nothing to
/// build, matching the original's silent skip.
pub fn build_package_at(
    sandbox: &Sandbox,
    zepofile_path: &Path,
    options: &BuildOptions,
) -> Result<Option<BuildReport>> {
    let result = sandbox.context.with(|ctx| -> Result<Option<BuildReport>> {
        let module = sandbox.load_module(&ctx, zepofile_path)?;

        let build_function: Option<rquickjs::Function> = module.get("build").ok();
        let Some(build_function) = build_function else {
            return Ok(None);
        };

        let options_value = sandbox.push_record(&ctx, options)?;
        let call_result: rquickjs::Value = build_function
            .call((options_value,))
            .map_err(|e| eyre!("build() threw: {e}"))?;

        let settled = sandbox.try_await_promise(call_result)?;
        let report: BuildReport = sandbox.to_record(&ctx, settled)?;

        Ok(Some(report))
    })?;

    Ok(result)
}

/// Builds `package_name`'s installed version matching `range`, rewriting any
/// relative output paths to be absolute against the package root.
pub fn build_package(
    sandbox: &Sandbox,
    package_name: &str,
    range: &Range,
    options: &BuildOptions,
) -> Result<Option<BuildReport>> {
    let package_root = find_installed_version(package_name, range)?;

    let manifest_text = std::fs::read_to_string(package_root.join("package.json"))
        .with_context(|| format!("failed to open manifest for \"{package_name}\""))?;
    let manifest = Manifest::parse(&manifest_text)
        .with_context(|| format!("failed to parse manifest for \"{package_name}\""))?;

    let Some(zepofile_path) = resolve_zepofile(&package_root, &manifest) else {
        return Ok(None);
    };

    let mut report = build_package_at(sandbox, &zepofile_path, options)?;
    if let Some(report) = report.as_mut() {
        report_to_absolute_paths(report, &package_root);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_collection_accepts_array() {
        let parsed: OutputPathCollection = serde_json::from_str(r#"["a.h", "b.h"]"#).unwrap();
        assert_eq!(parsed.paths, vec!["a.h".to_string(), "b.h".to_string()]);
    }

    #[test]
    fn output_path_collection_accepts_single_string() {
        let parsed: OutputPathCollection = serde_json::from_str(r#""include""#).unwrap();
        assert_eq!(parsed.paths, vec!["include".to_string()]);
    }

    #[test]
    fn output_path_collection_accepts_null() {
        let parsed: OutputPathCollection = serde_json::from_str("null").unwrap();
        assert!(parsed.paths.is_empty());
    }

    #[test]
    fn relative_paths_become_absolute_against_package_root() {
        let mut report = BuildReport {
            paths: BTreeMap::from([(
                "include".to_string(),
                OutputPathCollection {
                    paths: vec!["include".to_string()],
                },
            )]),
            package_type: "library".to_string(),
        };

        report_to_absolute_paths(&mut report, Path::new("/pkgs/demo/1.0.0/package"));

        assert_eq!(
            report.paths["include"].paths[0],
            "/pkgs/demo/1.0.0/package/include"
        );
    }
}
