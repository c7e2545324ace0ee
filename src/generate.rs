//! `zepo generate cmake` — writes one `<export-name>-config.cmake` file per
//! dependency by running the `generators/cmake.js` script against each
//! dependency's build report.
//!
//! Grounded in `original_source/src/zepo/commands/GenerateCommand.cpp`:
//! `GenerateCmdFlags`/`scanFlags` for the flag surface, `findDefaultExportName`/
//! `findExportName`/`findExportNames` for the per-dependency export-name
//! resolution, `CMakeGenerateContext::findBuildOptions` for target-file
//! loading, and `generateCMakePackage`/`generateCMakeDirectory` for the
//! build-then-generate-then-write pipeline. The original drives all of this
//! through coroutines sharing one `JSContext`; since `rquickjs`'s `Context`
//! is likewise not safely callable from more than one place at a time, this
//! port walks dependencies sequentially instead of fanning them out.

use std::collections::BTreeMap;
use std::path::PathBuf;

use color_eyre::eyre::{eyre, Result};

use crate::build::{self, BuildOptions};
use crate::manifest::Manifest;
use crate::paths::app_paths;
use crate::progress::log_progress;
use crate::range::Range;
use crate::sandbox::Sandbox;

#[derive(Debug, Clone)]
pub struct GenerateCmdFlags {
    pub target: Option<String>,
    pub system: Option<String>,
    pub arch: Option<String>,
    pub output: PathBuf,
    pub dev: bool,
}

/// Parses `-A/--arch`, `-D/--dev`, `-o/--output`, `-S/--system`,
/// `-T/--target`, matching `GenerateCommand.cpp::scanFlags`.
pub fn scan_flags(args: &[String], default_output: PathBuf) -> GenerateCmdFlags {
    let mut flags = GenerateCmdFlags {
        target: None,
        system: None,
        arch: None,
        output: default_output,
        dev: false,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-o" | "--output" => {
                if let Some(value) = iter.next() {
                    flags.output = PathBuf::from(value);
                }
            }
            "-D" | "--dev" => flags.dev = true,
            "-A" | "--arch" => {
                if let Some(value) = iter.next() {
                    flags.arch = Some(value.clone());
                }
            }
            "-S" | "--system" => {
                if let Some(value) = iter.next() {
                    flags.system = Some(value.clone());
                }
            }
            "-T" | "--target" => {
                if let Some(value) = iter.next() {
                    flags.target = Some(value.clone());
                }
            }
            _ => {}
        }
    }

    flags
}

fn find_default_export_name(package_name: &str) -> String {
    package_name
        .rsplit('/')
        .next()
        .unwrap_or(package_name)
        .to_string()
}

fn find_export_name(package_name: &str, manifest: &Manifest) -> String {
    manifest
        .zepo_options
        .as_ref()
        .and_then(|opts| opts.package_names.as_ref())
        .and_then(|names| names.get(package_name))
        .cloned()
        .unwrap_or_else(|| find_default_export_name(package_name))
}

fn find_export_names(manifest: &Manifest, flags: &GenerateCmdFlags) -> BTreeMap<String, String> {
    let mut export_names = BTreeMap::new();

    for name in manifest.dependencies.keys() {
        export_names
            .entry(name.clone())
            .or_insert_with(|| find_export_name(name, manifest));
    }

    if flags.dev {
        for name in manifest.dev_dependencies.keys() {
            export_names
                .entry(name.clone())
                .or_insert_with(|| find_export_name(name, manifest));
        }
    }

    export_names
}

fn find_requirement_version_range(manifest: &Manifest, package_name: &str) -> Result<Range> {
    let expr = manifest
        .dependencies
        .get(package_name)
        .or_else(|| manifest.dev_dependencies.get(package_name))
        .ok_or_else(|| eyre!("failed to find a version range for package \"{package_name}\""))?;

    Ok(Range::parse(expr)?)
}

/// Resolves target architecture/system, either from a target file under
/// `targets/<name>.js` (which overrides `--arch`/`--system`) or directly from
/// the CLI flags, matching `CMakeGenerateContext::findBuildOptions`.
fn find_build_options(sandbox: &Sandbox, flags: &GenerateCmdFlags) -> Result<BuildOptions> {
    if let Some(target) = &flags.target {
        let target_file = app_paths().targets.join(format!("{target}.js"));
        if !target_file.exists() {
            return Err(eyre!("failed to find target \"{target}\""));
        }

        return sandbox.context.with(|ctx| -> Result<BuildOptions> {
            let target_object = sandbox.load_module(&ctx, &target_file)?;

            let system: Option<String> = target_object.get("system").ok();
            let arch: Option<String> = target_object.get("arch").ok();

            Ok(BuildOptions {
                target_system: system,
                target_arch: arch,
            })
        });
    }

    Ok(BuildOptions {
        target_system: flags.system.clone(),
        target_arch: flags.arch.clone(),
    })
}

/// Builds `package_name` and, if it reports anything, runs `generators/cmake.js`
/// against the report and writes `<output>/<export-name>-config.cmake`.
fn generate_cmake_package(
    sandbox: &Sandbox,
    manifest: &Manifest,
    flags: &GenerateCmdFlags,
    export_names: &BTreeMap<String, String>,
    build_options: &BuildOptions,
    package_name: &str,
) -> Result<()> {
    let export_name = export_names
        .get(package_name)
        .cloned()
        .unwrap_or_else(|| find_default_export_name(package_name));

    let range = find_requirement_version_range(manifest, package_name)?;
    let report = build::build_package(sandbox, package_name, &range, build_options)?;

    let Some(report) = report else {
        return Ok(());
    };

    log_progress(&format!(
        "generating CMake script for \"{package_name}\" with export name \"{export_name}\""
    ));

    let generator_path = app_paths().generators.join("cmake.js");
    let output_path = flags.output.join(format!("{export_name}-config.cmake"));

    let script = sandbox.context.with(|ctx| -> Result<String> {
        let module = sandbox.load_module(&ctx, &generator_path)?;
        let generate_function: rquickjs::Function = module
            .get("generate")
            .map_err(|e| eyre!("generators/cmake.js does not export \"generate\": {e}"))?;

        let report_value = sandbox.push_record(&ctx, &report)?;
        let export_names_value = sandbox.push_record(&ctx, export_names)?;

        let call_result: rquickjs::Value = generate_function
            .call((report_value, export_names_value, package_name.to_string()))
            .map_err(|e| eyre!("generate() threw: {e}"))?;

        let settled = sandbox.try_await_promise(call_result)?;
        settled
            .as_string()
            .map(|s| s.to_string().map_err(|e| eyre!("{e}")))
            .unwrap_or_else(|| Err(eyre!("generate() must return a string")))
    })?;

    std::fs::write(&output_path, script)?;

    Ok(())
}

/// Orchestrates `zepo generate cmake`: scans flags, resolves a build option
/// set, and generates a CMake config for every dependency (and, with
/// `--dev`, every dev dependency), matching
/// `CMakeGenerateContext::generateCMakeDirectory`.
pub async fn generate_cmake_directory(manifest: &Manifest, args: &[String]) -> Result<()> {
    let default_output = std::env::current_dir()?.join("zepo_packages");
    let flags = scan_flags(args, default_output);
    let export_names = find_export_names(manifest, &flags);

    let sandbox = Sandbox::new()?;
    let build_options = find_build_options(&sandbox, &flags)?;

    tokio::fs::create_dir_all(&flags.output).await?;

    let mut package_names: Vec<String> = manifest.dependencies.keys().cloned().collect();
    if flags.dev {
        package_names.extend(manifest.dev_dependencies.keys().cloned());
    }

    for package_name in package_names {
        generate_cmake_package(
            &sandbox,
            manifest,
            &flags,
            &export_names,
            &build_options,
            &package_name,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_flags_parses_all_options() {
        let args = vec![
            "-T".to_string(),
            "esp32".to_string(),
            "-D".to_string(),
            "-o".to_string(),
            "out".to_string(),
        ];
        let flags = scan_flags(&args, PathBuf::from("default"));
        assert_eq!(flags.target.as_deref(), Some("esp32"));
        assert!(flags.dev);
        assert_eq!(flags.output, PathBuf::from("out"));
    }

    #[test]
    fn default_export_name_uses_last_path_segment() {
        assert_eq!(find_default_export_name("@scope/widget"), "widget");
        assert_eq!(find_default_export_name("widget"), "widget");
    }

    #[test]
    fn export_name_honors_zepo_package_names_override() {
        let manifest = Manifest::parse(
            r#"{"name":"demo","version":"1.0.0","zepo":{"packageNames":{"@scope/widget":"widget-alias"}}}"#,
        )
        .unwrap();
        assert_eq!(find_export_name("@scope/widget", &manifest), "widget-alias");
        assert_eq!(find_export_name("other", &manifest), "other");
    }

    #[test]
    fn requirement_range_checks_dev_dependencies_too() {
        let manifest = Manifest::parse(
            r#"{"name":"demo","version":"1.0.0","devDependencies":{"widget":"^1.0.0"}}"#,
        )
        .unwrap();
        assert!(find_requirement_version_range(&manifest, "widget").is_ok());
        assert!(find_requirement_version_range(&manifest, "missing").is_err());
    }
}
