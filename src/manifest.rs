//! Project-level manifest (`package.json`) and its `zepo`-namespaced
//! extension block.
//!
//! Grounded in `original_source/src/zepo/Manifest.hpp` (`PackageManifest`,
//! `ZepoOptions`, the `"zepo"` rename of `zepoOptions`) and the teacher's
//! `package.rs::Package` for serde conventions (camelCase wire format,
//! `#[serde(default)]` so a manifest missing optional fields still parses).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The `zepo` block inside `package.json`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ZepoOptions {
    pub package_names: Option<BTreeMap<String, String>>,
    pub entry: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,

    #[serde(rename = "zepo")]
    pub zepo_options: Option<ZepoOptions>,

    /// Every other top-level key, preserved verbatim so re-serialization
    /// doesn't lose fields this tool doesn't understand.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    pub fn parse(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// All `dependencies` and (optionally) `devDependencies` as `(name, range)` pairs.
    pub fn requirements(&self, include_dev: bool) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .dependencies
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect();

        if include_dev {
            out.extend(
                self.dev_dependencies
                    .iter()
                    .map(|(n, v)| (n.clone(), v.clone())),
            );
        }

        out
    }

    /// Resolve the entry script for the build sandbox, defaulting to
    /// `zepofile.js` unless overridden by `zepo.entry`.
    pub fn entry_file(&self) -> &str {
        self.zepo_options
            .as_ref()
            .and_then(|opts| opts.entry.as_deref())
            .unwrap_or("zepofile.js")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let manifest = Manifest::parse(r#"{"name":"demo","version":"1.0.0"}"#).unwrap();
        assert_eq!(manifest.name, "demo");
        assert_eq!(manifest.entry_file(), "zepofile.js");
    }

    #[test]
    fn preserves_unknown_top_level_keys() {
        let manifest = Manifest::parse(r#"{"name":"demo","version":"1.0.0","license":"MIT"}"#).unwrap();
        assert_eq!(
            manifest.extra.get("license").and_then(|v| v.as_str()),
            Some("MIT")
        );
    }

    #[test]
    fn zepo_entry_override() {
        let manifest = Manifest::parse(
            r#"{"name":"demo","version":"1.0.0","zepo":{"entry":"custom.js"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.entry_file(), "custom.js");
    }

    #[test]
    fn collects_dependencies_and_optionally_dev() {
        let manifest = Manifest::parse(
            r#"{"name":"demo","version":"1.0.0","dependencies":{"a":"^1.0.0"},"devDependencies":{"b":"^2.0.0"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.requirements(false), vec![("a".to_string(), "^1.0.0".to_string())]);
        let mut with_dev = manifest.requirements(true);
        with_dev.sort();
        assert_eq!(
            with_dev,
            vec![
                ("a".to_string(), "^1.0.0".to_string()),
                ("b".to_string(), "^2.0.0".to_string())
            ]
        );
    }
}
