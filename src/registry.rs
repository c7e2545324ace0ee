//! npm-registry-protocol client: package metadata and tarball retrieval.
//!
//! Grounded in the teacher's `npm.rs::fetch_package` (registry GET +
//! `serde_path_to_error` decoding, `CLIENT_Z` with compression enabled) and
//! `original_source/src/zepo/NpmProtocol.{hpp,cpp}` for the wire shape
//! (`NpmPackageInfo`/`NpmPackageVersion`/`NpmPackageDist`) and basic-auth
//! handling (`configureNpmAuth`).

use std::collections::BTreeMap;

use color_eyre::eyre::Result;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ZepoError;
use crate::version::Version;

static CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .brotli(true)
        .gzip(true)
        .deflate(true)
        .build()
        .expect("failed to build HTTP client")
});

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Dist {
    pub shasum: String,
    pub tarball: String,
    pub integrity: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct VersionRecord {
    pub version: String,
    pub dist: Dist,
    pub dependencies: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PackageInfo {
    pub name: String,
    pub versions: IndexMap<String, VersionRecord>,
}

impl PackageInfo {
    /// Versions sorted ascending by parsed semantic version. The wire order
    /// of a registry's `versions` map is not trusted (npm registries are not
    /// contractually required to emit it sorted).
    pub fn sorted_versions(&self) -> Result<Vec<(Version, &VersionRecord)>> {
        let mut parsed = Vec::with_capacity(self.versions.len());
        for record in self.versions.values() {
            parsed.push((Version::parse(&record.version)?, record));
        }
        parsed.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(parsed)
    }
}

fn apply_auth(builder: RequestBuilder, config: &Config) -> RequestBuilder {
    if config.auth_username.is_none() && config.auth_password.is_none() {
        return builder;
    }
    builder.basic_auth(
        config.auth_username.clone().unwrap_or_default(),
        config.auth_password.clone(),
    )
}

#[tracing::instrument(skip(config))]
pub async fn fetch_metadata(config: &Config, name: &str) -> Result<PackageInfo> {
    let url = format!("{}/{name}", config.registry.trim_end_matches('/'));

    let response = apply_auth(CLIENT.get(&url), config)
        .send()
        .await
        .map_err(|e| ZepoError::Registry {
            url: url.clone(),
            cause: e.to_string(),
        })?
        .error_for_status()
        .map_err(|e| ZepoError::Registry {
            url: url.clone(),
            cause: e.to_string(),
        })?;

    let bytes = response.bytes().await.map_err(|e| ZepoError::Registry {
        url: url.clone(),
        cause: e.to_string(),
    })?;

    let jd = &mut serde_json::Deserializer::from_slice(&bytes);
    serde_path_to_error::deserialize(jd).map_err(|e| {
        ZepoError::Registry {
            url,
            cause: e.to_string(),
        }
        .into()
    })
}

/// Starts a streaming GET of a tarball. The caller drives decompression and
/// extraction directly off the response body (see `extract.rs`) rather than
/// buffering the whole archive in memory.
#[tracing::instrument(skip(config))]
pub async fn download_tarball(config: &Config, url: &str) -> Result<Response> {
    let response = apply_auth(CLIENT.get(url), config)
        .send()
        .await
        .map_err(|e| ZepoError::Download {
            url: url.to_string(),
            cause: e.to_string(),
        })?
        .error_for_status()
        .map_err(|e| ZepoError::Download {
            url: url.to_string(),
            cause: e.to_string(),
        })?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: &str) -> VersionRecord {
        VersionRecord {
            version: version.to_string(),
            dist: Dist::default(),
            dependencies: BTreeMap::new(),
        }
    }

    #[test]
    fn sorts_versions_ascending_regardless_of_wire_order() {
        let mut versions = IndexMap::new();
        versions.insert("2.0.0".to_string(), record("2.0.0"));
        versions.insert("1.0.0".to_string(), record("1.0.0"));
        versions.insert("1.5.0".to_string(), record("1.5.0"));

        let info = PackageInfo {
            name: "demo".to_string(),
            versions,
        };

        let sorted = info.sorted_versions().unwrap();
        let labels: Vec<String> = sorted.iter().map(|(v, _)| v.to_string()).collect();
        assert_eq!(labels, vec!["1.0.0", "1.5.0", "2.0.0"]);
    }
}
