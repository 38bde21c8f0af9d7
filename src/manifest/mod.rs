//! Manifest documents and the patch chain
//!
//! Two documents drive an update:
//! - the **version pointer** names the latest version and the URL of its manifest
//! - each **patch manifest** names its version, the host serving its files,
//!   the files it changes and the manifest of the version before it
//!
//! [`ManifestDecoder`] turns document text into these types;
//! [`JsonManifestDecoder`] is the default. The [`resolver`] walks the chain.

pub mod resolver;

pub use resolver::{UpdatePlan, VersionBatch, resolve};

use crate::error::{Error, Result};
use crate::version::Version;
use serde::Deserialize;

/// Decoded version pointer document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionPointer {
    /// Newest version published
    pub latest_version: Version,
    /// URL of the newest patch manifest
    pub chain_entry_url: String,
}

/// Decoded patch manifest document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Version this manifest brings the application to
    pub version: Version,
    /// Base URL the files are served from
    pub host: String,
    /// Files changed by this version, relative to the app root
    pub files: Vec<String>,
    /// Manifest of the previous version in the chain
    pub next_manifest_url: Option<String>,
}

impl ManifestEntry {
    /// Download URL of one of this manifest's files
    ///
    /// The host and path are concatenated, inserting a single `/` only when
    /// neither side provides one. Each path segment is percent-encoded.
    pub fn file_url(&self, path: &str) -> String {
        let encoded = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        match (self.host.ends_with('/'), encoded.starts_with('/')) {
            (true, true) => format!("{}{}", self.host, &encoded[1..]),
            (false, false) if !self.host.is_empty() => format!("{}/{}", self.host, encoded),
            _ => format!("{}{}", self.host, encoded),
        }
    }
}

/// Capability to decode manifest documents
pub trait ManifestDecoder: Send + Sync {
    /// Decode a version pointer document
    fn decode_pointer(&self, text: &str) -> Result<VersionPointer>;

    /// Decode a patch manifest document
    fn decode_manifest(&self, text: &str) -> Result<ManifestEntry>;
}

/// JSON decoder for the published documents
///
/// Field names follow the documents published for existing applications
/// (`LastestVersion`, `PatchUrl`, `Version`, `Host`, `Files`,
/// `PatchRequiredUrl`); snake_case aliases are accepted as well.
///
/// ```
/// use app_patcher::manifest::{JsonManifestDecoder, ManifestDecoder};
///
/// let entry = JsonManifestDecoder
///     .decode_manifest(r#"{"Version":"1.1","Host":"https://cdn/1.1/","Files":["app.dll"]}"#)
///     .unwrap();
/// assert_eq!(entry.file_url("app.dll"), "https://cdn/1.1/app.dll");
/// assert!(entry.next_manifest_url.is_none());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonManifestDecoder;

#[derive(Deserialize)]
struct PointerDocument {
    #[serde(rename = "LastestVersion", alias = "LatestVersion", alias = "latest_version")]
    latest_version: String,
    #[serde(rename = "PatchUrl", alias = "chain_entry_url")]
    patch_url: String,
}

#[derive(Deserialize)]
struct ManifestDocument {
    #[serde(rename = "Version", alias = "version")]
    version: String,
    #[serde(rename = "Host", alias = "host", default)]
    host: String,
    #[serde(rename = "Files", alias = "files", default)]
    files: Vec<String>,
    #[serde(
        rename = "PatchRequiredUrl",
        alias = "next_manifest_url",
        default
    )]
    patch_required_url: Option<String>,
}

fn decode_error(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Decode(format!("invalid {what}: {e}"))
}

impl ManifestDecoder for JsonManifestDecoder {
    fn decode_pointer(&self, text: &str) -> Result<VersionPointer> {
        let doc: PointerDocument =
            serde_json::from_str(text).map_err(|e| decode_error("version pointer", e))?;
        let latest_version = Version::parse(&doc.latest_version)
            .map_err(|e| decode_error("version pointer", e))?;

        if doc.patch_url.trim().is_empty() {
            return Err(Error::Decode(
                "invalid version pointer: chain entry URL is empty".to_string(),
            ));
        }

        Ok(VersionPointer {
            latest_version,
            chain_entry_url: doc.patch_url,
        })
    }

    fn decode_manifest(&self, text: &str) -> Result<ManifestEntry> {
        let doc: ManifestDocument =
            serde_json::from_str(text).map_err(|e| decode_error("patch manifest", e))?;
        let version =
            Version::parse(&doc.version).map_err(|e| decode_error("patch manifest", e))?;

        Ok(ManifestEntry {
            version,
            host: doc.host,
            files: doc.files,
            next_manifest_url: doc
                .patch_required_url
                .filter(|url| !url.trim().is_empty()),
        })
    }
}
