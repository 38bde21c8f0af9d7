//! Patch chain resolution
//!
//! Manifests form a linked list from the newest version back towards older
//! ones. [`resolve`] walks that list from its head until it reaches the
//! installed version, collecting each version's files. A path listed by several
//! versions is only downloaded once, from the version nearest the target.

use super::ManifestDecoder;
use crate::error::{Error, Result};
use crate::file::ResumableFile;
use crate::transfer::TransferSource;
use crate::version::Version;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Component, Path};

/// Files one version contributes to the plan, keyed by relative path
#[derive(Debug)]
pub struct VersionBatch {
    version: Version,
    files: BTreeMap<String, ResumableFile>,
}

impl VersionBatch {
    fn new(version: Version) -> Self {
        Self {
            version,
            files: BTreeMap::new(),
        }
    }

    /// Version this batch brings the application to
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Files still to install, in path order
    pub fn files(&self) -> impl Iterator<Item = &ResumableFile> {
        self.files.values()
    }

    /// Number of files still to install
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether every file has been installed or removed
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up a file by relative path
    pub fn get(&self, path: &str) -> Option<&ResumableFile> {
        self.files.get(path)
    }

    pub(crate) fn get_mut(&mut self, path: &str) -> Option<&mut ResumableFile> {
        self.files.get_mut(path)
    }

    /// Relative paths in install order
    ///
    /// `held_back` is left out; the caller installs it separately.
    pub fn install_order(&self, held_back: Option<&str>) -> Vec<String> {
        self.files
            .keys()
            .filter(|path| Some(path.as_str()) != held_back)
            .cloned()
            .collect()
    }
}

/// Every file needed to bring the installed version up to the target
///
/// Batches iterate in ascending version order. The union maps each planned
/// path to the version that owns it; a path is owned by exactly one version.
#[derive(Debug, Default)]
pub struct UpdatePlan {
    batches: BTreeMap<Version, VersionBatch>,
    owners: HashMap<String, Version>,
    /// Installed batches whose version record waits for the running executable
    held: BTreeSet<Version>,
    executable_replaced: bool,
}

impl UpdatePlan {
    /// Whether nothing is left to install or record
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty() && self.held.is_empty()
    }

    /// Whether the running executable has been swapped during this plan
    pub fn executable_replaced(&self) -> bool {
        self.executable_replaced
    }

    pub(crate) fn mark_executable_replaced(&mut self) {
        self.executable_replaced = true;
    }

    /// Keep `version` unrecorded until the executable is installed
    pub(crate) fn hold(&mut self, version: Version) {
        self.held.insert(version);
    }

    /// Lowest held version
    pub(crate) fn first_held(&self) -> Option<Version> {
        self.held.first().cloned()
    }

    pub(crate) fn release(&mut self, version: &Version) {
        self.held.remove(version);
    }

    /// Files still to install across every batch
    pub fn files_total(&self) -> usize {
        self.owners.len()
    }

    /// Batches in ascending version order
    pub fn batches(&self) -> impl Iterator<Item = &VersionBatch> {
        self.batches.values()
    }

    /// Versions with files left to install, ascending
    pub fn versions(&self) -> Vec<Version> {
        self.batches.keys().cloned().collect()
    }

    /// The lowest version still planned
    pub fn head(&self) -> Option<&VersionBatch> {
        self.batches.values().next()
    }

    /// Look up a batch by version
    pub fn batch(&self, version: &Version) -> Option<&VersionBatch> {
        self.batches.get(version)
    }

    pub(crate) fn batch_mut(&mut self, version: &Version) -> Option<&mut VersionBatch> {
        self.batches.get_mut(version)
    }

    /// The version that owns `path`, if it is planned
    pub fn owner(&self, path: &str) -> Option<&Version> {
        self.owners.get(path)
    }

    /// Whether `path` is already planned by some version
    pub fn contains(&self, path: &str) -> bool {
        self.owners.contains_key(path)
    }

    fn insert(&mut self, version: &Version, file: ResumableFile) {
        self.owners
            .insert(file.full_path().to_string(), version.clone());
        self.batches
            .entry(version.clone())
            .or_insert_with(|| VersionBatch::new(version.clone()))
            .files
            .insert(file.full_path().to_string(), file);
    }

    /// Stop tracking a file, dropping its batch once empty
    pub(crate) fn remove_file(&mut self, version: &Version, path: &str) -> Option<ResumableFile> {
        let batch = self.batches.get_mut(version)?;
        let file = batch.files.remove(path)?;
        self.owners.remove(path);
        if batch.files.is_empty() {
            self.batches.remove(version);
        }
        Some(file)
    }

    /// Drop a batch and its files from the union
    pub(crate) fn remove_batch(&mut self, version: &Version) -> Option<VersionBatch> {
        let batch = self.batches.remove(version)?;
        for path in batch.files.keys() {
            self.owners.remove(path);
        }
        Some(batch)
    }
}

/// Walk the manifest chain starting at `start_url`
///
/// Traversal stops at the first manifest whose version is at or below
/// `installed`, or when a manifest has no successor URL. If the chain ran out
/// while still above `installed`, the installed base is too old to patch and
/// [`Error::UnsupportedVersion`] is returned unless `allow_stale_target` is set.
///
/// Each file's download path is `<download_dir>/<version>/<path>`, so a
/// partial download from an earlier run is picked up without any cache.
///
/// Nothing is returned on failure; a partially walked chain is discarded.
pub async fn resolve(
    source: &dyn TransferSource,
    decoder: &dyn ManifestDecoder,
    start_url: &str,
    installed: &Version,
    allow_stale_target: bool,
    download_dir: &Path,
) -> Result<UpdatePlan> {
    let mut plan = UpdatePlan::default();
    let mut visited = HashSet::new();
    let mut next = Some(start_url.to_string());
    let mut last_version = None;

    while let Some(url) = next.take() {
        if !visited.insert(url.clone()) {
            return Err(Error::ManifestCycle { url });
        }

        let text = source.fetch_text(&url).await?;
        let entry = decoder.decode_manifest(&text)?;
        tracing::debug!(%url, version = %entry.version, files = entry.files.len(), "manifest fetched");

        last_version = Some(entry.version.clone());
        if entry.version <= *installed {
            break;
        }

        for raw in &entry.files {
            let path = normalize_path(raw)?;
            if plan.contains(&path) {
                continue;
            }

            let download_path = download_dir
                .join(entry.version.to_string())
                .join(&path);
            let file = ResumableFile::open(path.clone(), entry.file_url(&path), download_path).await?;
            plan.insert(&entry.version, file);
        }

        next = entry.next_manifest_url;
    }

    if let Some(last) = last_version {
        if last > *installed {
            if !allow_stale_target {
                return Err(Error::UnsupportedVersion {
                    installed: installed.to_string(),
                    oldest_available: last.to_string(),
                });
            }
            tracing::warn!(
                %installed,
                oldest_available = %last,
                "manifest chain does not reach the installed version, continuing anyway"
            );
        }
    }

    tracing::info!(
        versions = plan.batches.len(),
        files = plan.files_total(),
        "update plan resolved"
    );
    Ok(plan)
}

/// Canonical `/`-separated form of a manifest path
///
/// Rejects empty, absolute and parent-escaping paths so a manifest can never
/// write outside the app root.
pub(crate) fn normalize_path(raw: &str) -> Result<String> {
    let unsafe_path = |reason: &str| Error::Decode(format!("unsafe file path '{raw}': {reason}"));

    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(unsafe_path("absolute paths are not allowed"));
    }

    let mut parts = Vec::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| unsafe_path("not valid UTF-8"))?;
                if part.contains(':') {
                    return Err(unsafe_path("drive prefixes are not allowed"));
                }
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir => return Err(unsafe_path("'..' is not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path("absolute paths are not allowed"));
            }
        }
    }

    if parts.is_empty() {
        return Err(unsafe_path("empty path"));
    }
    Ok(parts.join("/"))
}
