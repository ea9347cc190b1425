//! Artifact download, reconstruction, and verification.
//!
//! The downloader turns a [`PatchMetadata`] descriptor into a verified,
//! staged artifact file. It never touches the boot state: verified patches
//! are handed to [`PatchManager`](crate::manager::PatchManager) for
//! placement and commit, so a corrupt download can never become eligible
//! to boot.
//!
//! Staged files live under `cache_dir/downloads/` with unique names; a
//! crash mid-download leaves only garbage there, which is reclaimed on the
//! next attempt for the same patch number. Status only ever flips to
//! Downloaded after the checksum matches and the bytes are flushed.

use crate::config::UpdateConfig;
use crate::constants::MAX_PATCH_SIZE;
use crate::diff;
use crate::error::{Error, Result};
use crate::remote::{ArtifactEncoding, PatchMetadata, Remote};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A downloaded and checksum-verified artifact, staged but not yet placed
/// into the patch directory.
#[derive(Debug)]
pub struct StagedPatch {
    pub number: u64,
    pub checksum: String,
    /// Location of the staged file under the downloads directory.
    pub path: PathBuf,
    pub size: u64,
}

/// Fetches and verifies patch artifacts.
pub struct Downloader {
    downloads_dir: PathBuf,
    baseline_paths: Vec<PathBuf>,
    patch_public_key: Option<String>,
}

impl Downloader {
    pub fn new(config: &UpdateConfig) -> Self {
        Self {
            downloads_dir: config.downloads_dir.clone(),
            baseline_paths: config.baseline_paths.clone(),
            patch_public_key: config.patch_public_key.clone(),
        }
    }

    /// Downloads the artifact described by `metadata`, reconstructs it if
    /// it is delta- or gzip-encoded, verifies its checksum (and signature,
    /// when a public key is configured), and stages it.
    ///
    /// On verification failure the bytes are discarded before anything is
    /// staged and [`Error::Verification`] (or [`Error::Signature`]) is
    /// returned; nothing bootable remains on disk.
    pub fn fetch_and_verify(
        &self,
        remote: &dyn Remote,
        metadata: &PatchMetadata,
    ) -> Result<StagedPatch> {
        self.clean_stale_partials(metadata.number);

        let downloaded = remote.download(&metadata.download_url)?;
        if downloaded.len() as u64 > MAX_PATCH_SIZE {
            return Err(Error::BadServerResponse(format!(
                "artifact of {} bytes exceeds the {} byte limit",
                downloaded.len(),
                MAX_PATCH_SIZE
            )));
        }

        let artifact = match metadata.encoding {
            ArtifactEncoding::Full => downloaded,
            ArtifactEncoding::Gzip => gunzip(&downloaded)?,
            ArtifactEncoding::BaselineDiff => {
                let baseline = self.baseline_bytes()?;
                diff::apply(&baseline, &downloaded)?
            }
        };

        let computed = hex::encode(Sha256::digest(&artifact));
        if computed != metadata.hash {
            return Err(Error::Verification {
                number: metadata.number,
                expected: metadata.hash.clone(),
                computed,
            });
        }

        if let Some(public_key) = &self.patch_public_key {
            match &metadata.hash_signature {
                Some(signature) => {
                    crate::signing::check_signature(&metadata.hash, signature, public_key)?;
                }
                None => {
                    return Err(Error::Signature(format!(
                        "patch {} is unsigned but a public key is configured",
                        metadata.number
                    )));
                }
            }
        }

        let staged = self.stage(metadata.number, &artifact).map_err(|e| {
            warn!("failed to stage patch {}: {e}", metadata.number);
            e
        })?;
        debug!(
            "patch {} staged at {:?} ({} bytes, verified)",
            metadata.number,
            staged,
            artifact.len()
        );
        Ok(StagedPatch {
            number: metadata.number,
            checksum: metadata.hash.clone(),
            path: staged,
            size: artifact.len() as u64,
        })
    }

    /// Writes the verified bytes to a uniquely named staged file and
    /// flushes them to storage.
    fn stage(&self, number: u64, artifact: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.downloads_dir)?;
        let path = self
            .downloads_dir
            .join(format!("{number}.tmp-{}", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path)?;
        file.write_all(artifact).and_then(|_| file.sync_all()).map_err(|e| {
            let _ = fs::remove_file(&path);
            Error::from(e)
        })?;
        Ok(path)
    }

    /// Reads the first baseline executable that exists on disk.
    fn baseline_bytes(&self) -> Result<Vec<u8>> {
        for path in &self.baseline_paths {
            if path.exists() {
                return Ok(fs::read(path)?);
            }
        }
        Err(Error::State(format!(
            "no baseline artifact found among {:?}",
            self.baseline_paths
        )))
    }

    /// Removes leftover staged files for the given patch number, e.g. from
    /// a run that crashed mid-download.
    fn clean_stale_partials(&self, number: u64) {
        let prefix = format!("{number}.tmp");
        let Ok(entries) = fs::read_dir(&self.downloads_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) {
                debug!("removing stale partial download {:?}", entry.path());
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

/// Decompresses a gzip-encoded download.
fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::BadServerResponse(format!("gzip decode failed: {e}")))?;
    Ok(out)
}

/// Computes the hex-encoded sha256 of a file on disk.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
