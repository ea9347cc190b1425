//! # Durable Boot Records
//!
//! Crash-safe persistence for the patch lifecycle state. The store owns the
//! serialized document; every other component sees only the in-memory
//! projection held by [`PatchManager`](crate::manager::PatchManager).
//!
//! ## Durability Model
//!
//! The document is written atomically: serialize to a uniquely named temp
//! file in the same directory, flush, then `rename` over the previous
//! document. A crash at any point leaves either the old document or the new
//! one on disk, never a half-written hybrid.
//!
//! Reads are forgiving: a missing or unparseable document is a
//! fresh install, not an error. The engine must keep working on a device
//! whose cache was wiped, truncated by a power cut, or corrupted by another
//! process.
//!
//! ## Failure Semantics
//!
//! A failed save is reported to the caller but does not crash the process.
//! The in-memory state remains authoritative for the current run and the
//! next mutation retries the save from that state.

use crate::constants::STATE_FILE_NAME;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// =============================================================================
// Document Types
// =============================================================================

/// Lifecycle status of a known patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchStatus {
    /// Reported by the update service, not yet fetched.
    Discovered,
    /// A download attempt has started.
    Downloading,
    /// Fetched, verified, and eligible to boot.
    Downloaded,
    /// Fetched but the checksum did not match; never eligible to boot.
    VerificationFailed,
    /// Failed a launch at least once; never re-selected. Terminal.
    Bad,
}

/// Everything the engine knows about one patch.
///
/// The artifact path is not stored; it is derived from the cache layout so
/// the cache directory can move between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRecord {
    /// Monotonically increasing, unique per release track.
    pub number: u64,
    /// Hex-encoded sha256 of the full (reconstructed) artifact.
    pub checksum: String,
    pub status: PatchStatus,
    /// Size of the verified artifact on disk; 0 until Downloaded.
    pub size: u64,
}

/// Which patch is running and which boots next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootState {
    /// The patch this process actually loaded, or None for the baseline.
    pub current: Option<u64>,
    /// The patch the next process start will load, or None for the baseline.
    pub next: Option<u64>,
}

/// Outcome of one recorded launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchOutcome {
    Pending,
    Succeeded,
    Failed,
}

/// One entry in the launch history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchAttempt {
    pub patch_number: u64,
    pub outcome: LaunchOutcome,
    pub timestamp: DateTime<Utc>,
}

/// The serialized union of boot state, patch records, and launch history,
/// keyed by release version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    /// The release track this document belongs to. A mismatch at load time
    /// starts a fresh track.
    pub release_version: String,
    /// Unique id of this install. Survives release-version switches.
    pub client_id: String,
    pub boot: BootState,
    /// Highest patch number ever seen on this track, including patches whose
    /// records were garbage-collected. Reported to the update service so it
    /// never re-offers an old or known-bad patch.
    pub highest_seen: Option<u64>,
    /// All known patches, ordered by number.
    pub patches: BTreeMap<u64, PatchRecord>,
    /// Recent launch attempts, oldest first, bounded.
    pub attempts: Vec<LaunchAttempt>,
    /// Events not yet delivered to the update service.
    pub queued_events: Vec<crate::events::PatchEvent>,
}

impl StateDocument {
    /// A fresh baseline-only document for the given release track.
    pub fn fresh(release_version: &str, client_id: Option<String>) -> Self {
        Self {
            release_version: release_version.to_string(),
            client_id: client_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            boot: BootState::default(),
            highest_seen: None,
            patches: BTreeMap::new(),
            attempts: Vec::new(),
            queued_events: Vec::new(),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Durable, crash-consistent storage for the [`StateDocument`].
pub struct BootRecordStore {
    state_path: PathBuf,
}

impl BootRecordStore {
    /// Creates a store rooted at the given cache directory.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            state_path: cache_dir.join(STATE_FILE_NAME),
        }
    }

    /// Path of the persisted document.
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Loads the document for the given release version.
    ///
    /// Returns a fresh baseline document when the file is absent, when it
    /// cannot be parsed, or when it belongs to a different release version.
    /// The second tuple element is true when the on-disk document existed
    /// but belonged to another release track (the caller should reclaim the
    /// old track's artifacts).
    pub fn load(&self, release_version: &str) -> (StateDocument, bool) {
        let raw = match fs::read(&self.state_path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("no boot records at {:?} ({e}), starting fresh", self.state_path);
                return (StateDocument::fresh(release_version, None), false);
            }
        };

        match serde_json::from_slice::<StateDocument>(&raw) {
            Ok(doc) if doc.release_version == release_version => (doc, false),
            Ok(doc) => {
                debug!(
                    "release version changed {} -> {release_version}, resetting patch track",
                    doc.release_version
                );
                (
                    StateDocument::fresh(release_version, Some(doc.client_id)),
                    true,
                )
            }
            Err(e) => {
                warn!("boot records at {:?} unreadable ({e}), starting fresh", self.state_path);
                (StateDocument::fresh(release_version, None), false)
            }
        }
    }

    /// Persists the document atomically.
    ///
    /// Writes to a uniquely named temp file next to the document, flushes
    /// it, and renames it over the previous document. Concurrent savers use
    /// distinct temp names; the final rename is atomic and last writer wins.
    pub fn save(&self, doc: &StateDocument) -> Result<()> {
        let parent = self
            .state_path
            .parent()
            .ok_or_else(|| Error::Storage(format!("no parent dir for {:?}", self.state_path)))?;
        fs::create_dir_all(parent)
            .map_err(|e| Error::Storage(format!("create {}: {e}", parent.display())))?;

        let temp_path = self
            .state_path
            .with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| Error::Storage(format!("serialize boot records: {e}")))?;

        let mut file = fs::File::create(&temp_path)
            .map_err(|e| Error::Storage(format!("create {}: {e}", temp_path.display())))?;
        file.write_all(&json)
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                let _ = fs::remove_file(&temp_path);
                Error::Storage(format!("write {}: {e}", temp_path.display()))
            })?;
        drop(file);

        fs::rename(&temp_path, &self.state_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::Storage(format!("rename over {}: {e}", self.state_path.display()))
        })?;

        debug!("boot records saved to {:?}", self.state_path);
        Ok(())
    }
}
