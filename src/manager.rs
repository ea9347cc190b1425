//! # Patch Lifecycle State Machine
//!
//! [`PatchManager`] is the sole writer of [`BootState`] and the central
//! authority every other component consults. It owns the in-memory
//! projection of the persisted document and enforces the lifecycle
//! invariants:
//!
//! ```text
//!   Discovered ──► Downloading ──► Downloaded ──► Bad (terminal)
//!                       │
//!                       └────► VerificationFailed (never bootable)
//! ```
//!
//! - `next`, if set, always references a Downloaded, non-Bad patch.
//! - Among candidates the highest Downloaded, non-Bad number wins.
//! - Marking a patch Bad rolls `next` back to the best older candidate;
//!   `current` is untouched because the running process keeps whatever code
//!   it already loaded. Rollback takes effect on the next process start.
//!
//! Queries ([`PatchManager::next_boot_patch`]) answer from memory only; disk
//! validation of the next-boot artifact happens once at open time, not on
//! the read path.
//!
//! Persistence failures are logged and swallowed here: the in-memory state
//! stays authoritative for this run and the next mutation retries the save.

use crate::constants::{
    GC_KEEP_GENERATIONS, MAX_ATTEMPT_HISTORY, MAX_QUEUED_EVENTS, PATCHES_DIR_NAME,
    PATCH_ARTIFACT_FILE_NAME,
};
use crate::error::{Error, Result};
use crate::events::PatchEvent;
use crate::store::{
    BootRecordStore, BootState, LaunchAttempt, LaunchOutcome, PatchRecord, PatchStatus,
    StateDocument,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A bootable patch: its number and where its artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchInfo {
    pub number: u64,
    pub path: PathBuf,
}

/// Owner of the boot state and enforcement point for the patch lifecycle.
pub struct PatchManager {
    cache_dir: PathBuf,
    store: BootRecordStore,
    doc: StateDocument,
}

impl PatchManager {
    /// Loads (or freshly creates) the state for the given release track.
    ///
    /// If the on-disk document belongs to a different release version the
    /// old track's artifacts are reclaimed and a fresh document is started.
    /// The next-boot artifact is validated against disk here, once, so that
    /// later queries never have to touch storage.
    pub fn open(cache_dir: &Path, release_version: &str) -> Self {
        let store = BootRecordStore::new(cache_dir);
        let (doc, track_reset) = store.load(release_version);
        let mut manager = Self {
            cache_dir: cache_dir.to_path_buf(),
            store,
            doc,
        };

        if track_reset {
            info!("release track reset, clearing patch artifacts");
            if let Err(e) = fs::remove_dir_all(manager.patches_dir()) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to clear old patch artifacts: {e}");
                }
            }
            manager.persist();
        } else if !manager.store.state_path().exists() {
            // First run: write the fresh document now so the install id is
            // minted exactly once.
            manager.persist();
        }

        manager.validate_next_bootable();
        manager
    }

    // =========================================================================
    // Cache layout
    // =========================================================================

    fn patches_dir(&self) -> PathBuf {
        self.cache_dir.join(PATCHES_DIR_NAME)
    }

    fn dir_for_patch(&self, number: u64) -> PathBuf {
        self.patches_dir().join(number.to_string())
    }

    /// Derived location of a patch's bootable artifact.
    pub fn artifact_path(&self, number: u64) -> PathBuf {
        self.dir_for_patch(number).join(PATCH_ARTIFACT_FILE_NAME)
    }

    // =========================================================================
    // Queries (in-memory only)
    // =========================================================================

    /// The patch that will load on the next process start, if any.
    ///
    /// Answers from the in-memory state; never blocks on network or disk.
    pub fn next_boot_patch(&self) -> Option<PatchInfo> {
        self.doc.boot.next.map(|n| PatchInfo {
            number: n,
            path: self.artifact_path(n),
        })
    }

    /// The patch this process booted from, if any.
    pub fn current_boot_patch(&self) -> Option<PatchInfo> {
        self.doc.boot.current.map(|n| PatchInfo {
            number: n,
            path: self.artifact_path(n),
        })
    }

    /// Current boot state snapshot.
    pub fn boot_state(&self) -> BootState {
        self.doc.boot
    }

    /// Highest patch number ever seen on this track, for patch-check
    /// requests. Includes bad and garbage-collected patches so the server
    /// never re-offers them.
    pub fn highest_seen_patch_number(&self) -> Option<u64> {
        self.doc.highest_seen
    }

    /// Unique id of this install.
    pub fn client_id(&self) -> &str {
        &self.doc.client_id
    }

    /// Read-only view of the full document, for inspection and tests.
    pub fn document(&self) -> &StateDocument {
        &self.doc
    }

    fn record(&self, number: u64) -> Option<&PatchRecord> {
        self.doc.patches.get(&number)
    }

    /// Highest Downloaded, non-Bad candidate.
    fn best_available(&self) -> Option<u64> {
        self.doc
            .patches
            .values()
            .filter(|r| r.status == PatchStatus::Downloaded)
            .map(|r| r.number)
            .max()
    }

    /// Highest Downloaded, non-Bad candidate strictly older than `number`.
    fn best_available_below(&self, number: u64) -> Option<u64> {
        self.doc
            .patches
            .values()
            .filter(|r| r.status == PatchStatus::Downloaded && r.number < number)
            .map(|r| r.number)
            .max()
    }

    // =========================================================================
    // Download bookkeeping
    // =========================================================================

    /// Registers a download attempt for a patch the update service offered.
    ///
    /// Known-bad patches are refused; an already-downloaded patch is a
    /// no-op.
    pub fn begin_download(&mut self, number: u64, checksum: &str) -> Result<()> {
        if let Some(record) = self.record(number) {
            match record.status {
                PatchStatus::Bad => {
                    return Err(Error::State(format!(
                        "refusing to download known-bad patch {number}"
                    )));
                }
                PatchStatus::Downloaded => return Ok(()),
                _ => {}
            }
        }

        self.doc.patches.insert(
            number,
            PatchRecord {
                number,
                checksum: checksum.to_string(),
                status: PatchStatus::Downloading,
                size: 0,
            },
        );
        self.doc.highest_seen = Some(self.doc.highest_seen.map_or(number, |h| h.max(number)));
        self.persist();
        Ok(())
    }

    /// Records that a staged artifact failed verification.
    ///
    /// The record is kept (as `VerificationFailed`) so the patch can never
    /// become bootable, but no rollback happens: the patch never entered
    /// the boot state.
    pub fn mark_verification_failed(&mut self, number: u64) {
        warn!("patch {number} failed verification, discarding");
        if let Some(record) = self.doc.patches.get_mut(&number) {
            if record.status != PatchStatus::Bad {
                record.status = PatchStatus::VerificationFailed;
            }
        }
        let _ = fs::remove_dir_all(self.dir_for_patch(number));
        self.persist();
    }

    /// Commits a verified artifact: moves it into the patch directory, marks
    /// the patch Downloaded, and advances `next` if this patch supersedes
    /// the current boot patch.
    ///
    /// Idempotent: committing an already-committed patch number is a no-op.
    pub fn commit_new_patch(&mut self, number: u64, checksum: &str, staged: &Path) -> Result<()> {
        if let Some(record) = self.record(number) {
            match record.status {
                PatchStatus::Bad => {
                    return Err(Error::State(format!(
                        "refusing to commit known-bad patch {number}"
                    )));
                }
                PatchStatus::Downloaded => {
                    debug!("patch {number} already committed");
                    let _ = fs::remove_file(staged);
                    return Ok(());
                }
                _ => {}
            }
        }

        let artifact = self.artifact_path(number);
        let patch_dir = self.dir_for_patch(number);
        fs::create_dir_all(&patch_dir)?;
        fs::rename(staged, &artifact)?;
        let size = fs::metadata(&artifact)?.len();

        self.doc.patches.insert(
            number,
            PatchRecord {
                number,
                checksum: checksum.to_string(),
                status: PatchStatus::Downloaded,
                size,
            },
        );
        self.doc.highest_seen = Some(self.doc.highest_seen.map_or(number, |h| h.max(number)));

        // A patch only becomes next-boot when it supersedes what we are
        // running; an older verified patch stays available as a rollback
        // target without demoting next.
        if self.doc.boot.current.map_or(true, |c| number > c) {
            self.doc.boot.next = self.best_available();
        }

        info!("patch {number} committed ({size} bytes, verified)");
        self.gc();
        self.persist();
        Ok(())
    }

    // =========================================================================
    // Boot transitions
    // =========================================================================

    /// Promotes the next-boot patch to current and opens a Pending launch
    /// attempt for it. Called by the launch tracker when the host reports
    /// launch start.
    ///
    /// `next` is left unchanged so the promotion converges under repeats,
    /// but a second call while an attempt is still Pending is a state error:
    /// each launch outcome must be attributable to exactly one attempt.
    pub fn promote_next_to_current(&mut self) -> Result<()> {
        if self
            .doc
            .attempts
            .iter()
            .any(|a| a.outcome == LaunchOutcome::Pending)
        {
            return Err(Error::State(
                "launch already started, awaiting success or failure report".to_string(),
            ));
        }

        self.doc.boot.current = self.doc.boot.next;
        if let Some(number) = self.doc.boot.current {
            self.doc.attempts.push(LaunchAttempt {
                patch_number: number,
                outcome: LaunchOutcome::Pending,
                timestamp: chrono::Utc::now(),
            });
            if self.doc.attempts.len() > MAX_ATTEMPT_HISTORY {
                let excess = self.doc.attempts.len() - MAX_ATTEMPT_HISTORY;
                self.doc.attempts.drain(..excess);
            }
            info!("booting from patch {number}");
        } else {
            debug!("booting from baseline, no patch to promote");
        }
        self.persist();
        Ok(())
    }

    /// Resolves the Pending launch attempt with the given outcome.
    ///
    /// Returns the patch number the attempt was judging, or None when no
    /// attempt was open (booted from baseline).
    pub fn resolve_pending_attempt(&mut self, outcome: LaunchOutcome) -> Option<u64> {
        let attempt = self
            .doc
            .attempts
            .iter_mut()
            .find(|a| a.outcome == LaunchOutcome::Pending)?;
        attempt.outcome = outcome;
        let number = attempt.patch_number;
        self.persist();
        Some(number)
    }

    /// Marks a patch Bad and rolls the next-boot selection back.
    ///
    /// If the bad patch was `next`, `next` reverts to the best Downloaded,
    /// non-Bad patch older than it, or to the baseline when none exists.
    /// `current` is untouched: the running process keeps the code it
    /// already loaded, and the rollback takes effect on the next start.
    pub fn mark_bad_and_rollback(&mut self, number: u64) {
        match self.doc.patches.get_mut(&number) {
            Some(record) => {
                if record.status == PatchStatus::Bad {
                    debug!("patch {number} already marked bad");
                } else {
                    record.status = PatchStatus::Bad;
                    info!("patch {number} marked bad");
                }
            }
            None => {
                warn!("asked to mark unknown patch {number} bad");
                self.doc.patches.insert(
                    number,
                    PatchRecord {
                        number,
                        checksum: String::new(),
                        status: PatchStatus::Bad,
                        size: 0,
                    },
                );
                self.doc.highest_seen =
                    Some(self.doc.highest_seen.map_or(number, |h| h.max(number)));
            }
        }

        if self.doc.boot.next == Some(number) {
            let fallback = self.best_available_below(number);
            match fallback {
                Some(older) => info!("rolling back next boot patch {number} -> {older}"),
                None => info!("rolling back next boot patch {number} -> baseline"),
            }
            self.doc.boot.next = fallback;
        }

        self.gc();
        self.persist();
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Queues an event for delivery on the next update run.
    pub fn queue_event(&mut self, event: PatchEvent) {
        self.doc.queued_events.push(event);
        if self.doc.queued_events.len() > MAX_QUEUED_EVENTS {
            let excess = self.doc.queued_events.len() - MAX_QUEUED_EVENTS;
            self.doc.queued_events.drain(..excess);
        }
        self.persist();
    }

    /// Removes and returns up to `limit` queued events, oldest first.
    pub fn drain_events(&mut self, limit: usize) -> Vec<PatchEvent> {
        if self.doc.queued_events.is_empty() {
            return Vec::new();
        }
        let take = limit.min(self.doc.queued_events.len());
        let batch: Vec<PatchEvent> = self.doc.queued_events.drain(..take).collect();
        self.persist();
        batch
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Checks the next-boot artifact against disk and demotes it if it has
    /// vanished or changed size since it was committed. Runs once at open;
    /// read queries stay I/O-free.
    fn validate_next_bootable(&mut self) {
        let mut changed = false;
        while let Some(number) = self.doc.boot.next {
            let Some(record) = self.record(number).cloned() else {
                warn!("next boot patch {number} has no record, demoting");
                self.doc.boot.next = None;
                changed = true;
                break;
            };
            let path = self.artifact_path(number);
            let on_disk = fs::metadata(&path).map(|m| m.len()).ok();
            if on_disk == Some(record.size) {
                break;
            }
            warn!(
                "next boot patch {number} artifact missing or resized at {:?}, demoting",
                path
            );
            let _ = fs::remove_dir_all(self.dir_for_patch(number));
            if let Some(r) = self.doc.patches.get_mut(&number) {
                r.status = PatchStatus::VerificationFailed;
            }
            self.doc.boot.next = self.best_available_below(number);
            changed = true;
        }
        if changed {
            self.persist();
        }
    }

    /// Reclaims disk for patches no longer worth keeping: records that are
    /// superseded by [`GC_KEEP_GENERATIONS`] newer verified patches, and the
    /// artifacts of bad or failed patches. Bad records themselves are kept
    /// as the memory of what must never boot again.
    fn gc(&mut self) {
        let referenced = |n: u64| {
            self.doc.boot.current == Some(n) || self.doc.boot.next == Some(n)
        };

        let mut downloaded: Vec<u64> = self
            .doc
            .patches
            .values()
            .filter(|r| r.status == PatchStatus::Downloaded)
            .map(|r| r.number)
            .collect();
        downloaded.sort_unstable_by(|a, b| b.cmp(a));
        let keep_downloaded: Vec<u64> = downloaded
            .iter()
            .take(GC_KEEP_GENERATIONS as usize)
            .copied()
            .collect();

        let mut drop_records: Vec<u64> = Vec::new();
        let mut drop_artifacts: Vec<u64> = Vec::new();
        for record in self.doc.patches.values() {
            let n = record.number;
            if referenced(n) {
                continue;
            }
            match record.status {
                PatchStatus::Downloaded if !keep_downloaded.contains(&n) => {
                    drop_records.push(n);
                    drop_artifacts.push(n);
                }
                PatchStatus::VerificationFailed => {
                    drop_records.push(n);
                    drop_artifacts.push(n);
                }
                PatchStatus::Bad => {
                    drop_artifacts.push(n);
                }
                _ => {}
            }
        }

        for n in drop_artifacts {
            let dir = self.dir_for_patch(n);
            if dir.exists() {
                debug!("reclaiming artifacts for patch {n}");
                if let Err(e) = fs::remove_dir_all(&dir) {
                    warn!("failed to remove {}: {e}", dir.display());
                }
            }
        }
        for n in drop_records {
            self.doc.patches.remove(&n);
        }
    }

    /// Persists the document, keeping the in-memory state authoritative if
    /// the save fails. The next mutation retries from this state.
    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.doc) {
            warn!("boot record save failed, in-memory state stays authoritative: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> PatchManager {
        PatchManager::open(temp.path(), "1.0.0+1")
    }

    fn stage_artifact(temp: &TempDir, number: u64) -> (PathBuf, String) {
        let path = temp.path().join(format!("staged-{number}"));
        let contents = format!("patch contents {number}");
        fs::write(&path, &contents).unwrap();
        let checksum = hex::encode(<sha2::Sha256 as sha2::Digest>::digest(contents.as_bytes()));
        (path, checksum)
    }

    fn commit(manager: &mut PatchManager, temp: &TempDir, number: u64) {
        let (staged, checksum) = stage_artifact(temp, number);
        manager.begin_download(number, &checksum).unwrap();
        manager.commit_new_patch(number, &checksum, &staged).unwrap();
    }

    #[test]
    fn fresh_track_has_no_patches() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        assert!(m.next_boot_patch().is_none());
        assert!(m.current_boot_patch().is_none());
        assert!(m.highest_seen_patch_number().is_none());
    }

    #[test]
    fn commit_sets_next_and_moves_artifact() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        commit(&mut m, &temp, 1);

        let next = m.next_boot_patch().unwrap();
        assert_eq!(next.number, 1);
        assert!(next.path.exists());
        assert_eq!(m.highest_seen_patch_number(), Some(1));
    }

    #[test]
    fn commit_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        commit(&mut m, &temp, 1);

        let (staged, checksum) = stage_artifact(&temp, 1);
        m.commit_new_patch(1, &checksum, &staged).unwrap();
        assert_eq!(m.next_boot_patch().unwrap().number, 1);
        // The redundant staged file was cleaned up.
        assert!(!staged.exists());
    }

    #[test]
    fn next_is_always_highest_committed() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        for n in [1, 2, 3] {
            commit(&mut m, &temp, n);
            assert_eq!(m.next_boot_patch().unwrap().number, n);
        }
    }

    #[test]
    fn older_commit_does_not_demote_next() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        commit(&mut m, &temp, 5);
        commit(&mut m, &temp, 4);
        assert_eq!(m.next_boot_patch().unwrap().number, 5);
    }

    #[test]
    fn promote_sets_current_and_opens_attempt() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        commit(&mut m, &temp, 1);

        m.promote_next_to_current().unwrap();
        assert_eq!(m.current_boot_patch().unwrap().number, 1);
        assert_eq!(m.next_boot_patch().unwrap().number, 1);
        assert_eq!(
            m.document().attempts.last().unwrap().outcome,
            LaunchOutcome::Pending
        );
    }

    #[test]
    fn double_promote_without_report_is_a_state_error() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        commit(&mut m, &temp, 1);

        m.promote_next_to_current().unwrap();
        assert!(matches!(
            m.promote_next_to_current(),
            Err(Error::State(_))
        ));
    }

    #[test]
    fn promote_with_no_patch_is_harmless_and_repeatable() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        m.promote_next_to_current().unwrap();
        m.promote_next_to_current().unwrap();
        assert!(m.current_boot_patch().is_none());
        assert!(m.document().attempts.is_empty());
    }

    #[test]
    fn rollback_reverts_to_best_older_patch() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        commit(&mut m, &temp, 5);
        commit(&mut m, &temp, 6);

        m.promote_next_to_current().unwrap();
        assert_eq!(m.current_boot_patch().unwrap().number, 6);

        m.resolve_pending_attempt(LaunchOutcome::Failed).unwrap();
        m.mark_bad_and_rollback(6);

        assert_eq!(m.next_boot_patch().unwrap().number, 5);
        // The running process keeps its loaded code.
        assert_eq!(m.current_boot_patch().unwrap().number, 6);
    }

    #[test]
    fn rollback_falls_to_baseline_when_no_older_patch_exists() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        commit(&mut m, &temp, 6);

        m.promote_next_to_current().unwrap();
        m.resolve_pending_attempt(LaunchOutcome::Failed).unwrap();
        m.mark_bad_and_rollback(6);

        assert!(m.next_boot_patch().is_none());
    }

    #[test]
    fn bad_patch_is_never_reselected() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        commit(&mut m, &temp, 1);
        m.mark_bad_and_rollback(1);

        assert!(m.next_boot_patch().is_none());
        assert!(matches!(m.begin_download(1, "sum"), Err(Error::State(_))));
        let (staged, checksum) = stage_artifact(&temp, 1);
        assert!(m.commit_new_patch(1, &checksum, &staged).is_err());
        assert!(m.next_boot_patch().is_none());
    }

    #[test]
    fn verification_failed_patch_never_becomes_next() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        m.begin_download(3, "expected").unwrap();
        m.mark_verification_failed(3);
        assert!(m.next_boot_patch().is_none());
        // Still counted as seen so the server does not re-offer it.
        assert_eq!(m.highest_seen_patch_number(), Some(3));
    }

    #[test]
    fn state_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut m = manager(&temp);
            commit(&mut m, &temp, 2);
        }
        let m = manager(&temp);
        assert_eq!(m.next_boot_patch().unwrap().number, 2);
        assert_eq!(m.highest_seen_patch_number(), Some(2));
    }

    #[test]
    fn release_version_switch_resets_track() {
        let temp = TempDir::new().unwrap();
        {
            let mut m = manager(&temp);
            commit(&mut m, &temp, 2);
        }
        let m = PatchManager::open(temp.path(), "2.0.0+1");
        assert!(m.next_boot_patch().is_none());
        assert!(m.highest_seen_patch_number().is_none());
        // Old artifacts were reclaimed with the track.
        assert!(!temp.path().join(PATCHES_DIR_NAME).join("2").exists());
    }

    #[test]
    fn vanished_artifact_is_demoted_at_open() {
        let temp = TempDir::new().unwrap();
        {
            let mut m = manager(&temp);
            commit(&mut m, &temp, 1);
            fs::remove_file(m.artifact_path(1)).unwrap();
        }
        let m = manager(&temp);
        assert!(m.next_boot_patch().is_none());
    }

    #[test]
    fn resized_artifact_is_demoted_at_open() {
        let temp = TempDir::new().unwrap();
        {
            let mut m = manager(&temp);
            commit(&mut m, &temp, 1);
            fs::write(m.artifact_path(1), "tampered with").unwrap();
        }
        let m = manager(&temp);
        assert!(m.next_boot_patch().is_none());
    }

    #[test]
    fn gc_reclaims_superseded_patches() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        for n in 1..=4 {
            commit(&mut m, &temp, n);
        }
        // Patches 3 and 4 are the kept generations; 1 and 2 are superseded.
        assert!(!m.artifact_path(1).exists());
        assert!(!m.artifact_path(2).exists());
        assert!(m.artifact_path(3).exists());
        assert!(m.artifact_path(4).exists());
        assert!(!m.document().patches.contains_key(&1));
        // highest_seen still remembers the full history.
        assert_eq!(m.highest_seen_patch_number(), Some(4));
    }

    #[test]
    fn gc_keeps_bad_records_but_reclaims_their_artifacts() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        commit(&mut m, &temp, 1);
        commit(&mut m, &temp, 2);
        m.mark_bad_and_rollback(2);

        assert!(!m.artifact_path(2).exists());
        assert_eq!(
            m.document().patches.get(&2).unwrap().status,
            PatchStatus::Bad
        );
        assert_eq!(m.next_boot_patch().unwrap().number, 1);
    }

    #[test]
    fn drain_events_returns_bounded_batches_in_order() {
        let temp = TempDir::new().unwrap();
        let mut m = manager(&temp);
        for n in 1..=5 {
            m.queue_event(crate::events::PatchEvent {
                app_id: "app".to_string(),
                client_id: m.client_id().to_string(),
                release_version: "1.0.0+1".to_string(),
                patch_number: n,
                platform: "linux".to_string(),
                arch: "x86_64".to_string(),
                identifier: crate::events::EventType::PatchInstallFailure,
                timestamp: 0,
            });
        }
        let batch = m.drain_events(3);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].patch_number, 1);
        assert_eq!(m.document().queued_events.len(), 2);
    }
}
