//! Launch outcome tracking.
//!
//! One [`LaunchTracker`] exists per process run. It enforces the ordering
//! contract of the launch-report API: start must precede success or
//! failure, and each outcome is attributed to exactly one booted patch.
//! Out-of-order calls are rejected with [`Error::Ordering`] and mutate
//! nothing; the host app must never be crashed by a misplaced report.
//!
//! Separating "start" from "success/failure" lets the host defer the
//! verdict (for example, wait a few seconds after launch) without losing
//! track of which patch it is judging.

use crate::error::{Error, Result};
use crate::events::PatchEvent;
use crate::manager::PatchManager;
use crate::store::LaunchOutcome;
use tracing::{debug, info};

/// Per-process launch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    NotStarted,
    Started,
    Succeeded,
    Failed,
}

/// Records the launch call sequence and feeds outcomes back into the patch
/// state machine.
pub struct LaunchTracker {
    phase: LaunchPhase,
}

impl LaunchTracker {
    pub fn new() -> Self {
        Self {
            phase: LaunchPhase::NotStarted,
        }
    }

    /// Current phase of this process's launch.
    pub fn phase(&self) -> LaunchPhase {
        self.phase
    }

    /// Reports that the host is booting: promotes the next-boot patch to
    /// current and opens its launch attempt.
    pub fn report_start(&mut self, manager: &mut PatchManager) -> Result<()> {
        match self.phase {
            LaunchPhase::NotStarted => {
                manager.promote_next_to_current()?;
                self.phase = LaunchPhase::Started;
                Ok(())
            }
            _ => Err(Error::State(
                "launch start already reported this run".to_string(),
            )),
        }
    }

    /// Reports that the launch succeeded. Idempotent once succeeded.
    ///
    /// Queues an install-success event the first time this patch number
    /// succeeds on this device.
    pub fn report_success(
        &mut self,
        manager: &mut PatchManager,
        event: impl FnOnce(&PatchManager, u64) -> PatchEvent,
    ) -> Result<()> {
        match self.phase {
            LaunchPhase::Started => {
                self.phase = LaunchPhase::Succeeded;
                let Some(number) = manager.resolve_pending_attempt(LaunchOutcome::Succeeded)
                else {
                    // Booted from the baseline; nothing to judge.
                    return Ok(());
                };
                info!("patch {number} launched successfully");
                if first_success_for(manager, number) {
                    let event = event(manager, number);
                    manager.queue_event(event);
                }
                Ok(())
            }
            LaunchPhase::Succeeded => Ok(()),
            LaunchPhase::NotStarted => Err(Error::Ordering(
                "launch success reported before launch start".to_string(),
            )),
            LaunchPhase::Failed => Err(Error::Ordering(
                "launch success reported after failure".to_string(),
            )),
        }
    }

    /// Reports that the launch failed: marks the booted patch Bad and rolls
    /// the next-boot selection back. Idempotent once failed.
    pub fn report_failure(
        &mut self,
        manager: &mut PatchManager,
        event: impl FnOnce(&PatchManager, u64) -> PatchEvent,
    ) -> Result<()> {
        match self.phase {
            LaunchPhase::Started => {
                self.phase = LaunchPhase::Failed;
                let Some(number) = manager.resolve_pending_attempt(LaunchOutcome::Failed) else {
                    debug!("launch failure with no booted patch, nothing to roll back");
                    return Ok(());
                };
                manager.mark_bad_and_rollback(number);
                // Queue rather than send: the host is likely about to abort,
                // the event goes out on the next healthy run.
                let event = event(manager, number);
                manager.queue_event(event);
                Ok(())
            }
            LaunchPhase::Failed => Ok(()),
            LaunchPhase::NotStarted => Err(Error::Ordering(
                "launch failure reported before launch start".to_string(),
            )),
            LaunchPhase::Succeeded => Err(Error::Ordering(
                "launch failure reported after success".to_string(),
            )),
        }
    }
}

impl Default for LaunchTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// True when this is the first recorded success for the patch number.
fn first_success_for(manager: &PatchManager, number: u64) -> bool {
    manager
        .document()
        .attempts
        .iter()
        .filter(|a| a.patch_number == number && a.outcome == LaunchOutcome::Succeeded)
        .count()
        == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use tempfile::TempDir;

    fn fake_event(manager: &PatchManager, number: u64) -> PatchEvent {
        PatchEvent {
            app_id: "app".to_string(),
            client_id: manager.client_id().to_string(),
            release_version: "1.0.0+1".to_string(),
            patch_number: number,
            platform: "linux".to_string(),
            arch: "x86_64".to_string(),
            identifier: EventType::PatchInstallFailure,
            timestamp: 0,
        }
    }

    #[test]
    fn success_before_start_is_an_ordering_error() {
        let temp = TempDir::new().unwrap();
        let mut manager = PatchManager::open(temp.path(), "1.0.0+1");
        let mut tracker = LaunchTracker::new();
        assert!(matches!(
            tracker.report_success(&mut manager, fake_event),
            Err(Error::Ordering(_))
        ));
        assert_eq!(tracker.phase(), LaunchPhase::NotStarted);
    }

    #[test]
    fn failure_before_start_mutates_nothing() {
        let temp = TempDir::new().unwrap();
        let mut manager = PatchManager::open(temp.path(), "1.0.0+1");
        let mut tracker = LaunchTracker::new();
        let before = manager.boot_state();
        assert!(matches!(
            tracker.report_failure(&mut manager, fake_event),
            Err(Error::Ordering(_))
        ));
        assert_eq!(manager.boot_state(), before);
        assert!(manager.document().queued_events.is_empty());
    }

    #[test]
    fn start_then_success_with_no_patch_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let mut manager = PatchManager::open(temp.path(), "1.0.0+1");
        let mut tracker = LaunchTracker::new();
        tracker.report_start(&mut manager).unwrap();
        tracker.report_success(&mut manager, fake_event).unwrap();
        assert_eq!(tracker.phase(), LaunchPhase::Succeeded);
        assert!(manager.document().queued_events.is_empty());
    }

    #[test]
    fn repeated_failure_reports_are_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut manager = PatchManager::open(temp.path(), "1.0.0+1");
        let mut tracker = LaunchTracker::new();
        tracker.report_start(&mut manager).unwrap();
        tracker.report_failure(&mut manager, fake_event).unwrap();
        tracker.report_failure(&mut manager, fake_event).unwrap();
        assert_eq!(tracker.phase(), LaunchPhase::Failed);
    }

    #[test]
    fn second_start_is_a_state_error() {
        let temp = TempDir::new().unwrap();
        let mut manager = PatchManager::open(temp.path(), "1.0.0+1");
        let mut tracker = LaunchTracker::new();
        tracker.report_start(&mut manager).unwrap();
        assert!(matches!(
            tracker.report_start(&mut manager),
            Err(Error::State(_))
        ));
    }
}
