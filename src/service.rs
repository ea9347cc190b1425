//! # Update Service Facade
//!
//! [`Updater`] is the externally callable surface: it owns the validated
//! configuration, the patch state machine, the launch tracker, and the
//! transport, and orchestrates them for the check / update / background
//! update operations.
//!
//! ## Concurrency Model
//!
//! The host may call in from any thread. Two locks, never held together
//! across I/O:
//!
//! - `state` guards the in-memory patch state. Critical sections are
//!   bounded: queries copy out what they need and release; no network or
//!   disk happens while a query holds it.
//! - `update_lock` serializes the update pipeline. At most one
//!   check→fetch→verify→commit sequence runs per process; a second caller
//!   gets [`UpdateStatus::AlreadyInProgress`] immediately instead of a
//!   second download (see DESIGN.md for the Open Question resolution).
//!
//! There is no mid-flight cancellation: an update runs to completion,
//! success, or error. A process exit mid-download is recoverable because
//! nothing is committed before verification.
//!
//! ## Process-Global Instance
//!
//! The engine is an explicit object with an explicit init lifecycle; the
//! single process-global slot exists only for the C boundary, guarded by a
//! one-shot, lock-protected assignment. Re-initialization is rejected
//! without touching the live instance.

use crate::config::{AppConfig, Settings, UpdateConfig};
use crate::constants::MAX_EVENT_BATCH;
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::events::{EventType, PatchEvent};
use crate::manager::{PatchInfo, PatchManager};
use crate::remote::{HttpRemote, PatchCheckRequest, Remote};
use crate::store::PatchStatus;
use crate::tracker::LaunchTracker;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use tracing::{error, info, warn};

/// Outcome of one `update()` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The update service had nothing newer.
    NoUpdate,
    /// A new patch was downloaded, verified, and committed.
    Installed,
    /// Another update was already in flight; nothing was done.
    AlreadyInProgress,
}

impl Display for UpdateStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateStatus::NoUpdate => write!(f, "no update available"),
            UpdateStatus::Installed => write!(f, "update installed"),
            UpdateStatus::AlreadyInProgress => write!(f, "update already in progress"),
        }
    }
}

struct EngineState {
    manager: PatchManager,
    tracker: LaunchTracker,
}

/// The patch engine: one instance per embedding application.
pub struct Updater {
    config: UpdateConfig,
    remote: Arc<dyn Remote>,
    state: Mutex<EngineState>,
    update_lock: Mutex<()>,
}

impl Updater {
    /// Builds an engine from the caller-supplied config and the compiled-in
    /// settings document, using the HTTP transport.
    pub fn new(app: AppConfig, settings_yaml: &str) -> Result<Self> {
        let settings = Settings::from_yaml(settings_yaml)?;
        let config = UpdateConfig::resolve(app, settings)?;
        let remote = Arc::new(HttpRemote::new(&config.base_url)?);
        Self::with_remote(config, remote)
    }

    /// Builds an engine with a caller-supplied transport. The seam tests
    /// and unusual hosts use.
    pub fn with_remote(config: UpdateConfig, remote: Arc<dyn Remote>) -> Result<Self> {
        let manager = PatchManager::open(&config.cache_dir, &config.release_version);
        info!(
            "patch engine ready: release {} channel {} next_boot={:?}",
            config.release_version,
            config.channel,
            manager.next_boot_patch().map(|p| p.number)
        );
        Ok(Self {
            config,
            remote,
            state: Mutex::new(EngineState {
                manager,
                tracker: LaunchTracker::new(),
            }),
            update_lock: Mutex::new(()),
        })
    }

    /// The immutable engine configuration.
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Whether the host should run the updater automatically on launch.
    pub fn should_auto_update(&self) -> bool {
        self.config.auto_update
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        // A poisoned lock means a panic mid-mutation; the in-memory state
        // is still the best truth available, keep serving it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The patch that will load on the next process start. Answers from
    /// memory; never blocks on network or disk.
    pub fn next_boot_patch(&self) -> Option<PatchInfo> {
        self.state().manager.next_boot_patch()
    }

    /// The patch this process booted from.
    pub fn current_boot_patch(&self) -> Option<PatchInfo> {
        self.state().manager.current_boot_patch()
    }

    /// Asks the update service whether a newer patch exists. Pure query,
    /// mutates nothing on either side.
    pub fn check_for_update(&self) -> Result<bool> {
        let request = {
            let state = self.state();
            PatchCheckRequest::new(&self.config, &state.manager)
        };
        let response = self.remote.check(&request)?;
        Ok(response.patch_available)
    }

    // =========================================================================
    // Update pipeline
    // =========================================================================

    /// Runs the synchronous check→fetch→verify→commit pipeline.
    ///
    /// Returns [`UpdateStatus::AlreadyInProgress`] immediately when another
    /// update holds the pipeline; at most one download/commit sequence runs
    /// per process at any time.
    pub fn update(&self) -> Result<UpdateStatus> {
        let _guard = match self.update_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Ok(UpdateStatus::AlreadyInProgress),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        self.run_update()
    }

    /// Runs the update pipeline on a background thread; never blocks the
    /// caller. Overlap with a concurrent `update()` coalesces the same way.
    pub fn start_update_thread(self: Arc<Self>) {
        let engine = self;
        std::thread::spawn(move || match engine.update() {
            Ok(status) => info!("background update finished: {status}"),
            Err(e) => error!("background update failed: {e}"),
        });
    }

    fn run_update(&self) -> Result<UpdateStatus> {
        self.deliver_queued_events();

        let request = {
            let state = self.state();
            PatchCheckRequest::new(&self.config, &state.manager)
        };
        let response = self.remote.check(&request)?;
        if !response.patch_available {
            return Ok(UpdateStatus::NoUpdate);
        }
        let metadata = response.patch.ok_or_else(|| {
            Error::BadServerResponse("patch_available without patch metadata".to_string())
        })?;

        // Nothing to do when we already hold this patch; refuse outright
        // when it previously failed a launch.
        let known_status = {
            let state = self.state();
            state
                .manager
                .document()
                .patches
                .get(&metadata.number)
                .map(|r| r.status)
        };
        match known_status {
            Some(PatchStatus::Downloaded) => return Ok(UpdateStatus::NoUpdate),
            Some(PatchStatus::Bad) => {
                warn!(
                    "update service offered known-bad patch {}, ignoring",
                    metadata.number
                );
                return Ok(UpdateStatus::NoUpdate);
            }
            _ => {}
        }

        self.state()
            .manager
            .begin_download(metadata.number, &metadata.hash)?;

        // Fetch and verify without holding any engine lock; queries keep
        // answering from the last committed state meanwhile.
        let downloader = Downloader::new(&self.config);
        match downloader.fetch_and_verify(self.remote.as_ref(), &metadata) {
            Ok(staged) => {
                let mut state = self.state();
                state
                    .manager
                    .commit_new_patch(staged.number, &staged.checksum, &staged.path)?;
                Ok(UpdateStatus::Installed)
            }
            Err(
                e @ (Error::Verification { .. } | Error::Delta(_) | Error::Signature(_)),
            ) => {
                self.state().manager.mark_verification_failed(metadata.number);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Sends a bounded batch of queued events. Delivery failures re-queue
    /// nothing: events are telemetry, the patch state machine never depends
    /// on them.
    fn deliver_queued_events(&self) {
        let events = self.state().manager.drain_events(MAX_EVENT_BATCH);
        for event in events {
            if let Err(e) = self.remote.report_event(&event) {
                warn!("failed to report patch event: {e}");
            }
        }
    }

    // =========================================================================
    // Launch reports
    // =========================================================================

    /// Reports that the host is booting. Must precede any success or
    /// failure report in this process run.
    pub fn report_launch_start(&self) -> Result<()> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.tracker.report_start(&mut state.manager)
    }

    /// Reports that the launch succeeded.
    pub fn report_launch_success(&self) -> Result<()> {
        let config = &self.config;
        let mut guard = self.state();
        let state = &mut *guard;
        state.tracker.report_success(&mut state.manager, |manager, number| {
            PatchEvent::new(
                config,
                manager.client_id(),
                number,
                EventType::PatchInstallSuccess,
            )
        })
    }

    /// Reports that the launch failed; the booted patch is marked Bad and
    /// the next boot rolls back.
    pub fn report_launch_failure(&self) -> Result<()> {
        let config = &self.config;
        let mut guard = self.state();
        let state = &mut *guard;
        state.tracker.report_failure(&mut state.manager, |manager, number| {
            PatchEvent::new(
                config,
                manager.client_id(),
                number,
                EventType::PatchInstallFailure,
            )
        })
    }
}

// =============================================================================
// Process-Global Instance (C boundary support)
// =============================================================================

static ENGINE: RwLock<Option<Arc<Updater>>> = RwLock::new(None);

/// One-shot initialization of the process-global engine.
///
/// The first successful call wins; later calls fail with
/// [`Error::AlreadyInitialized`] and never re-validate or re-load over the
/// live instance.
pub fn init(app: AppConfig, settings_yaml: &str) -> Result<()> {
    init_logging();
    let mut slot = ENGINE.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(Error::AlreadyInitialized);
    }
    let engine = Updater::new(app, settings_yaml)?;
    *slot = Some(Arc::new(engine));
    Ok(())
}

/// The process-global engine, if `init` has succeeded.
pub fn engine() -> Result<Arc<Updater>> {
    ENGINE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(Error::NotInitialized)
}

/// Clears the process-global engine. Test support only.
#[cfg(any(test, feature = "testing"))]
pub fn testing_reset_engine() {
    let mut slot = ENGINE.write().unwrap_or_else(PoisonError::into_inner);
    *slot = None;
}

/// Best-effort tracing setup for hosts that embed the engine as a cdylib
/// and have no other hook to install a subscriber. A subscriber installed
/// by the host wins.
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
