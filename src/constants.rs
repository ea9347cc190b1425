//! # Patch Engine Constants
//!
//! File-layout names, network endpoints, and resource limits for the patch
//! engine. These constants are the **single source of truth** for the cache
//! directory layout and for the bounds that keep a misbehaving update server
//! from exhausting the host application's resources.
//!
//! ## Cache Layout
//!
//! ```text
//! <cache_dir>/
//! ├── state.json            (boot records, atomic-replaced on every save)
//! ├── downloads/            (staged artifacts, unverified, safe to delete)
//! │   └── 7.tmp-<uuid>
//! └── patches/              (verified artifacts only)
//!     └── 7/
//!         └── patch.bin
//! ```
//!
//! An artifact only ever appears under `patches/` after its checksum has been
//! verified; anything under `downloads/` may be garbage from an interrupted
//! run and is reclaimed on the next update attempt.

use std::time::Duration;

// =============================================================================
// Cache Layout
// =============================================================================

/// File name of the persisted boot-record document, relative to the cache dir.
pub const STATE_FILE_NAME: &str = "state.json";

/// Directory holding one subdirectory per verified patch number.
pub const PATCHES_DIR_NAME: &str = "patches";

/// Directory holding staged, not-yet-verified downloads.
pub const DOWNLOADS_DIR_NAME: &str = "downloads";

/// File name of the bootable artifact inside a patch directory.
pub const PATCH_ARTIFACT_FILE_NAME: &str = "patch.bin";

// =============================================================================
// Update Service Endpoints
// =============================================================================

/// Default update service base URL, overridable via the settings document.
pub const DEFAULT_BASE_URL: &str = "https://api.hotpatch.example";

/// Default release channel when the settings document does not name one.
pub const DEFAULT_CHANNEL: &str = "stable";

/// Path of the patch-check endpoint, relative to the base URL.
pub const PATCH_CHECK_PATH: &str = "/api/v1/patches/check";

/// Path of the patch-event reporting endpoint, relative to the base URL.
pub const PATCH_EVENTS_PATH: &str = "/api/v1/patches/events";

// =============================================================================
// Limits
// =============================================================================

/// Maximum size of a downloaded patch artifact (512 MiB).
///
/// **Security**: bounds disk and memory usage from a malicious or
/// misconfigured update server. Real patch artifacts are a few hundred
/// kilobytes.
pub const MAX_PATCH_SIZE: u64 = 512 * 1024 * 1024;

/// Timeout applied to every network operation against the update service.
///
/// The engine runs inside someone else's app; a hung request must never hold
/// the update lock forever.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum number of queued events sent per update run.
///
/// Events beyond this batch stay queued; the cap keeps a backlog of launch
/// failures from stalling the update pipeline behind event traffic.
pub const MAX_EVENT_BATCH: usize = 3;

/// Maximum number of events retained in the persisted queue.
pub const MAX_QUEUED_EVENTS: usize = 16;

/// Maximum number of launch attempts retained in the persisted history.
pub const MAX_ATTEMPT_HISTORY: usize = 32;

/// Number of newer Downloaded generations that must supersede a patch before
/// its artifact is garbage-collected.
///
/// Keeping one generation behind the newest preserves the rollback target.
pub const GC_KEEP_GENERATIONS: u64 = 2;
