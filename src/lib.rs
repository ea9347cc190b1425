//! # hotpatch
//!
//! **Embeddable Over-the-Air Code Patch Engine**
//!
//! This crate lets a native application swap in field-updatable executable
//! "patches" without redeploying through an app store, while guaranteeing
//! the app never gets stuck on a broken patch. It tracks which patch should
//! boot next, downloads and verifies new patches in the background, and
//! rolls back to the last known-good patch (or the bundled baseline) when a
//! freshly booted patch fails to launch.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           hotpatch                                  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │                  Updater (facade + C ABI)                   │    │
//! │  │  check_for_update │ update │ start_update_thread            │    │
//! │  │  report_launch_start → report_launch_success|failure        │    │
//! │  └──────────────┬───────────────────────────┬──────────────────┘    │
//! │                 │                           │                       │
//! │  ┌──────────────┴────────────┐   ┌──────────┴──────────────────┐    │
//! │  │     Update Pipeline       │   │   Patch State Machine       │    │
//! │  │  Remote (HTTP) → Download │   │  PatchManager + Tracker     │    │
//! │  │  → inflate/diff → verify  │   │  commit │ promote │ rollback│    │
//! │  └──────────────┬────────────┘   └──────────┬──────────────────┘    │
//! │                 │                           │                       │
//! │  ┌──────────────┴───────────────────────────┴──────────────────┐    │
//! │  │                  Durable Boot Records                       │    │
//! │  │  state.json (atomic replace) │ patches/<n>/patch.bin        │    │
//! │  └─────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Patch Lifecycle
//!
//! ```text
//!                          ┌────────────────────┐
//!                          ▼                    │ launch failure
//!  Discovered ──► Downloading ──► Downloaded ──►│ (rollback to best
//!                      │              │         │  older patch or
//!                      ▼              ▼         │  baseline)
//!              VerificationFailed    Bad ◄──────┘
//!               (never bootable)  (terminal)
//! ```
//!
//! Two boot pointers drive the engine: `current` (the patch this process
//! actually loaded) and `next` (the patch the next process start will
//! load). A committed patch becomes `next`; `report_launch_start` promotes
//! `next` to `current`; `report_launch_failure` marks `current` Bad and
//! rolls `next` back. The bundled baseline executable is the rollback
//! floor and is assumed always launchable.
//!
//! # Key Safety Properties
//!
//! - **Verified before bootable**: an artifact only reaches the patches
//!   directory after its sha256 matches the server-announced checksum; a
//!   corrupt download can never become eligible to boot.
//! - **Crash-safe state**: the boot-record document is replaced atomically
//!   (temp file + rename); a crash mid-save leaves the previous document.
//! - **At most one update in flight**: concurrent `update()` calls
//!   coalesce; the engine never runs two download/commit sequences at once.
//! - **Never crash the host**: every boundary operation reports failure
//!   through return values; out-of-order launch reports are ignored, not
//!   fatal.
//!
//! # Example
//!
//! ```rust,ignore
//! use hotpatch::{AppConfig, Updater};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(Updater::new(
//!     AppConfig {
//!         release_version: "1.0.0+5".to_string(),
//!         original_artifact_paths: vec!["/bundle/app.bin".to_string()],
//!         cache_dir: "/data/app/hotpatch".to_string(),
//!     },
//!     "app_id: my-app\nchannel: stable",
//! )?);
//!
//! engine.report_launch_start()?;
//! if let Some(patch) = engine.current_boot_patch() {
//!     println!("running patch {} from {:?}", patch.number, patch.path);
//! }
//! Arc::clone(&engine).start_update_thread();
//! // ... later, once the app is known healthy:
//! engine.report_launch_success()?;
//! # Ok::<(), hotpatch::Error>(())
//! ```
//!
//! Embedding from C goes through the `hotpatch_*` functions in [`ffi`],
//! which delegate to a one-shot process-global engine.

pub mod config;
pub mod constants;
pub mod diff;
pub mod download;
pub mod error;
pub mod events;
pub mod ffi;
pub mod manager;
pub mod remote;
pub mod service;
pub mod signing;
pub mod store;
pub mod tracker;

// Re-exports
pub use config::{AppConfig, Settings, UpdateConfig};
pub use constants::*;
pub use download::{Downloader, StagedPatch};
pub use error::{Error, Result};
pub use events::{EventType, PatchEvent};
pub use manager::{PatchInfo, PatchManager};
pub use remote::{
    ArtifactEncoding, HttpRemote, PatchCheckRequest, PatchCheckResponse, PatchMetadata, Remote,
};
pub use service::{engine, init, UpdateStatus, Updater};
pub use store::{
    BootRecordStore, BootState, LaunchAttempt, LaunchOutcome, PatchRecord, PatchStatus,
    StateDocument,
};
pub use tracker::{LaunchPhase, LaunchTracker};

#[cfg(any(test, feature = "testing"))]
pub use service::testing_reset_engine;
