//! Update service client.
//!
//! Talks to the remote update service: "is there a patch newer than X for
//! release Y", artifact downloads, and event delivery. The wire types live
//! here; the transport sits behind the [`Remote`] trait so the update
//! pipeline can be driven by a fake in tests and so a host with unusual
//! networking can supply its own transport.
//!
//! A check is a pure query: it mutates nothing on either side and is safe
//! to repeat. Transport failures surface as [`Error::Network`] rather than
//! being folded into "no update", so callers can distinguish "up to date"
//! from "could not ask".

use crate::config::{current_arch, current_platform, UpdateConfig};
use crate::constants::{NETWORK_TIMEOUT, PATCH_CHECK_PATH, PATCH_EVENTS_PATH};
use crate::error::{Error, Result};
use crate::events::PatchEvent;
use crate::manager::PatchManager;
use serde::{Deserialize, Serialize};
use tracing::debug;

// =============================================================================
// Wire Types
// =============================================================================

/// The patch-check request body.
#[derive(Debug, Clone, Serialize)]
pub struct PatchCheckRequest {
    pub app_id: String,
    pub channel: String,
    pub release_version: String,
    /// Highest patch number this install has seen, bad patches included;
    /// the server only offers strictly newer patches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_number: Option<u64>,
    pub platform: String,
    pub arch: String,
}

impl PatchCheckRequest {
    /// Builds a request from the engine configuration and current state.
    pub fn new(config: &UpdateConfig, manager: &PatchManager) -> Self {
        Self {
            app_id: config.app_id.clone(),
            channel: config.channel.clone(),
            release_version: config.release_version.clone(),
            patch_number: manager.highest_seen_patch_number(),
            platform: current_platform().to_string(),
            arch: current_arch().to_string(),
        }
    }
}

/// How the downloadable bytes relate to the bootable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactEncoding {
    /// The download is the artifact, byte for byte.
    #[default]
    Full,
    /// The download is gzip-compressed.
    Gzip,
    /// The download is a delta against the bundled baseline executable.
    BaselineDiff,
}

/// Metadata for an available patch, as described by the update service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchMetadata {
    /// Starts at 1 for each release and increases monotonically.
    pub number: u64,
    /// Hex-encoded sha256 of the final, fully reconstructed artifact.
    pub hash: String,
    /// Where to fetch the (possibly encoded) bytes.
    pub download_url: String,
    /// Download descriptor; defaults to a full artifact.
    #[serde(default)]
    pub encoding: ArtifactEncoding,
    /// Base64 signature over `hash`. Required when the engine is
    /// configured with a public key, ignored otherwise.
    #[serde(default)]
    pub hash_signature: Option<String>,
}

/// The patch-check response body.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchCheckResponse {
    pub patch_available: bool,
    #[serde(default)]
    pub patch: Option<PatchMetadata>,
}

// =============================================================================
// Transport
// =============================================================================

/// Transport seam between the update pipeline and the update service.
pub trait Remote: Send + Sync {
    /// Asks the service whether a newer patch exists. Side-effect free.
    fn check(&self, request: &PatchCheckRequest) -> Result<PatchCheckResponse>;

    /// Fetches the artifact bytes at `url`.
    fn download(&self, url: &str) -> Result<Vec<u8>>;

    /// Delivers one queued patch event.
    fn report_event(&self, event: &PatchEvent) -> Result<()>;
}

/// HTTP transport against the configured update service.
pub struct HttpRemote {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpRemote {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(NETWORK_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn check_url(&self) -> String {
        format!("{}{}", self.base_url, PATCH_CHECK_PATH)
    }

    fn events_url(&self) -> String {
        format!("{}{}", self.base_url, PATCH_EVENTS_PATH)
    }
}

/// Maps a response to an error unless it has a success status.
fn ensure_success(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::Network(format!("request failed with status {status}")))
    }
}

impl Remote for HttpRemote {
    fn check(&self, request: &PatchCheckRequest) -> Result<PatchCheckResponse> {
        debug!("patch check request: {request:?}");
        let response = self
            .client
            .post(self.check_url())
            .json(request)
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;
        let response = ensure_success(response)?;
        let parsed: PatchCheckResponse = response
            .json()
            .map_err(|e| Error::BadServerResponse(e.to_string()))?;
        debug!("patch check response: {parsed:?}");
        Ok(parsed)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!("downloading artifact from {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;
        let response = ensure_success(response)?;
        let bytes = response
            .bytes()
            .map_err(|e| Error::Network(e.to_string()))?;
        // Patch artifacts are small; buffering in memory keeps the
        // verify-before-place pipeline simple.
        Ok(bytes.to_vec())
    }

    fn report_event(&self, event: &PatchEvent) -> Result<()> {
        let response = self
            .client
            .post(self.events_url())
            .json(&serde_json::json!({ "event": event }))
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;
        ensure_success(response).map(|_| ())
    }
}
