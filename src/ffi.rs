//! C ABI for the patch engine.
//!
//! Thin delegations to the process-global [`Updater`]: each function
//! translates C types at the boundary and forwards to the engine. Intended
//! for language bindings, not for Rust callers.
//!
//! Failure never crosses this boundary as a panic or an unwind. Every
//! function returns a negative value (false, 0, null) on failure and logs
//! the cause; calling anything before a successful `hotpatch_init` is a
//! safe no-op.
//!
//! Strings returned to the caller are owned, independently allocated
//! buffers; the caller releases them with [`hotpatch_free_string`], which
//! is idempotent on null.

#![allow(clippy::missing_safety_doc)] // Safety sections are on each item.

use crate::config::AppConfig;
use crate::service::{self, Updater};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;
use tracing::{error, info};

/// Configuration parameters for the engine, passed to [`hotpatch_init`].
///
/// NOTE: any change to this struct is an ABI break; all language bindings
/// must be updated together.
#[repr(C)]
pub struct HotpatchParameters {
    /// Release version of the running app, required. Patches are scoped
    /// to it. Either a version string or a content hash.
    pub release_version: *const c_char,

    /// Array of paths to the bundled baseline executable, required.
    /// Used to reconstruct diff-encoded downloads and as the rollback
    /// floor.
    pub original_artifact_paths: *const *const c_char,

    /// Length of the `original_artifact_paths` array.
    pub original_artifact_paths_size: libc::c_int,

    /// Directory where the engine keeps persistent state and downloaded
    /// artifacts. Must be writable.
    pub cache_dir: *const c_char,
}

/// Converts a C string to an owned Rust string. Does not take ownership.
fn to_rust(c_string: *const c_char) -> crate::Result<String> {
    if c_string.is_null() {
        return Err(crate::Error::Config {
            field: "string".to_string(),
            reason: "null pointer".to_string(),
        });
    }
    let c_str = unsafe { CStr::from_ptr(c_string) };
    c_str
        .to_str()
        .map(str::to_string)
        .map_err(|e| crate::Error::Config {
            field: "string".to_string(),
            reason: format!("invalid utf-8: {e}"),
        })
}

fn to_rust_vec(array: *const *const c_char, size: libc::c_int) -> crate::Result<Vec<String>> {
    if array.is_null() {
        return Err(crate::Error::Config {
            field: "original_artifact_paths".to_string(),
            reason: "null pointer".to_string(),
        });
    }
    let mut out = Vec::with_capacity(size.max(0) as usize);
    for i in 0..size {
        let entry = unsafe { *array.offset(i as isize) };
        out.push(to_rust(entry)?);
    }
    Ok(out)
}

/// Allocates a C string the caller must release with
/// [`hotpatch_free_string`].
fn allocate_c_string(s: &str) -> crate::Result<*mut c_char> {
    CString::new(s)
        .map(CString::into_raw)
        .map_err(|e| crate::Error::State(format!("string contains interior nul: {e}")))
}

fn app_config_from_c(params: *const HotpatchParameters) -> crate::Result<AppConfig> {
    if params.is_null() {
        return Err(crate::Error::Config {
            field: "parameters".to_string(),
            reason: "null pointer".to_string(),
        });
    }
    let params = unsafe { &*params };
    Ok(AppConfig {
        release_version: to_rust(params.release_version)?,
        original_artifact_paths: to_rust_vec(
            params.original_artifact_paths,
            params.original_artifact_paths_size,
        )?,
        cache_dir: to_rust(params.cache_dir)?,
    })
}

/// Runs `f`, logging any error and substituting `fallback`. The C boundary
/// reports failure through return values, never through unwinding.
fn log_on_error<F, R>(f: F, context: &str, fallback: R) -> R
where
    F: FnOnce() -> crate::Result<R>,
{
    f().unwrap_or_else(|e| {
        error!("error {context}: {e}");
        fallback
    })
}

fn with_engine<F, R>(f: F, context: &str, fallback: R) -> R
where
    F: FnOnce(Arc<Updater>) -> crate::Result<R>,
{
    log_on_error(|| f(service::engine()?), context, fallback)
}

/// Configures the patch engine. The first parameter carries runtime
/// configuration from the host app, the second the YAML settings document
/// compiled into it. Returns true on success; on false the engine is
/// unusable and every other function is a safe no-op.
#[no_mangle]
pub extern "C" fn hotpatch_init(
    params: *const HotpatchParameters,
    settings_yaml: *const c_char,
) -> bool {
    log_on_error(
        || {
            let app = app_config_from_c(params)?;
            let yaml = to_rust(settings_yaml)?;
            service::init(app, &yaml)?;
            Ok(true)
        },
        "initializing patch engine",
        false,
    )
}

/// Whether the host should run the updater automatically on launch.
#[no_mangle]
pub extern "C" fn hotpatch_should_auto_update() -> bool {
    with_engine(
        |engine| Ok(engine.should_auto_update()),
        "fetching update behavior",
        true,
    )
}

/// The patch number that will boot on the next run, or 0 when the baseline
/// will boot. Never blocks on the network.
#[no_mangle]
pub extern "C" fn hotpatch_next_boot_patch_number() -> u64 {
    with_engine(
        |engine| Ok(engine.next_boot_patch().map_or(0, |p| p.number)),
        "fetching next boot patch number",
        0,
    )
}

/// The patch number this process booted from, or 0 for the baseline.
#[no_mangle]
pub extern "C" fn hotpatch_current_boot_patch_number() -> u64 {
    with_engine(
        |engine| Ok(engine.current_boot_patch().map_or(0, |p| p.number)),
        "fetching current boot patch number",
        0,
    )
}

/// The artifact path of the next boot patch, or null when the baseline
/// will boot. The caller owns the string and must release it with
/// [`hotpatch_free_string`].
#[no_mangle]
pub extern "C" fn hotpatch_next_boot_patch_path() -> *mut c_char {
    with_engine(
        |engine| match engine.next_boot_patch() {
            Some(patch) => allocate_c_string(&patch.path.to_string_lossy()),
            None => Ok(std::ptr::null_mut()),
        },
        "fetching next boot patch path",
        std::ptr::null_mut(),
    )
}

/// Releases a string returned by this library. Safe no-op on null.
///
/// # Safety
///
/// A non-null pointer must have been returned by this library and must not
/// be used after this call.
#[no_mangle]
pub unsafe extern "C" fn hotpatch_free_string(c_string: *mut c_char) {
    if c_string.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(c_string) });
}

/// Asks the update service whether a newer patch exists. No side effects.
#[no_mangle]
pub extern "C" fn hotpatch_check_for_update() -> bool {
    with_engine(
        |engine| engine.check_for_update(),
        "checking for update",
        false,
    )
}

/// Synchronously downloads, verifies, and commits an update if available.
#[no_mangle]
pub extern "C" fn hotpatch_update() {
    with_engine(
        |engine| {
            let status = engine.update()?;
            info!("update finished: {status}");
            Ok(())
        },
        "running update",
        (),
    );
}

/// Runs the update pipeline on a background thread; returns immediately.
#[no_mangle]
pub extern "C" fn hotpatch_start_update_thread() {
    with_engine(
        |engine| {
            engine.start_update_thread();
            Ok(())
        },
        "starting update thread",
        (),
    );
}

/// Tells the engine the host is booting from what it reported as the next
/// boot patch. Must be called before reporting launch success or failure.
#[no_mangle]
pub extern "C" fn hotpatch_report_launch_start() {
    with_engine(
        |engine| engine.report_launch_start(),
        "reporting launch start",
        (),
    );
}

/// Reports that the launch failed. The booted patch is marked bad and the
/// next boot rolls back to the best older patch, or to the baseline.
#[no_mangle]
pub extern "C" fn hotpatch_report_launch_failure() {
    with_engine(
        |engine| engine.report_launch_failure(),
        "reporting launch failure",
        (),
    );
}

/// Reports that the launch succeeded.
#[no_mangle]
pub extern "C" fn hotpatch_report_launch_success() {
    with_engine(
        |engine| engine.report_launch_success(),
        "reporting launch success",
        (),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing_reset_engine;
    use serial_test::serial;
    use std::ptr::{null, null_mut};
    use tempfile::TempDir;

    fn c_string(s: &str) -> *mut c_char {
        CString::new(s).unwrap().into_raw()
    }

    fn free_c_string(s: *mut c_char) {
        unsafe { drop(CString::from_raw(s)) };
    }

    struct CParams {
        release_version: *mut c_char,
        cache_dir: *mut c_char,
        paths: Vec<*mut c_char>,
    }

    impl CParams {
        fn new(temp: &TempDir) -> Self {
            Self {
                release_version: c_string("1.0.0+5"),
                cache_dir: c_string(&temp.path().to_string_lossy()),
                paths: vec![c_string("/bundle/app.bin")],
            }
        }

        fn as_parameters(&self) -> HotpatchParameters {
            HotpatchParameters {
                release_version: self.release_version,
                original_artifact_paths: self.paths.as_ptr() as *const *const c_char,
                original_artifact_paths_size: self.paths.len() as libc::c_int,
                cache_dir: self.cache_dir,
            }
        }
    }

    impl Drop for CParams {
        fn drop(&mut self) {
            free_c_string(self.release_version);
            free_c_string(self.cache_dir);
            for p in self.paths.drain(..) {
                free_c_string(p);
            }
        }
    }

    #[serial]
    #[test]
    fn init_with_nulls_fails_without_crashing() {
        testing_reset_engine();
        assert!(!hotpatch_init(null(), null()));
        unsafe { hotpatch_free_string(null_mut()) };
    }

    #[serial]
    #[test]
    fn init_with_bad_yaml_fails() {
        testing_reset_engine();
        let temp = TempDir::new().unwrap();
        let params = CParams::new(&temp);
        let yaml = c_string(": not yaml :");
        assert!(!hotpatch_init(&params.as_parameters(), yaml));
        free_c_string(yaml);
    }

    #[serial]
    #[test]
    fn calls_before_init_are_safe_no_ops() {
        testing_reset_engine();
        assert_eq!(hotpatch_next_boot_patch_number(), 0);
        assert_eq!(hotpatch_current_boot_patch_number(), 0);
        assert_eq!(hotpatch_next_boot_patch_path(), null_mut());
        assert!(!hotpatch_check_for_update());
        hotpatch_update();
        hotpatch_start_update_thread();
        hotpatch_report_launch_start();
        hotpatch_report_launch_success();
        hotpatch_report_launch_failure();
    }

    #[serial]
    #[test]
    fn empty_state_reports_baseline() {
        testing_reset_engine();
        let temp = TempDir::new().unwrap();
        let params = CParams::new(&temp);
        let yaml = c_string("app_id: example-app");
        assert!(hotpatch_init(&params.as_parameters(), yaml));
        free_c_string(yaml);

        assert_eq!(hotpatch_next_boot_patch_number(), 0);
        assert_eq!(hotpatch_current_boot_patch_number(), 0);
        assert_eq!(hotpatch_next_boot_patch_path(), null_mut());
        assert!(hotpatch_should_auto_update());

        // Launch reports with no patch must not crash, in any order.
        hotpatch_report_launch_failure();
        hotpatch_report_launch_start();
        hotpatch_report_launch_success();
    }

    #[serial]
    #[test]
    fn second_init_is_rejected() {
        testing_reset_engine();
        let temp = TempDir::new().unwrap();
        let params = CParams::new(&temp);
        let yaml = c_string("app_id: example-app");
        assert!(hotpatch_init(&params.as_parameters(), yaml));
        assert!(!hotpatch_init(&params.as_parameters(), yaml));
        free_c_string(yaml);
    }
}
