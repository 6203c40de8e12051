//! C FFI surface for cadenza.
//!
//! Pattern: opaque ManagerHandle + C strings + JSON serialization.
//!
//! Swift, Kotlin (JNI), and Dart (`dart:ffi`) hosts call these directly.
//! Every call clears the thread-local last error first; calls that fail
//! return 0 or NULL and leave a message for `cadenza_last_error`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use cadenza_core::assets::DirLocator;
use cadenza_core::effects::memory::MemoryFactory;
use cadenza_core::effects::PlayerFactory;
use cadenza_core::prefs::ShellPreferences;
use cadenza_core::{MusicCommand, MusicManager};

// ---------------------------------------------------------------------------
// Error handling (thread-local last error)
// ---------------------------------------------------------------------------

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_error(msg: String) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = Some(msg));
}

fn clear_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

/// Returns the last error message (caller frees with `cadenza_string_free`).
#[no_mangle]
pub extern "C" fn cadenza_last_error() -> *mut c_char {
    LAST_ERROR.with(|cell| {
        cell.borrow_mut()
            .take()
            .and_then(|s| CString::new(s).ok())
            .map(|s| s.into_raw())
            .unwrap_or(ptr::null_mut())
    })
}

/// Frees a string returned from cadenza FFI.
///
/// # Safety
/// Must be a pointer returned from this FFI and not already freed.
#[no_mangle]
pub unsafe extern "C" fn cadenza_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

// ---------------------------------------------------------------------------
// Opaque handle
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct ManagerHandle {
    _private: [u8; 0],
}

struct ManagerHandleInner {
    manager: MusicManager,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Sets the 9S storage root directory (where the mute flag persists).
///
/// # Safety
/// `path` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn cadenza_set_root(path: *const c_char) -> i32 {
    clear_error();
    match read_cstr(path) {
        Ok(p) => {
            std::env::set_var("NINE_S_ROOT", p);
            1
        }
        Err(e) => {
            set_error(e);
            0
        }
    }
}

/// Opens a manager with native audio output over `assets_dir`.
/// Returns an opaque handle, or NULL on error.
///
/// # Safety
/// `app_id` and `assets_dir` must be valid null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn cadenza_open(app_id: *const c_char, assets_dir: *const c_char) -> *mut ManagerHandle {
    clear_error();
    open_with(app_id, assets_dir, || -> Arc<dyn PlayerFactory> {
        Arc::new(cadenza_core::effects::audio::NativeFactory::new())
    })
}

/// Opens a manager whose players are silent in-memory stand-ins.
/// Useful for hosts without an audio device and for tests.
///
/// # Safety
/// `app_id` and `assets_dir` must be valid null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn cadenza_open_headless(
    app_id: *const c_char,
    assets_dir: *const c_char,
) -> *mut ManagerHandle {
    clear_error();
    open_with(app_id, assets_dir, || -> Arc<dyn PlayerFactory> {
        Arc::new(MemoryFactory::new())
    })
}

fn open_with(
    app_id: *const c_char,
    assets_dir: *const c_char,
    factory: impl FnOnce() -> Arc<dyn PlayerFactory>,
) -> *mut ManagerHandle {
    let app = match read_cstr(app_id) {
        Ok(a) => a,
        Err(e) => {
            set_error(e);
            return ptr::null_mut();
        }
    };
    let dir = match read_cstr(assets_dir) {
        Ok(d) => d,
        Err(e) => {
            set_error(e);
            return ptr::null_mut();
        }
    };

    match ShellPreferences::open(&app) {
        Ok(prefs) => {
            let manager = MusicManager::new(factory(), Arc::new(DirLocator::new(dir)), Arc::new(prefs));
            Box::into_raw(Box::new(ManagerHandleInner { manager })) as *mut ManagerHandle
        }
        Err(e) => {
            set_error(e.to_string());
            ptr::null_mut()
        }
    }
}

/// Stops all tracks and releases the manager.
#[no_mangle]
pub extern "C" fn cadenza_close(handle: *mut ManagerHandle) {
    if !handle.is_null() {
        unsafe {
            let inner = Box::from_raw(handle as *mut ManagerHandleInner);
            inner.manager.stop_and_reset_all();
        }
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Register tracks. `ids_json` is a JSON array of track names.
/// Returns the setup report JSON (caller frees), or NULL on error.
#[no_mangle]
pub extern "C" fn cadenza_setup(handle: *mut ManagerHandle, ids_json: *const c_char) -> *mut c_char {
    clear_error();
    let manager = match manager_ref(handle) {
        Ok(m) => m,
        Err(e) => return err_null(e),
    };
    let json_str = match read_cstr(ids_json) {
        Ok(s) => s,
        Err(e) => return err_null(e),
    };
    let ids: Vec<String> = match serde_json::from_str(&json_str) {
        Ok(v) => v,
        Err(e) => return err_null(e.to_string()),
    };
    json_to_cstr(&manager.setup(&ids))
}

// ---------------------------------------------------------------------------
// Playback commands
// ---------------------------------------------------------------------------

/// Play a registered track. Unknown ids are ignored.
/// Returns 1 on success, 0 on error (null handle, bad string).
#[no_mangle]
pub extern "C" fn cadenza_play(handle: *mut ManagerHandle, id: *const c_char) -> i32 {
    clear_error();
    let manager = match manager_ref(handle) {
        Ok(m) => m,
        Err(e) => return err_zero(e),
    };
    match read_cstr(id) {
        Ok(id) => {
            manager.play(&id);
            1
        }
        Err(e) => err_zero(e),
    }
}

/// Set the volume of every track (0.0 to 1.0). Ignored while muted.
#[no_mangle]
pub extern "C" fn cadenza_set_volume(handle: *mut ManagerHandle, volume: f32) -> i32 {
    with_manager(handle, |m| m.set_volume(volume))
}

#[no_mangle]
pub extern "C" fn cadenza_reset_volume(handle: *mut ManagerHandle) -> i32 {
    with_manager(handle, MusicManager::reset_volume)
}

#[no_mangle]
pub extern "C" fn cadenza_pause(handle: *mut ManagerHandle) -> i32 {
    with_manager(handle, MusicManager::pause)
}

#[no_mangle]
pub extern "C" fn cadenza_resume(handle: *mut ManagerHandle) -> i32 {
    with_manager(handle, MusicManager::resume)
}

#[no_mangle]
pub extern "C" fn cadenza_stop_and_reset_all(handle: *mut ManagerHandle) -> i32 {
    with_manager(handle, MusicManager::stop_and_reset_all)
}

/// Persist and apply the mute flag. `muted` is 0 or non-zero.
#[no_mangle]
pub extern "C" fn cadenza_set_muted(handle: *mut ManagerHandle, muted: i32) -> i32 {
    with_manager(handle, |m| m.set_muted(muted != 0))
}

/// Returns 1 if muted, 0 if not, -1 on error.
#[no_mangle]
pub extern "C" fn cadenza_is_muted(handle: *mut ManagerHandle) -> i32 {
    clear_error();
    match manager_ref(handle) {
        Ok(m) => m.is_muted() as i32,
        Err(e) => {
            set_error(e);
            -1
        }
    }
}

/// Send a command. `json` is a MusicCommand JSON.
/// Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn cadenza_command(handle: *mut ManagerHandle, json: *const c_char) -> i32 {
    clear_error();
    let manager = match manager_ref(handle) {
        Ok(m) => m,
        Err(e) => return err_zero(e),
    };
    let json_str = match read_cstr(json) {
        Ok(s) => s,
        Err(e) => return err_zero(e),
    };
    let cmd: MusicCommand = match serde_json::from_str(&json_str) {
        Ok(v) => v,
        Err(e) => return err_zero(e.to_string()),
    };
    manager.apply(cmd);
    1
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Selected track id (caller frees). NULL when nothing is selected or on
/// error; check `cadenza_last_error` to tell them apart.
#[no_mangle]
pub extern "C" fn cadenza_currently_playing(handle: *mut ManagerHandle) -> *mut c_char {
    clear_error();
    let manager = match manager_ref(handle) {
        Ok(m) => m,
        Err(e) => return err_null(e),
    };
    match manager.currently_playing() {
        Some(id) => to_cstr(id.into()),
        None => ptr::null_mut(),
    }
}

/// Full manager snapshot as JSON (caller frees).
#[no_mangle]
pub extern "C" fn cadenza_state(handle: *mut ManagerHandle) -> *mut c_char {
    clear_error();
    let manager = match manager_ref(handle) {
        Ok(m) => m,
        Err(e) => return err_null(e),
    };
    json_to_cstr(&manager.snapshot())
}

/// ABI version. Bumped whenever a signature changes.
#[no_mangle]
pub extern "C" fn cadenza_version() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn manager_ref<'a>(handle: *mut ManagerHandle) -> Result<&'a MusicManager, String> {
    if handle.is_null() {
        return Err("null manager handle".into());
    }
    let inner = unsafe { &*(handle as *mut ManagerHandleInner) };
    Ok(&inner.manager)
}

fn with_manager(handle: *mut ManagerHandle, f: impl FnOnce(&MusicManager)) -> i32 {
    clear_error();
    match manager_ref(handle) {
        Ok(m) => {
            f(m);
            1
        }
        Err(e) => err_zero(e),
    }
}

fn read_cstr(ptr: *const c_char) -> Result<String, String> {
    if ptr.is_null() {
        return Err("null string pointer".into());
    }
    unsafe {
        CStr::from_ptr(ptr)
            .to_str()
            .map(String::from)
            .map_err(|_| "invalid utf-8".into())
    }
}

fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => to_cstr(json),
        Err(e) => err_null(e.to_string()),
    }
}

fn to_cstr(s: String) -> *mut c_char {
    CString::new(s)
        .map(|c| c.into_raw())
        .unwrap_or(ptr::null_mut())
}

fn err_null(msg: String) -> *mut c_char {
    log::debug!("cadenza-ffi: {}", msg);
    set_error(msg);
    ptr::null_mut()
}

fn err_zero(msg: String) -> i32 {
    log::debug!("cadenza-ffi: {}", msg);
    set_error(msg);
    0
}

// ---------------------------------------------------------------------------
// FFI Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    struct Ffi {
        _root: TempDir,
        _sounds: TempDir,
        handle: *mut ManagerHandle,
        _guard: std::sync::MutexGuard<'static, ()>,
    }

    /// Open a headless manager via FFI over a temp sound directory.
    fn ffi_manager(app: &str, files: &[&str]) -> Ffi {
        let guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        let root = TempDir::new().expect("tempdir");
        let sounds = TempDir::new().expect("tempdir");
        for file in files {
            std::fs::write(sounds.path().join(file), b"").unwrap();
        }
        let root_c = c(root.path().to_str().unwrap());
        let sounds_c = c(sounds.path().to_str().unwrap());
        let app_c = c(app);
        unsafe {
            cadenza_set_root(root_c.as_ptr());
            let handle = cadenza_open_headless(app_c.as_ptr(), sounds_c.as_ptr());
            assert!(!handle.is_null(), "cadenza_open_headless returned null");
            Ffi {
                _root: root,
                _sounds: sounds,
                handle,
                _guard: guard,
            }
        }
    }

    /// Read a *mut c_char into a String and free it.
    fn read_ffi_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null(), "FFI returned null string");
        let s = unsafe { CStr::from_ptr(ptr).to_str().unwrap().to_string() };
        unsafe { cadenza_string_free(ptr) };
        s
    }

    fn state(handle: *mut ManagerHandle) -> serde_json::Value {
        serde_json::from_str(&read_ffi_string(cadenza_state(handle))).unwrap()
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    // -------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------

    #[test]
    fn ffi_version() {
        assert_eq!(cadenza_version(), 1);
    }

    #[test]
    fn ffi_open_close_lifecycle() {
        let ffi = ffi_manager("ffi-lifecycle", &[]);
        cadenza_close(ffi.handle);
    }

    #[test]
    fn ffi_null_handle_returns_error() {
        assert_eq!(cadenza_pause(ptr::null_mut()), 0);
        let msg = read_ffi_string(cadenza_last_error());
        assert!(msg.contains("null"));

        let ptr = cadenza_state(ptr::null_mut());
        assert!(ptr.is_null());
        assert_eq!(cadenza_is_muted(ptr::null_mut()), -1);
    }

    #[test]
    fn ffi_string_free_null_safe() {
        unsafe { cadenza_string_free(ptr::null_mut()) };
    }

    // -------------------------------------------------------------------
    // Setup & playback
    // -------------------------------------------------------------------

    #[test]
    fn ffi_setup_reports_missing() {
        let ffi = ffi_manager("ffi-setup", &["menu.mp3"]);
        let ids = c(r#"["menu","boss"]"#);

        let report: serde_json::Value =
            serde_json::from_str(&read_ffi_string(cadenza_setup(ffi.handle, ids.as_ptr()))).unwrap();
        assert_eq!(report["loaded"], serde_json::json!(["menu"]));
        assert_eq!(report["missing"], serde_json::json!(["boss"]));

        cadenza_close(ffi.handle);
    }

    #[test]
    fn ffi_setup_rejects_bad_json() {
        let ffi = ffi_manager("ffi-setup-bad", &[]);
        let ids = c("not json");
        assert!(cadenza_setup(ffi.handle, ids.as_ptr()).is_null());
        read_ffi_string(cadenza_last_error());
        cadenza_close(ffi.handle);
    }

    #[test]
    fn ffi_menu_game_scenario() {
        let ffi = ffi_manager("ffi-scenario", &["menu.mp3", "game.wav"]);
        let ids = c(r#"["menu","game"]"#);
        read_ffi_string(cadenza_setup(ffi.handle, ids.as_ptr()));

        assert!(cadenza_currently_playing(ffi.handle).is_null());

        let menu = c("menu");
        assert_eq!(cadenza_play(ffi.handle, menu.as_ptr()), 1);
        assert_eq!(read_ffi_string(cadenza_currently_playing(ffi.handle)), "menu");

        let game = c("game");
        cadenza_play(ffi.handle, game.as_ptr());
        let s = state(ffi.handle);
        assert_eq!(s["selection"]["id"], "game");
        let playing: Vec<&str> = s["tracks"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|t| t["playing"] == true)
            .map(|t| t["id"].as_str().unwrap())
            .collect();
        assert_eq!(playing, vec!["game"]);

        cadenza_pause(ffi.handle);
        assert_eq!(state(ffi.handle)["paused"], true);
        cadenza_resume(ffi.handle);
        assert_eq!(state(ffi.handle)["paused"], false);

        cadenza_stop_and_reset_all(ffi.handle);
        assert!(cadenza_currently_playing(ffi.handle).is_null());
        assert_eq!(state(ffi.handle)["selection"]["kind"], "nothing");

        cadenza_close(ffi.handle);
    }

    #[test]
    fn ffi_volume_and_mute() {
        let ffi = ffi_manager("ffi-volume", &["menu.mp3"]);
        let ids = c(r#"["menu"]"#);
        read_ffi_string(cadenza_setup(ffi.handle, ids.as_ptr()));

        cadenza_set_volume(ffi.handle, 0.5);
        assert_eq!(state(ffi.handle)["tracks"][0]["volume"], 0.5);

        assert_eq!(cadenza_is_muted(ffi.handle), 0);
        cadenza_set_muted(ffi.handle, 1);
        assert_eq!(cadenza_is_muted(ffi.handle), 1);
        assert_eq!(state(ffi.handle)["tracks"][0]["volume"], 0.0);

        cadenza_set_muted(ffi.handle, 0);
        assert_eq!(state(ffi.handle)["tracks"][0]["volume"], 0.5);

        cadenza_reset_volume(ffi.handle);
        assert_eq!(state(ffi.handle)["volume"], 1.0);

        cadenza_close(ffi.handle);
    }

    #[test]
    fn ffi_command_json() {
        let ffi = ffi_manager("ffi-command", &["menu.mp3"]);
        let ids = c(r#"["menu"]"#);
        read_ffi_string(cadenza_setup(ffi.handle, ids.as_ptr()));

        let play = c(r#"{"action":"play","id":"menu"}"#);
        assert_eq!(cadenza_command(ffi.handle, play.as_ptr()), 1);
        assert_eq!(state(ffi.handle)["selection"]["id"], "menu");

        let bad = c(r#"{"action":"rewind"}"#);
        assert_eq!(cadenza_command(ffi.handle, bad.as_ptr()), 0);
        read_ffi_string(cadenza_last_error());

        cadenza_close(ffi.handle);
    }
}
