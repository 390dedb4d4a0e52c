/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Native window-handle extraction through JAWT
//!
//! The managed runtime ships an interop library (`libjawt.so`) exposing the
//! drawing surface behind an AWT component. This module loads it from one
//! of two `$JAVA_HOME`-relative locations, resolves the single
//! `JAWT_GetAWT` entry point, and walks the drawing-surface protocol to
//! read the X11 window id. The surface lock and the surface itself are RAII
//! guards, so both are released on every exit path, including the partial
//! failure branches. The library handle is scoped to the call; nothing
//! stays loaded process-wide.

use jni::sys::{jboolean, jint, jobject, JNIEnv as RawJNIEnv, JNI_FALSE};
use libloading::{Library, Symbol};
use log::debug;
use std::ffi::c_void;
use std::os::raw::c_ulong;
use std::path::{Path, PathBuf};
use std::ptr;
use thiserror::Error;

/// JAWT interface version requested from the toolkit
pub const JAWT_VERSION_1_3: jint = 0x0001_0003;

const JAWT_LOCK_ERROR: jint = 0x0000_0001;

/// Errors from window-handle extraction
#[derive(Debug, Error)]
pub enum JawtError {
    #[error("JAVA_HOME is not set")]
    NoJavaHome,

    #[error("no JAWT library found under {0}")]
    LibraryNotFound(PathBuf),

    #[error("failed to load JAWT library: {0}")]
    LoadFailed(#[from] libloading::Error),

    #[error("toolkit rejected JAWT version {0:#x}")]
    UnsupportedVersion(jint),

    #[error("component has no drawing surface")]
    NoDrawingSurface,

    #[error("drawing surface lock failed")]
    LockFailed,

    #[error("drawing surface has no platform info")]
    NoSurfaceInfo,
}

type JawtGetAwtFn = unsafe extern "system" fn(*mut RawJNIEnv, *mut Jawt) -> jboolean;

type GetDrawingSurfaceFn =
    unsafe extern "system" fn(*mut RawJNIEnv, jobject) -> *mut JawtDrawingSurface;
type FreeDrawingSurfaceFn = unsafe extern "system" fn(*mut JawtDrawingSurface);
type LockFn = unsafe extern "system" fn(*mut JawtDrawingSurface) -> jint;
type GetSurfaceInfoFn =
    unsafe extern "system" fn(*mut JawtDrawingSurface) -> *mut JawtDrawingSurfaceInfo;
type FreeSurfaceInfoFn = unsafe extern "system" fn(*mut JawtDrawingSurfaceInfo);
type UnlockFn = unsafe extern "system" fn(*mut JawtDrawingSurface);

#[repr(C)]
struct Jawt {
    version: jint,
    get_drawing_surface: Option<GetDrawingSurfaceFn>,
    free_drawing_surface: Option<FreeDrawingSurfaceFn>,
    // JAWT 1.4 additions, unused at version 1.3
    lock: *mut c_void,
    unlock: *mut c_void,
    get_component: *mut c_void,
}

#[repr(C)]
struct JawtDrawingSurface {
    env: *mut RawJNIEnv,
    target: jobject,
    lock: Option<LockFn>,
    get_drawing_surface_info: Option<GetSurfaceInfoFn>,
    free_drawing_surface_info: Option<FreeSurfaceInfoFn>,
    unlock: Option<UnlockFn>,
}

#[repr(C)]
struct JawtRectangle {
    x: jint,
    y: jint,
    width: jint,
    height: jint,
}

#[repr(C)]
struct JawtDrawingSurfaceInfo {
    platform_info: *mut c_void,
    ds: *mut JawtDrawingSurface,
    bounds: JawtRectangle,
    clip_size: jint,
    clip: *mut JawtRectangle,
}

#[repr(C)]
struct JawtX11DrawingSurfaceInfo {
    drawable: c_ulong,
    display: *mut c_void,
    visual_id: c_ulong,
    colormap_id: c_ulong,
    depth: jint,
}

/// The two installation-relative locations of the interop library, in
/// probe order
fn library_candidates(java_home: &Path) -> [PathBuf; 2] {
    [
        java_home.join("lib").join("libjawt.so"),
        java_home.join("jre").join("lib").join("libjawt.so"),
    ]
}

fn load_library() -> Result<Library, JawtError> {
    let java_home = std::env::var_os("JAVA_HOME").ok_or(JawtError::NoJavaHome)?;
    let java_home = PathBuf::from(java_home);

    for candidate in library_candidates(&java_home) {
        if candidate.exists() {
            debug!("loading JAWT library: {}", candidate.display());
            return Ok(unsafe { Library::new(&candidate) }?);
        }
    }
    Err(JawtError::LibraryNotFound(java_home))
}

/// Extract the native X11 window handle backing an AWT component.
///
/// `env` and `target` must be the live JNI environment and a local
/// reference to a realized AWT component, exactly as delivered to a JNI
/// entry point.
pub fn native_window_handle(env: *mut RawJNIEnv, target: jobject) -> Result<u64, JawtError> {
    let library = load_library()?;
    let get_awt: Symbol<JawtGetAwtFn> = unsafe { library.get(b"JAWT_GetAWT\0")? };

    let mut awt = Jawt {
        version: JAWT_VERSION_1_3,
        get_drawing_surface: None,
        free_drawing_surface: None,
        lock: ptr::null_mut(),
        unlock: ptr::null_mut(),
        get_component: ptr::null_mut(),
    };
    if unsafe { get_awt(env, &mut awt) } == JNI_FALSE {
        return Err(JawtError::UnsupportedVersion(JAWT_VERSION_1_3));
    }

    let get_surface = awt
        .get_drawing_surface
        .ok_or(JawtError::NoDrawingSurface)?;
    let ds = unsafe { get_surface(env, target) };
    if ds.is_null() {
        return Err(JawtError::NoDrawingSurface);
    }

    let surface = SurfaceGuard { awt: &awt, ds };
    surface.window_handle()
}

/// Drawing surface released on drop
struct SurfaceGuard<'a> {
    awt: &'a Jawt,
    ds: *mut JawtDrawingSurface,
}

impl SurfaceGuard<'_> {
    fn window_handle(&self) -> Result<u64, JawtError> {
        let ds = unsafe { &*self.ds };

        let lock = ds.lock.ok_or(JawtError::LockFailed)?;
        let flags = unsafe { lock(self.ds) };
        if flags & JAWT_LOCK_ERROR != 0 {
            return Err(JawtError::LockFailed);
        }
        // Dropped before the surface guard, after the info guard below.
        let _unlock = LockGuard { ds: self.ds };

        let get_info = ds
            .get_drawing_surface_info
            .ok_or(JawtError::NoSurfaceInfo)?;
        let dsi = unsafe { get_info(self.ds) };
        if dsi.is_null() {
            return Err(JawtError::NoSurfaceInfo);
        }
        let _info = InfoGuard {
            free: ds.free_drawing_surface_info,
            dsi,
        };

        let platform =
            unsafe { (*dsi).platform_info } as *const JawtX11DrawingSurfaceInfo;
        if platform.is_null() {
            return Err(JawtError::NoSurfaceInfo);
        }
        let drawable = unsafe { (*platform).drawable };
        debug!("drawing surface window handle: {:#x}", drawable);
        Ok(drawable as u64)
    }
}

impl Drop for SurfaceGuard<'_> {
    fn drop(&mut self) {
        if let Some(free) = self.awt.free_drawing_surface {
            unsafe { free(self.ds) };
        }
    }
}

struct LockGuard {
    ds: *mut JawtDrawingSurface,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        unsafe {
            if let Some(unlock) = (*self.ds).unlock {
                unlock(self.ds);
            }
        }
    }
}

struct InfoGuard {
    free: Option<FreeSurfaceInfoFn>,
    dsi: *mut JawtDrawingSurfaceInfo,
}

impl Drop for InfoGuard {
    fn drop(&mut self) {
        if let Some(free) = self.free {
            unsafe { free(self.dsi) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_probe_order_is_lib_then_jre_lib() {
        let candidates = library_candidates(Path::new("/opt/jdk"));
        assert_eq!(candidates[0], PathBuf::from("/opt/jdk/lib/libjawt.so"));
        assert_eq!(
            candidates[1],
            PathBuf::from("/opt/jdk/jre/lib/libjawt.so")
        );
    }

    #[test]
    fn missing_library_error_names_the_searched_home() {
        let err = JawtError::LibraryNotFound(PathBuf::from("/opt/jdk"));
        assert_eq!(err.to_string(), "no JAWT library found under /opt/jdk");
    }
}
