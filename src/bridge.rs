/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! JNI entry points
//!
//! These are the fixed-signature functions the managed runtime resolves
//! after `System.loadLibrary("mozbridge")`. Per the original contract,
//! nothing is thrown across the boundary: every failure is encoded as a
//! null or negative return, with the diagnostic confined to a debug trace.

use jni::objects::{JClass, JObject, JString};
use jni::sys::{jboolean, jint, jstring, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use log::debug;
use std::ptr;

use crate::config::ProfileConfig;
use crate::discovery::BrowserDiscovery;
use crate::profile::{
    self, DirectoryProvider, FilePrefsLoader, GeckoVersion, HomeDirectoryProvider,
    ProfileRegistry,
};
use crate::runtime;

/// Discover the browser engine home directory; null when not found
#[no_mangle]
pub extern "system" fn Java_org_jdesktop_jdic_browser_internal_WebBrowserUtil_nativeGetBrowserPath<
    'local,
>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jstring {
    let discovery = BrowserDiscovery::new();
    let home = match discovery.discover() {
        Some(home) => home,
        None => return ptr::null_mut(),
    };

    match env.new_string(home.to_string_lossy()) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            debug!("failed to materialize browser path string: {}", e);
            ptr::null_mut()
        }
    }
}

/// Extract the native window handle behind an AWT canvas; -1 on failure
#[no_mangle]
pub extern "system" fn Java_org_jdesktop_jdic_browser_WebBrowser_nativeGetWindow<'local>(
    env: JNIEnv<'local>,
    canvas: JObject<'local>,
) -> jint {
    #[cfg(unix)]
    {
        match crate::jawt::native_window_handle(env.get_raw(), canvas.as_raw()) {
            Ok(handle) => handle as jint,
            Err(e) => {
                debug!("window handle extraction failed: {}", e);
                -1
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (env, canvas);
        -1
    }
}

/// Set a process environment variable on behalf of the managed side
#[no_mangle]
pub extern "system" fn Java_org_jdesktop_jdic_init_InitUtility_setEnv<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    name: JString<'local>,
    value: JString<'local>,
) {
    let name: String = match env.get_string(&name) {
        Ok(s) => s.into(),
        Err(e) => {
            debug!("setEnv: bad name argument: {}", e);
            return;
        }
    };
    let value: String = match env.get_string(&value) {
        Ok(s) => s.into(),
        Err(e) => {
            debug!("setEnv: bad value argument: {}", e);
            return;
        }
    };
    runtime::set_env(&name, &value);
}

/// Set up the private profile and migrate preferences; false on failure.
/// `user_agent` is the running engine's user-agent string, used to select
/// the profile-registry interface generation.
#[no_mangle]
pub extern "system" fn Java_org_jdesktop_jdic_browser_internal_WebBrowserUtil_nativeInitializeProfile<
    'local,
>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    user_agent: JString<'local>,
) -> jboolean {
    let user_agent: String = match env.get_string(&user_agent) {
        Ok(s) => s.into(),
        Err(e) => {
            debug!("initializeProfile: bad user agent argument: {}", e);
            return JNI_FALSE;
        }
    };

    let version = match GeckoVersion::from_user_agent(&user_agent) {
        Ok(version) => version,
        Err(e) => {
            debug!("initializeProfile: {}", e);
            return JNI_FALSE;
        }
    };

    let mut dirs = HomeDirectoryProvider::new();
    let root = match dirs.profiles_root() {
        Ok(root) => root,
        Err(e) => {
            debug!("initializeProfile: {}", e);
            return JNI_FALSE;
        }
    };
    let registry = match ProfileRegistry::select(version, &root) {
        Ok(registry) => registry,
        Err(e) => {
            debug!("initializeProfile: {}", e);
            return JNI_FALSE;
        }
    };

    let mut prefs = FilePrefsLoader::new();
    let config = ProfileConfig::default();
    match profile::initialize_profile(&config, &mut dirs, &registry, &mut prefs) {
        Ok(dir) => {
            debug!("private profile ready: {}", dir.display());
            JNI_TRUE
        }
        Err(e) => {
            debug!("initializeProfile: {}", e);
            JNI_FALSE
        }
    }
}
