/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Process environment plumbing
//!
//! The managed side cannot mutate its own process environment, so it calls
//! down here. Callers are expected to serialize these calls; nothing in
//! this module synchronizes access to the environment.

use log::debug;
use std::ffi::OsString;
use std::path::Path;

/// Set a process environment variable
pub fn set_env(name: &str, value: &str) {
    debug!("setenv {}={}", name, value);
    std::env::set_var(name, value);
}

/// Prepend a value to a colon-separated path-list variable. An unset or
/// empty variable becomes just the new value.
pub fn pre_append_env(name: &str, value: &str) {
    let combined = match std::env::var_os(name) {
        Some(old) if !old.is_empty() => {
            let mut combined = OsString::from(value);
            combined.push(":");
            combined.push(&old);
            combined
        }
        _ => OsString::from(value),
    };
    debug!("setenv {}={}", name, combined.to_string_lossy());
    std::env::set_var(name, &combined);
}

/// Export a discovered engine home: sets the home variable and makes the
/// engine's shared libraries visible to the dynamic loader.
pub fn register_engine_home(home_var: &str, home: &Path) {
    let home = home.to_string_lossy();
    set_env(home_var, &home);
    pre_append_env("LD_LIBRARY_PATH", &home);
}
