/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Mozbridge - JNI glue for embedding Mozilla-based browser engines
//!
//! Mozbridge is the native half of a Java desktop-integration library. It
//! is loaded by the managed runtime as a shared object and translates a
//! handful of fixed-signature calls into engine and toolkit operations:
//!
//! - Discovering the browser engine installation on Unix desktops
//!   (environment override, the GConf URL-handler registry, a `PATH` scan,
//!   and launcher-script inspection)
//! - Extracting the native X11 window handle behind an AWT canvas via the
//!   JAWT interop library
//! - Setting up a private engine profile and migrating an allow-listed
//!   subset of the user's preferences into it
//! - Environment-variable plumbing on behalf of the managed side
//!
//! # Engine discovery order
//!
//! 1. `MOZILLA_FIVE_HOME` environment variable (returned verbatim)
//! 2. GConf `/desktop/gnome/url-handlers/<scheme>/command`, schemes `http`
//!    then `unknown`
//! 3. `mozilla` in `PATH`
//!
//! Everything is synchronous and single-threaded; callers serialize their
//! own invocations. Failures never cross the JNI boundary as exceptions,
//! only as null/negative returns.

pub mod bridge;
pub mod config;
pub mod convert;
pub mod desktop;
pub mod discovery;
#[cfg(unix)]
pub mod jawt;
pub mod profile;
pub mod runtime;

pub use config::{BridgeConfig, EngineConfig, ProfileConfig};
pub use discovery::{BrowserDiscovery, DiscoveryError};
pub use profile::{GeckoVersion, ProfileRegistry, RegistryKind};
