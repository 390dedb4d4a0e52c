/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Desktop URL-handler registry access
//!
//! The GNOME desktop registers the default browser as a per-scheme handler
//! command under `/desktop/gnome/url-handlers/<scheme>/command`. Discovery
//! only needs that one read, so the registry is queried through the
//! `gconftool-2` command-line client rather than a GObject binding. Every
//! failure (missing tool, unset key, empty value) is non-fatal and simply
//! reads as "no handler registered".

use log::debug;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// GConf key prefix for per-scheme URL handlers
pub const GCONF_URL_HANDLER_PATH: &str = "/desktop/gnome/url-handlers/";

/// Answers "which command handles URLs of this scheme" queries
pub trait UrlHandlerLookup {
    /// The registered handler command for a URL scheme, if any
    fn handler_command(&self, scheme: &str) -> Option<String>;
}

/// URL-handler lookup backed by the GConf configuration daemon
pub struct GconfLookup {
    tool: PathBuf,
}

impl Default for GconfLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl GconfLookup {
    /// Query GConf through `gconftool-2` found on the PATH
    pub fn new() -> Self {
        Self {
            tool: PathBuf::from("gconftool-2"),
        }
    }

    /// Query GConf through a specific client binary
    pub fn with_tool<P: Into<PathBuf>>(tool: P) -> Self {
        Self { tool: tool.into() }
    }
}

impl UrlHandlerLookup for GconfLookup {
    fn handler_command(&self, scheme: &str) -> Option<String> {
        let key = format!("{}{}/command", GCONF_URL_HANDLER_PATH, scheme);

        let output = Command::new(&self.tool)
            .arg("--get")
            .arg(&key)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                debug!("gconf client {} unavailable: {}", self.tool.display(), e);
                return None;
            }
        };

        if !output.status.success() {
            debug!("gconf key {} not set", key);
            return None;
        }

        let command = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if command.is_empty() {
            None
        } else {
            Some(command)
        }
    }
}
