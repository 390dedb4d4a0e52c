/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Mozbridge configuration
//!
//! All knobs default to the stock Mozilla values; a TOML file is only
//! needed when bridging a differently-named engine build.

use serde::{Deserialize, Serialize};

/// Main mozbridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Engine discovery settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Profile setup settings
    #[serde(default)]
    pub profile: ProfileConfig,
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from string
    pub fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let config: BridgeConfig = toml::from_str(toml_str)?;
        Ok(config)
    }
}

/// Engine discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Environment variable naming the engine installation directory
    #[serde(default = "default_home_var")]
    pub home_var: String,

    /// Name of the engine binary (or launcher script) to search for
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Shared library whose presence marks a real installation directory
    #[serde(default = "default_interop_library")]
    pub interop_library: String,

    /// URL schemes to query in the desktop handler registry, in order
    #[serde(default = "default_schemes")]
    pub schemes: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            home_var: default_home_var(),
            binary_name: default_binary_name(),
            interop_library: default_interop_library(),
            schemes: default_schemes(),
        }
    }
}

fn default_home_var() -> String {
    "MOZILLA_FIVE_HOME".to_string()
}

fn default_binary_name() -> String {
    "mozilla".to_string()
}

fn default_interop_library() -> String {
    "libxpcom.so".to_string()
}

fn default_schemes() -> Vec<String> {
    vec!["http".to_string(), "unknown".to_string()]
}

/// Profile setup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Name of the private profile directory under the profiles root
    #[serde(default = "default_profile_dir_name")]
    pub profile_dir_name: String,

    /// Preferences file read from the user's current profile
    #[serde(default = "default_prefs_name")]
    pub prefs_name: String,

    /// Filtered preferences file written into the private profile
    #[serde(default = "default_copied_prefs_name")]
    pub copied_prefs_name: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            profile_dir_name: default_profile_dir_name(),
            prefs_name: default_prefs_name(),
            copied_prefs_name: default_copied_prefs_name(),
        }
    }
}

fn default_profile_dir_name() -> String {
    "WebBrowser".to_string()
}

fn default_prefs_name() -> String {
    "prefs.js".to_string()
}

fn default_copied_prefs_name() -> String {
    "copiedprefs.js".to_string()
}
