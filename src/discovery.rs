/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Browser engine home discovery
//!
//! Locates the installation directory of a Mozilla-based browser engine,
//! i.e. the directory that contains `libxpcom.so`. The search is a linear
//! pipeline with early exit and no backtracking:
//!
//! 1. `MOZILLA_FIVE_HOME` environment variable (returned verbatim, no
//!    validation)
//! 2. The desktop URL-handler registry, queried per scheme (`http`, then
//!    the `unknown` fallback)
//! 3. A scan of `PATH` for the engine binary
//!
//! A candidate binary is then classified: if the interop library sits next
//! to it (after resolving symlinks), its parent directory is the home.
//! Otherwise the candidate is assumed to be a Bourne launcher script and is
//! scanned for a `MOZILLA_FIVE_HOME=` assignment.

use crate::config::EngineConfig;
use crate::desktop::{GconfLookup, UrlHandlerLookup};
use log::debug;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the discovery pipeline
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no browser binary found via the URL-handler registry or PATH")]
    NoCandidate,

    #[error("no home assignment found in launcher script {0}")]
    ScriptWithoutHome(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Finds the browser engine installation directory
pub struct BrowserDiscovery {
    config: EngineConfig,
    lookup: Box<dyn UrlHandlerLookup>,
    /// Overrides the `PATH` value used for the binary scan
    search_path: Option<OsString>,
}

impl Default for BrowserDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserDiscovery {
    /// Create a discovery with the stock engine settings and the GConf
    /// URL-handler registry
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a discovery with custom engine settings
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            lookup: Box::new(GconfLookup::new()),
            search_path: None,
        }
    }

    /// Replace the URL-handler registry backend
    pub fn with_lookup(mut self, lookup: Box<dyn UrlHandlerLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    /// Scan the given path list instead of the `PATH` environment variable
    pub fn with_search_path<S: Into<OsString>>(mut self, paths: S) -> Self {
        self.search_path = Some(paths.into());
        self
    }

    /// Run the discovery pipeline, preserving the original silent-failure
    /// contract: any internal error collapses to `None`.
    pub fn discover(&self) -> Option<PathBuf> {
        match self.try_discover() {
            Ok(home) => Some(home),
            Err(e) => {
                debug!("browser home discovery failed: {}", e);
                None
            }
        }
    }

    /// Run the discovery pipeline with full error reporting
    pub fn try_discover(&self) -> Result<PathBuf, DiscoveryError> {
        // The override is returned verbatim, without checking existence.
        if let Some(home) = std::env::var_os(&self.config.home_var) {
            debug!(
                "{} already set: {}",
                self.config.home_var,
                Path::new(&home).display()
            );
            return Ok(PathBuf::from(home));
        }

        let mut candidate = self.candidate_from_handler();

        let valid = candidate.as_deref().map(Path::exists).unwrap_or(false);
        if !valid {
            candidate = self.candidate_from_search_path();
        }

        let candidate = candidate.ok_or(DiscoveryError::NoCandidate)?;
        self.classify(&candidate)
    }

    /// Derive a candidate binary path from the desktop URL-handler registry.
    ///
    /// The first non-empty handler command wins; later schemes are not
    /// consulted even if that command turns out not to name the engine.
    fn candidate_from_handler(&self) -> Option<PathBuf> {
        for scheme in &self.config.schemes {
            if let Some(command) = self.lookup.handler_command(scheme) {
                if command.is_empty() {
                    continue;
                }
                debug!("URL handler command for {}: {}", scheme, command);
                return command_to_candidate(&command, &self.config.binary_name)
                    .map(PathBuf::from);
            }
        }
        None
    }

    /// Scan the search path, in order, for the engine binary
    fn candidate_from_search_path(&self) -> Option<PathBuf> {
        let paths = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))?;
        let found = std::env::split_paths(&paths)
            .map(|dir| dir.join(&self.config.binary_name))
            .find(|p| p.exists());
        if let Some(ref path) = found {
            debug!("found {} binary under PATH: {}", self.config.binary_name, path.display());
        }
        found
    }

    /// Classify a candidate binary: a real installation (interop library
    /// next to the resolved binary) or a launcher script carrying the home
    /// assignment.
    fn classify(&self, candidate: &Path) -> Result<PathBuf, DiscoveryError> {
        // The candidate may be a symlink into the installation.
        let resolved = candidate.canonicalize()?;

        if let Some(parent) = resolved.parent() {
            if parent.join(&self.config.interop_library).exists() {
                debug!(
                    "found {} under binary path: {}",
                    self.config.interop_library,
                    parent.display()
                );
                return Ok(parent.to_path_buf());
            }
        }

        match scan_launcher_script(&resolved, &self.config.home_var)? {
            Some(home) => {
                debug!(
                    "scanned {} setting from {}: {}",
                    self.config.home_var,
                    resolved.display(),
                    home
                );
                Ok(PathBuf::from(home))
            }
            None => Err(DiscoveryError::ScriptWithoutHome(resolved)),
        }
    }
}

/// Extract a candidate executable path from a handler command string.
///
/// Returns `None` unless the command names the engine binary. The embedded
/// URL placeholder (`%s`, `%u`, ...) is removed before trimming.
fn command_to_candidate(command: &str, binary_name: &str) -> Option<String> {
    if !command.contains(binary_name) {
        return None;
    }
    let stripped = strip_placeholder(command);
    Some(stripped.trim().to_string())
}

/// Remove the first `%`-prefixed format placeholder from a command string
fn strip_placeholder(command: &str) -> String {
    let mut out = String::with_capacity(command.len());
    let mut chars = command.chars().peekable();
    let mut stripped = false;
    while let Some(c) = chars.next() {
        if !stripped && c == '%' {
            if let Some(next) = chars.peek() {
                if next.is_ascii_alphabetic() {
                    chars.next();
                    stripped = true;
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Scan a launcher script line by line for the first `<var>=` assignment
/// and return its trimmed value.
pub(crate) fn scan_launcher_script(
    script: &Path,
    var: &str,
) -> Result<Option<String>, io::Error> {
    let file = File::open(script)?;
    let reader = BufReader::new(file);
    let needle = format!("{}=", var);

    for line in reader.lines() {
        let line = line?;
        if let Some(idx) = line.find(&needle) {
            let raw = &line[idx + needle.len()..];
            return Ok(Some(trim_assignment_value(raw).to_string()));
        }
    }
    Ok(None)
}

/// Trim a scanned assignment value: one pass of surrounding whitespace,
/// then leading quote characters up to the first non-quote, then trailing
/// quote/newline characters back to the first character that is neither.
/// Interior whitespace uncovered by quote removal is kept.
pub(crate) fn trim_assignment_value(raw: &str) -> &str {
    let value = raw.trim();
    let value = value.trim_start_matches('"');
    value.trim_end_matches(|c| c == '"' || c == '\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    struct StubLookup {
        commands: HashMap<String, String>,
    }

    impl StubLookup {
        fn empty() -> Self {
            Self {
                commands: HashMap::new(),
            }
        }

        fn with(scheme: &str, command: &str) -> Self {
            let mut commands = HashMap::new();
            commands.insert(scheme.to_string(), command.to_string());
            Self { commands }
        }
    }

    impl UrlHandlerLookup for StubLookup {
        fn handler_command(&self, scheme: &str) -> Option<String> {
            self.commands.get(scheme).cloned()
        }
    }

    fn test_config(home_var: &str) -> EngineConfig {
        EngineConfig {
            home_var: home_var.to_string(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn env_override_returned_verbatim_without_validation() {
        let var = "MOZBRIDGE_TEST_HOME_OVERRIDE";
        std::env::set_var(var, "/opt/engine");

        let discovery = BrowserDiscovery::with_config(test_config(var))
            .with_lookup(Box::new(StubLookup::empty()))
            .with_search_path("");
        assert_eq!(discovery.discover(), Some(PathBuf::from("/opt/engine")));

        std::env::remove_var(var);
    }

    #[test]
    fn handler_command_with_colocated_library_returns_parent() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("mozilla");
        fs::write(&binary, "#!/bin/sh\n").unwrap();
        fs::write(dir.path().join("libxpcom.so"), "").unwrap();

        let command = format!("{} %s", binary.display());
        let discovery =
            BrowserDiscovery::with_config(test_config("MOZBRIDGE_TEST_HOME_UNSET_A"))
                .with_lookup(Box::new(StubLookup::with("http", &command)))
                .with_search_path("");

        let home = discovery.discover().unwrap();
        assert_eq!(home, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn launcher_script_from_path_scan_yields_home_assignment() {
        std::env::remove_var("MOZILLA_FIVE_HOME");
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir(&bin).unwrap();
        fs::write(
            bin.join("mozilla"),
            "#!/bin/sh\nMOZILLA_FIVE_HOME=\"/usr/lib/mozilla-1.7\"\nexec foo\n",
        )
        .unwrap();

        let discovery =
            BrowserDiscovery::with_config(test_config("MOZILLA_FIVE_HOME"))
                .with_lookup(Box::new(StubLookup::empty()))
                .with_search_path(bin.as_os_str().to_os_string());

        assert_eq!(
            discovery.discover(),
            Some(PathBuf::from("/usr/lib/mozilla-1.7"))
        );
    }

    #[test]
    fn nonexistent_handler_candidate_falls_back_to_path_scan() {
        std::env::remove_var("MOZILLA_FIVE_HOME");
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir(&bin).unwrap();
        fs::write(bin.join("mozilla"), "#!/bin/sh\nMOZILLA_FIVE_HOME=/opt/moz\n").unwrap();

        let discovery =
            BrowserDiscovery::with_config(test_config("MOZILLA_FIVE_HOME"))
                .with_lookup(Box::new(StubLookup::with(
                    "http",
                    "/definitely/missing/mozilla %s",
                )))
                .with_search_path(bin.as_os_str().to_os_string());

        assert_eq!(discovery.discover(), Some(PathBuf::from("/opt/moz")));
    }

    #[test]
    fn all_stages_missing_yields_absence() {
        let dir = tempfile::tempdir().unwrap();
        let discovery =
            BrowserDiscovery::with_config(test_config("MOZBRIDGE_TEST_HOME_UNSET_B"))
                .with_lookup(Box::new(StubLookup::empty()))
                .with_search_path(dir.path().as_os_str().to_os_string());

        assert_eq!(discovery.discover(), None);
    }

    #[test]
    fn discovery_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("mozilla");
        fs::write(&binary, "").unwrap();
        fs::write(dir.path().join("libxpcom.so"), "").unwrap();

        let discovery =
            BrowserDiscovery::with_config(test_config("MOZBRIDGE_TEST_HOME_UNSET_C"))
                .with_lookup(Box::new(StubLookup::empty()))
                .with_search_path(dir.path().as_os_str().to_os_string());

        let first = discovery.discover();
        let second = discovery.discover();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn non_engine_handler_command_is_discarded() {
        assert_eq!(command_to_candidate("/usr/bin/konqueror %u", "mozilla"), None);
        assert_eq!(
            command_to_candidate("/usr/lib/mozilla/mozilla %s", "mozilla"),
            Some("/usr/lib/mozilla/mozilla".to_string())
        );
    }

    #[test]
    fn placeholder_stripping_removes_only_the_format_token() {
        assert_eq!(strip_placeholder("/usr/bin/mozilla %s"), "/usr/bin/mozilla ");
        assert_eq!(strip_placeholder("/usr/bin/mozilla"), "/usr/bin/mozilla");
        assert_eq!(strip_placeholder("%u /usr/bin/mozilla"), " /usr/bin/mozilla");
    }

    #[test]
    fn assignment_value_trimming_strips_quotes_once() {
        assert_eq!(
            trim_assignment_value("\"/usr/lib/mozilla-1.7\""),
            "/usr/lib/mozilla-1.7"
        );
        assert_eq!(trim_assignment_value("/opt/moz\n"), "/opt/moz");
        assert_eq!(trim_assignment_value("  /opt/moz  "), "/opt/moz");
        // Interior whitespace exposed by quote removal is preserved.
        assert_eq!(trim_assignment_value("\"  /opt/moz\""), "  /opt/moz");
    }

    #[test]
    fn script_scan_finds_first_assignment_only() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("launcher");
        fs::write(
            &script,
            "#!/bin/sh\nMOZILLA_FIVE_HOME=/first\nMOZILLA_FIVE_HOME=/second\n",
        )
        .unwrap();

        let home = scan_launcher_script(&script, "MOZILLA_FIVE_HOME").unwrap();
        assert_eq!(home, Some("/first".to_string()));
    }

    #[test]
    fn script_without_assignment_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("launcher");
        fs::write(&script, "#!/bin/sh\nexec /usr/bin/true\n").unwrap();

        let home = scan_launcher_script(&script, "MOZILLA_FIVE_HOME").unwrap();
        assert_eq!(home, None);
    }
}
