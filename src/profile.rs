/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Profile initialization and preference migration
//!
//! The embedded engine runs against a private profile directory so that it
//! never dirties the user's real browser profile. Setup:
//!
//! 1. create `<profiles root>/WebBrowser` and register it with the
//!    directory-service seam,
//! 2. find the user's current (last used) profile through the version
//!    matched profile registry,
//! 3. copy the allow-listed subset of its `prefs.js` into
//!    `copiedprefs.js` under the private profile,
//! 4. hand the copied file to the preferences loader.
//!
//! The profile-registry interface broke binary compatibility at engine
//! version 1.7 without a UUID bump, so the interface variant is selected
//! once from the detected version and every later call goes through the
//! single [`ProfileLookup`] trait.

use crate::config::ProfileConfig;
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Header written at the top of every generated preferences file
pub const PREFS_HEADER: &str = "# Mozilla User Preferences\n\n";

/// Preference-key substrings worth carrying into the private profile.
/// Lines of the source prefs file matching none of these are dropped.
pub const INTERESTED_SETTINGS: [&str; 7] = [
    "accessibility.typeaheadfind.",
    "browser.display.",
    "browser.enable_automatic_image_resizing",
    "config.use_system_prefs",
    "font.",
    "network.",
    "security.",
];

/// Errors from profile setup
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("engine version {0:?} has no rv: field")]
    MalformedVersion(String),

    #[error("profile {0:?} is not registered")]
    UnknownProfile(String),

    #[error("no home directory to locate the profiles root in")]
    NoHomeDirectory,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Engine version extracted from the user-agent `rv:` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GeckoVersion {
    pub major: u32,
    pub minor: u32,
}

impl GeckoVersion {
    /// Parse the user-agent "misc" token, e.g. `rv:1.7.13`
    pub fn from_misc(misc: &str) -> Result<Self, ProfileError> {
        let malformed = || ProfileError::MalformedVersion(misc.to_string());

        let version = misc.strip_prefix("rv:").ok_or_else(malformed)?;
        let mut parts = version.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(malformed)?;
        let minor = parts
            .next()
            .map(|p| {
                let digits: String =
                    p.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().unwrap_or(0)
            })
            .unwrap_or(0);
        Ok(Self { major, minor })
    }

    /// Extract the `rv:` field from a full user-agent string, e.g.
    /// `Mozilla/5.0 (X11; U; Linux i686; en-US; rv:1.7) Gecko/20040616`
    pub fn from_user_agent(user_agent: &str) -> Result<Self, ProfileError> {
        let idx = user_agent
            .find("rv:")
            .ok_or_else(|| ProfileError::MalformedVersion(user_agent.to_string()))?;
        let misc: &str = &user_agent[idx..];
        let end = misc
            .find(|c: char| c == ')' || c == ';' || c.is_whitespace())
            .unwrap_or(misc.len());
        Self::from_misc(&misc[..end])
    }

    pub fn is_at_least(self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

/// The common face of the two incompatible profile-registry interfaces
pub trait ProfileLookup {
    /// Name of the current (last used) profile, if one is registered
    fn current_profile(&self) -> Result<Option<String>, ProfileError>;

    /// Directory of the named profile
    fn profile_dir(&self, name: &str) -> Result<PathBuf, ProfileError>;
}

/// Which registry interface generation the engine speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    /// Engine 1.7 and later: the `Default` marker in the registry is
    /// authoritative
    Modern,
    /// Before 1.7: no default marker; the first registered profile is the
    /// current one
    Legacy,
}

impl RegistryKind {
    pub fn for_version(version: GeckoVersion) -> Self {
        if version.is_at_least(1, 7) {
            RegistryKind::Modern
        } else {
            RegistryKind::Legacy
        }
    }
}

/// One entry of the on-disk profile registry
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProfileEntry {
    name: String,
    path: String,
    is_relative: bool,
    is_default: bool,
}

/// Profile registry backed by the engine's `profiles.ini`
pub struct ProfileRegistry {
    kind: RegistryKind,
    base: PathBuf,
    entries: Vec<ProfileEntry>,
}

impl ProfileRegistry {
    /// Resolve the interface variant once from the engine version and open
    /// the registry under the given profiles root.
    pub fn select(version: GeckoVersion, base: &Path) -> Result<Self, ProfileError> {
        let kind = RegistryKind::for_version(version);
        debug!("profile registry interface: {:?} (engine rv {}.{})", kind, version.major, version.minor);
        Self::open(kind, base)
    }

    /// Open the registry under the given profiles root. A missing
    /// `profiles.ini` is an empty registry, not an error.
    pub fn open(kind: RegistryKind, base: &Path) -> Result<Self, ProfileError> {
        let ini = base.join("profiles.ini");
        let entries = if ini.exists() {
            parse_profiles_ini(&fs::read_to_string(&ini)?)
        } else {
            Vec::new()
        };
        Ok(Self {
            kind,
            base: base.to_path_buf(),
            entries,
        })
    }
}

impl ProfileLookup for ProfileRegistry {
    fn current_profile(&self) -> Result<Option<String>, ProfileError> {
        let current = match self.kind {
            RegistryKind::Modern => {
                self.entries.iter().find(|e| e.is_default)
            }
            RegistryKind::Legacy => self.entries.first(),
        };
        Ok(current.map(|e| e.name.clone()))
    }

    fn profile_dir(&self, name: &str) -> Result<PathBuf, ProfileError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| ProfileError::UnknownProfile(name.to_string()))?;
        if entry.is_relative {
            Ok(self.base.join(&entry.path))
        } else {
            Ok(PathBuf::from(&entry.path))
        }
    }
}

/// Minimal scan of the `[ProfileN]` sections of a `profiles.ini`
fn parse_profiles_ini(text: &str) -> Vec<ProfileEntry> {
    let mut entries = Vec::new();
    let mut in_profile_section = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile_section = section.starts_with("Profile");
            if in_profile_section {
                entries.push(ProfileEntry {
                    name: String::new(),
                    path: String::new(),
                    is_relative: true,
                    is_default: false,
                });
            }
            continue;
        }
        if !in_profile_section {
            continue;
        }
        let entry = match entries.last_mut() {
            Some(entry) => entry,
            None => continue,
        };
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "Name" => entry.name = value.trim().to_string(),
                "Path" => entry.path = value.trim().to_string(),
                "IsRelative" => entry.is_relative = value.trim() != "0",
                "Default" => entry.is_default = value.trim() == "1",
                _ => {}
            }
        }
    }

    entries.retain(|e| !e.name.is_empty() && !e.path.is_empty());
    entries
}

/// Answers "where is special directory X" queries for the embedding engine
pub trait DirectoryProvider {
    /// Root directory holding the user's engine profiles
    fn profiles_root(&self) -> Result<PathBuf, ProfileError>;

    /// Register the private profile directory as the engine's profile-dir
    /// answer for the rest of the process lifetime
    fn set_profile_dir(&mut self, dir: &Path) -> Result<(), ProfileError>;
}

/// Directory provider rooted in the user's home directory (`~/.mozilla`)
#[derive(Debug, Default)]
pub struct HomeDirectoryProvider {
    profile_dir: Option<PathBuf>,
}

impl HomeDirectoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registered private profile directory, once set
    pub fn profile_dir(&self) -> Option<&Path> {
        self.profile_dir.as_deref()
    }
}

impl DirectoryProvider for HomeDirectoryProvider {
    fn profiles_root(&self) -> Result<PathBuf, ProfileError> {
        let home = std::env::var_os("HOME").ok_or(ProfileError::NoHomeDirectory)?;
        Ok(PathBuf::from(home).join(".mozilla"))
    }

    fn set_profile_dir(&mut self, dir: &Path) -> Result<(), ProfileError> {
        debug!("registered private profile dir: {}", dir.display());
        self.profile_dir = Some(dir.to_path_buf());
        Ok(())
    }
}

/// Instructs the engine's preferences service to load a prefs file
pub trait PrefsLoader {
    fn read_user_prefs(&mut self, prefs: &Path) -> Result<(), ProfileError>;
}

/// Preferences loader that validates the file on disk and remembers what
/// was handed to the engine
#[derive(Debug, Default)]
pub struct FilePrefsLoader {
    loaded: Option<PathBuf>,
}

impl FilePrefsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(&self) -> Option<&Path> {
        self.loaded.as_deref()
    }
}

impl PrefsLoader for FilePrefsLoader {
    fn read_user_prefs(&mut self, prefs: &Path) -> Result<(), ProfileError> {
        // The engine stats the file before parsing it; surface the same
        // failure here.
        let metadata = fs::metadata(prefs)?;
        debug!(
            "loading user prefs from {} ({} bytes)",
            prefs.display(),
            metadata.len()
        );
        self.loaded = Some(prefs.to_path_buf());
        Ok(())
    }
}

/// Copy the allow-listed preference lines from one prefs file to another,
/// prepending the fixed header. Lines are copied verbatim; a line matching
/// several allow-list entries is still written only once.
pub fn copy_filtered_prefs(from: &Path, to: &Path) -> Result<(), io::Error> {
    let source = File::open(from)?;
    let mut out = BufWriter::new(File::create(to)?);

    out.write_all(PREFS_HEADER.as_bytes())?;

    for line in BufReader::new(source).lines() {
        let line = line?;
        if INTERESTED_SETTINGS.iter().any(|s| line.contains(s)) {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Set up the private profile and migrate the user's preferences into it.
///
/// Returns the private profile directory. The first error wins; nothing is
/// rolled back. A user without a current profile, or without a `prefs.js`
/// in it, simply gets an empty private profile. A failure to load the
/// copied prefs is tolerated the way the engine tolerates it.
pub fn initialize_profile(
    config: &ProfileConfig,
    dirs: &mut dyn DirectoryProvider,
    registry: &dyn ProfileLookup,
    prefs: &mut dyn PrefsLoader,
) -> Result<PathBuf, ProfileError> {
    let root = dirs.profiles_root()?;
    let private_dir = root.join(&config.profile_dir_name);
    fs::create_dir_all(&private_dir)?;
    dirs.set_profile_dir(&private_dir)?;

    let copied = private_dir.join(&config.copied_prefs_name);

    if let Some(name) = registry.current_profile()? {
        let source = registry.profile_dir(&name)?.join(&config.prefs_name);
        if source.exists() {
            debug!(
                "migrating preferences from {} to {}",
                source.display(),
                copied.display()
            );
            copy_filtered_prefs(&source, &copied)?;
        }
    }

    if let Err(e) = prefs.read_user_prefs(&copied) {
        debug!("loading copied preferences failed: {}", e);
    }

    Ok(private_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILES_INI: &str = "\
[General]
StartWithLastProfile=1

[Profile0]
Name=default
IsRelative=1
Path=abc123.default

[Profile1]
Name=work
IsRelative=0
Path=/srv/profiles/work
Default=1
";

    #[test]
    fn version_parses_from_misc_token() {
        let v = GeckoVersion::from_misc("rv:1.7.13").unwrap();
        assert_eq!((v.major, v.minor), (1, 7));
        assert!(v.is_at_least(1, 7));

        let v = GeckoVersion::from_misc("rv:1.4").unwrap();
        assert!(!v.is_at_least(1, 7));

        assert!(GeckoVersion::from_misc("1.7").is_err());
    }

    #[test]
    fn version_parses_from_full_user_agent() {
        let ua = "Mozilla/5.0 (X11; U; Linux i686; en-US; rv:1.7) Gecko/20040616";
        let v = GeckoVersion::from_user_agent(ua).unwrap();
        assert_eq!((v.major, v.minor), (1, 7));
    }

    #[test]
    fn interface_variant_is_selected_once_by_version() {
        let old = GeckoVersion::from_misc("rv:1.4").unwrap();
        let new = GeckoVersion::from_misc("rv:1.8").unwrap();
        assert_eq!(RegistryKind::for_version(old), RegistryKind::Legacy);
        assert_eq!(RegistryKind::for_version(new), RegistryKind::Modern);
    }

    #[test]
    fn modern_registry_honors_the_default_marker() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("profiles.ini"), PROFILES_INI).unwrap();

        let registry = ProfileRegistry::open(RegistryKind::Modern, dir.path()).unwrap();
        assert_eq!(registry.current_profile().unwrap(), Some("work".to_string()));
        assert_eq!(
            registry.profile_dir("work").unwrap(),
            PathBuf::from("/srv/profiles/work")
        );
    }

    #[test]
    fn legacy_registry_takes_the_first_profile() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("profiles.ini"), PROFILES_INI).unwrap();

        let registry = ProfileRegistry::open(RegistryKind::Legacy, dir.path()).unwrap();
        assert_eq!(
            registry.current_profile().unwrap(),
            Some("default".to_string())
        );
        assert_eq!(
            registry.profile_dir("default").unwrap(),
            dir.path().join("abc123.default")
        );
    }

    #[test]
    fn missing_registry_means_no_current_profile() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProfileRegistry::open(RegistryKind::Modern, dir.path()).unwrap();
        assert_eq!(registry.current_profile().unwrap(), None);
        assert!(registry.profile_dir("default").is_err());
    }

    #[test]
    fn filtered_copy_keeps_header_and_allowlisted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("prefs.js");
        let to = dir.path().join("copiedprefs.js");
        fs::write(
            &from,
            "user_pref(\"browser.display.background_color\", \"#FFFFFF\");\n\
             user_pref(\"print.printer_list\", \"lp\");\n\
             user_pref(\"network.proxy.type\", 1);\n\
             user_pref(\"font.size.variable.x-western\", 16);\n",
        )
        .unwrap();

        copy_filtered_prefs(&from, &to).unwrap();

        let copied = fs::read_to_string(&to).unwrap();
        assert!(copied.starts_with(PREFS_HEADER));
        assert!(copied.contains("browser.display.background_color"));
        assert!(copied.contains("network.proxy.type"));
        assert!(copied.contains("font.size.variable.x-western"));
        assert!(!copied.contains("print.printer_list"));
    }

    #[test]
    fn line_matching_several_allowlist_entries_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("prefs.js");
        let to = dir.path().join("copiedprefs.js");
        fs::write(
            &from,
            "user_pref(\"font.name.network.override\", \"serif\");\n",
        )
        .unwrap();

        copy_filtered_prefs(&from, &to).unwrap();

        let copied = fs::read_to_string(&to).unwrap();
        assert_eq!(copied.matches("font.name.network.override").count(), 1);
    }

    #[test]
    fn profile_setup_creates_and_registers_the_private_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".mozilla");
        fs::create_dir_all(root.join("abc123.default")).unwrap();
        fs::write(
            root.join("profiles.ini"),
            "[Profile0]\nName=default\nIsRelative=1\nPath=abc123.default\nDefault=1\n",
        )
        .unwrap();
        fs::write(
            root.join("abc123.default").join("prefs.js"),
            "user_pref(\"security.enable_java\", false);\n\
             user_pref(\"irrelevant.key\", true);\n",
        )
        .unwrap();

        struct FixedRoot {
            root: PathBuf,
            registered: Option<PathBuf>,
        }
        impl DirectoryProvider for FixedRoot {
            fn profiles_root(&self) -> Result<PathBuf, ProfileError> {
                Ok(self.root.clone())
            }
            fn set_profile_dir(&mut self, dir: &Path) -> Result<(), ProfileError> {
                self.registered = Some(dir.to_path_buf());
                Ok(())
            }
        }

        let mut dirs = FixedRoot {
            root: root.clone(),
            registered: None,
        };
        let registry = ProfileRegistry::open(RegistryKind::Modern, &root).unwrap();
        let mut prefs = FilePrefsLoader::new();

        let config = ProfileConfig::default();
        let private_dir =
            initialize_profile(&config, &mut dirs, &registry, &mut prefs).unwrap();

        assert_eq!(private_dir, root.join("WebBrowser"));
        assert_eq!(dirs.registered.as_deref(), Some(private_dir.as_path()));

        let copied = fs::read_to_string(private_dir.join("copiedprefs.js")).unwrap();
        assert!(copied.starts_with(PREFS_HEADER));
        assert!(copied.contains("security.enable_java"));
        assert!(!copied.contains("irrelevant.key"));

        assert_eq!(
            prefs.loaded(),
            Some(private_dir.join("copiedprefs.js").as_path())
        );
    }

    #[test]
    fn profile_setup_without_prefs_source_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".mozilla");
        fs::create_dir_all(&root).unwrap();

        struct FixedRoot(PathBuf);
        impl DirectoryProvider for FixedRoot {
            fn profiles_root(&self) -> Result<PathBuf, ProfileError> {
                Ok(self.0.clone())
            }
            fn set_profile_dir(&mut self, _dir: &Path) -> Result<(), ProfileError> {
                Ok(())
            }
        }

        let mut dirs = FixedRoot(root.clone());
        let registry = ProfileRegistry::open(RegistryKind::Modern, &root).unwrap();
        let mut prefs = FilePrefsLoader::new();

        let config = ProfileConfig::default();
        let private_dir =
            initialize_profile(&config, &mut dirs, &registry, &mut prefs).unwrap();

        assert!(private_dir.is_dir());
        // No migration source, so the loader had nothing to load.
        assert_eq!(prefs.loaded(), None);
    }
}
