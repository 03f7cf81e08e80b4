//! Extension points a build system exposes to tools, plus a simple in-memory host.

use crate::scanner::ScannerKind;
use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The object builders a source suffix can be attached to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, ValueEnum)]
pub enum ObjectKind {
    /// Objects for static libraries and programs.
    Static,
    /// Position independent objects for shared libraries.
    Shared,
}

impl ObjectKind {
    /// The object file suffix for the host platform.
    #[must_use]
    pub fn suffix(self, platform: &str) -> &'static str {
        match (self, platform) {
            (_, "win32" | "cygwin") => ".obj",
            (ObjectKind::Static, _) => ".o",
            (ObjectKind::Shared, _) => ".os",
        }
    }
}

/// Registration hooks of a build system.
pub trait BuildHost {
    /// Build sources ending in `suffix` with the command stored in the environment variable `command_var`.
    fn add_action(&mut self, kind: ObjectKind, suffix: &str, command_var: &str);

    /// Scan sources ending in `suffix` for dependencies with `scanner`.
    fn add_scanner(&mut self, suffix: &str, scanner: ScannerKind);
}

/// A build host that just records registrations.
/// Registering the same suffix again replaces the earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registry {
    static_actions: BTreeMap<String, String>,
    shared_actions: BTreeMap<String, String>,
    scanners: BTreeMap<String, ScannerKind>,
}

impl BuildHost for Registry {
    fn add_action(&mut self, kind: ObjectKind, suffix: &str, command_var: &str) {
        self.actions_mut(kind)
            .insert(suffix.to_string(), command_var.to_string());
    }

    fn add_scanner(&mut self, suffix: &str, scanner: ScannerKind) {
        self.scanners.insert(suffix.to_string(), scanner);
    }
}

impl Registry {
    fn actions(&self, kind: ObjectKind) -> &BTreeMap<String, String> {
        match kind {
            ObjectKind::Static => &self.static_actions,
            ObjectKind::Shared => &self.shared_actions,
        }
    }

    fn actions_mut(&mut self, kind: ObjectKind) -> &mut BTreeMap<String, String> {
        match kind {
            ObjectKind::Static => &mut self.static_actions,
            ObjectKind::Shared => &mut self.shared_actions,
        }
    }

    /// The command variable that builds `source`, if its suffix is registered.
    #[must_use]
    pub fn action_for(&self, kind: ObjectKind, source: &Path) -> Option<&str> {
        self.actions(kind).get(&source_suffix(source)?).map(String::as_str)
    }

    /// The scanner that applies to `source`, if its suffix is registered.
    #[must_use]
    pub fn scanner_for(&self, source: &Path) -> Option<ScannerKind> {
        self.scanners.get(&source_suffix(source)?).copied()
    }

    /// Number of registered suffixes across both builders and the scanners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.static_actions.len() + self.shared_actions.len() + self.scanners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The suffix of a path including the leading dot, e.g. `.cu`.
#[must_use]
pub fn source_suffix(source: &Path) -> Option<String> {
    source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
}

/// The default object file for a source: same stem, object suffix.
#[must_use]
pub fn object_target(kind: ObjectKind, source: &Path, platform: &str) -> PathBuf {
    let mut target = source.to_path_buf();
    target.set_extension(kind.suffix(platform).trim_start_matches('.'));
    target
}
