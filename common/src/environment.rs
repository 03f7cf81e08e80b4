//! The configuration map shared by every stage of a build configuration pass.

use crate::{PATH, PLATFORM, host_platform};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: &str = ":";

fn split_words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// A configuration value: a single string or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    List(Vec<String>),
}

impl Value {
    /// The value as command-line arguments. Lists are taken element-wise.
    ///
    /// A string is split on whitespace. If it contains quotes it is split the
    /// way a POSIX shell would, so `-Xcompiler "-O2 -g"` is two arguments.
    /// Unbalanced quotes fall back to plain whitespace splitting.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Value::Str(s) if s.contains(['"', '\'']) => {
                shlex::split(s).unwrap_or_else(|| split_words(s))
            }
            Value::Str(s) => split_words(s),
            Value::List(items) => items.clone(),
        }
    }

    /// The value as list entries. A non-empty string becomes a single entry.
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Value::Str(s) if s.is_empty() => Vec::new(),
            Value::Str(s) => vec![s.clone()],
            Value::List(items) => items.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => write!(f, "{}", items.join(" ")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

/// A build environment: configuration variables plus the process environment
/// that commands are executed with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(flatten)]
    vars: BTreeMap<String, Value>,
    #[serde(rename = "ENV", default)]
    process_env: BTreeMap<String, String>,
}

impl Environment {
    /// An environment for the current machine.
    /// `PLATFORM` is set to the host platform and the search path is taken from `PATH`.
    #[must_use]
    pub fn for_host() -> Self {
        let mut env = Self::default();
        env.set(PLATFORM, host_platform());
        if let Ok(path) = std::env::var(PATH) {
            env.set_env_var(PATH, path);
        }
        env
    }

    /// Parse an environment from its JSON form.
    ///
    /// # Errors
    /// Returns an error if the input is not a JSON object of strings and string lists.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Render the environment as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Look up a value rendered as a single string. Lists are joined with spaces.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.vars.get(key).map(Value::to_string)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.vars.insert(key.to_string(), value.into());
    }

    /// Set a value only if the key is absent. Returns whether it was set.
    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) -> bool {
        if self.vars.contains_key(key) {
            return false;
        }
        trace!("Defaulting {key}");
        self.set(key, value);
        true
    }

    /// Append entries to a list value, keeping everything already present.
    /// Entries are not deduplicated.
    pub fn append<I, S>(&mut self, key: &str, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = self.vars.get(key).map(Value::to_list).unwrap_or_default();
        list.extend(items.into_iter().map(Into::into));
        self.vars.insert(key.to_string(), Value::List(list));
    }

    /// Look up a variable of the process environment commands run with.
    #[must_use]
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.process_env.get(name).map(String::as_str)
    }

    pub fn set_env_var(&mut self, name: &str, value: impl Into<String>) {
        self.process_env.insert(name.to_string(), value.into());
    }

    /// Put a directory at the front of a path-list variable of the process environment.
    /// An identical entry further back is removed so the list never holds it twice.
    pub fn prepend_env_path(&mut self, name: &str, dir: &Path) {
        let dir = dir.to_string_lossy().into_owned();
        let mut entries = vec![dir.clone()];
        if let Some(existing) = self.process_env.get(name) {
            entries.extend(
                existing
                    .split(PATH_LIST_SEPARATOR)
                    .filter(|entry| !entry.is_empty() && *entry != dir)
                    .map(str::to_string),
            );
        }
        let joined = entries.join(PATH_LIST_SEPARATOR);
        self.process_env.insert(name.to_string(), joined);
    }

    /// The directories of the search path, in order.
    #[must_use]
    pub fn search_path(&self) -> Vec<PathBuf> {
        self.env_var(PATH)
            .map(|path| {
                path.split(PATH_LIST_SEPARATOR)
                    .filter(|entry| !entry.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Find a program on this environment's search path (not the calling process's).
    #[must_use]
    pub fn detect(&self, program: &str) -> Option<PathBuf> {
        let path = self.env_var(PATH)?;
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(program, Some(path), cwd).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_set_default_keeps_existing() {
        let mut env = Environment::default();
        env.set("NVCC", "/opt/cuda/bin/nvcc");

        assert!(!env.set_default("NVCC", "nvcc"));
        assert!(env.set_default("NVCCFLAGS", ""));
        assert_eq!(env.get_string("NVCC").unwrap(), "/opt/cuda/bin/nvcc");
        assert_eq!(env.get("NVCCFLAGS"), Some(&Value::Str(String::new())));
    }

    #[test_log::test]
    fn test_append_keeps_prior_entries() {
        let mut env = Environment::default();
        env.set("CPPPATH", vec!["include".to_string()]);
        env.append("CPPPATH", ["/sdk/common/inc", "/cuda/include"]);

        assert_eq!(
            env.get("CPPPATH").unwrap().to_list(),
            vec!["include", "/sdk/common/inc", "/cuda/include"]
        );
    }

    #[test_log::test]
    fn test_append_to_string_and_missing() {
        let mut env = Environment::default();
        env.set("LIBS", "m");
        env.append("LIBS", ["cudart"]);
        env.append("LIBPATH", ["/cuda/lib"]);

        assert_eq!(env.get("LIBS").unwrap().to_list(), vec!["m", "cudart"]);
        assert_eq!(env.get("LIBPATH").unwrap().to_list(), vec!["/cuda/lib"]);
    }

    #[test_log::test]
    fn test_append_is_literal() {
        let mut env = Environment::default();
        env.append("LIBS", ["cudart"]);
        env.append("LIBS", ["cudart"]);

        assert_eq!(env.get("LIBS").unwrap().to_list(), vec!["cudart", "cudart"]);
    }

    #[test_log::test]
    fn test_prepend_env_path_moves_existing_entry() {
        let sep = PATH_LIST_SEPARATOR;
        let mut env = Environment::default();
        env.set_env_var(PATH, format!("/usr/bin{sep}/cuda/bin{sep}/bin"));
        env.prepend_env_path(PATH, Path::new("/cuda/bin"));

        assert_eq!(
            env.search_path(),
            vec![
                PathBuf::from("/cuda/bin"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin")
            ]
        );
    }

    #[test_log::test]
    fn test_prepend_env_path_creates_variable() {
        let mut env = Environment::default();
        env.prepend_env_path(PATH, Path::new("/cuda/bin"));

        assert_eq!(env.env_var(PATH), Some("/cuda/bin"));
    }

    #[test_log::test]
    fn test_value_args_and_display() {
        let flags = Value::from("-O2  -g");
        assert_eq!(flags.to_args(), vec!["-O2", "-g"]);
        assert_eq!(Value::from("").to_args(), Vec::<String>::new());

        let quoted = Value::from("-Xcompiler \"-O2 -g\" -ccbin 'C:\\VC\\bin'");
        assert_eq!(quoted.to_args(), vec!["-Xcompiler", "-O2 -g", "-ccbin", "C:\\VC\\bin"]);
        let windows = Value::from("C:\\CUDA\\bin\\nvcc -O2");
        assert_eq!(windows.to_args(), vec!["C:\\CUDA\\bin\\nvcc", "-O2"]);
        let unbalanced = Value::from("-DNAME=\"x -g");
        assert_eq!(unbalanced.to_args(), vec!["-DNAME=\"x", "-g"]);

        let list = Value::from(vec!["a b".to_string(), "c".to_string()]);
        assert_eq!(list.to_args(), vec!["a b", "c"]);
        assert_eq!(list.to_string(), "a b c");
    }

    #[test_log::test]
    fn test_json_form() {
        let env = Environment::from_json(
            r#"{"CCFLAGS": ["-O2", "-g"], "NVCC": "nvcc", "ENV": {"PATH": "/usr/bin"}}"#,
        )
        .unwrap();

        assert_eq!(env.get("CCFLAGS").unwrap().to_list(), vec!["-O2", "-g"]);
        assert_eq!(env.get_string("NVCC").unwrap(), "nvcc");
        assert_eq!(env.env_var(PATH), Some("/usr/bin"));

        let reparsed = Environment::from_json(&env.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, env);
    }

    #[test_log::test]
    fn test_detect_on_environment_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = Environment::default();
        assert_eq!(env.detect("nvcc"), None);

        env.set_env_var(PATH, dir.path().to_string_lossy());
        assert_eq!(env.detect("nvcc"), None);
    }

    #[cfg(unix)]
    #[test_log::test]
    fn test_detect_finds_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let nvcc = dir.path().join("nvcc");
        std::fs::write(&nvcc, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&nvcc, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut env = Environment::default();
        env.set_env_var(PATH, dir.path().to_string_lossy());

        assert_eq!(env.detect("nvcc"), Some(nvcc));
    }
}
