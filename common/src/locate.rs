//! Find the CUDA Toolkit and CUDA SDK on the host filesystem.

use crate::environment::Environment;
use crate::error::ToolError;
use crate::{CUDA_SDK_PATH, CUDA_TOOLKIT_PATH};
use log::{debug, info, trace};
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};

/// The two installations a CUDA build needs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum InstallKind {
    /// The compiler distribution: `nvcc`, headers and runtime libraries.
    Toolkit,
    /// The support libraries shipped alongside the samples.
    Sdk,
}

impl InstallKind {
    /// Human readable name, used in log lines and errors.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            InstallKind::Toolkit => "CUDA Toolkit",
            InstallKind::Sdk => "CUDA SDK",
        }
    }

    /// The configuration key that overrides discovery.
    #[must_use]
    pub fn config_key(self) -> &'static str {
        match self {
            InstallKind::Toolkit => CUDA_TOOLKIT_PATH,
            InstallKind::Sdk => CUDA_SDK_PATH,
        }
    }

    /// Plausible install locations, highest priority first.
    #[must_use]
    pub fn candidates(self, host: &HostVars) -> Vec<PathBuf> {
        let (home_dirs, fixed_dirs, program_files_dirs, home_drive_dirs): (
            &[&str],
            &[&str],
            &[&str],
            &[&str],
        ) = match self {
            InstallKind::Toolkit => (
                &[
                    "NVIDIA_CUDA_TOOLKIT",
                    "Apps/NVIDIA_CUDA_TOOLKIT",
                    "Apps/CudaToolkit",
                    "Apps/CudaTK",
                ],
                &[
                    "/usr/local/NVIDIA_CUDA_TOOLKIT",
                    "/usr/local/CUDA_TOOLKIT",
                    "/usr/local/cuda_toolkit",
                    "/usr/local/CUDA",
                    "/usr/local/cuda",
                    "/Developer/NVIDIA CUDA TOOLKIT",
                    "/Developer/CUDA TOOLKIT",
                    "/Developer/CUDA",
                ],
                &[
                    "NVIDIA Corporation/NVIDIA CUDA TOOLKIT",
                    "NVIDIA Corporation/NVIDIA CUDA",
                    "NVIDIA Corporation/CUDA TOOLKIT",
                    "NVIDIA Corporation/CUDA",
                    "NVIDIA/NVIDIA CUDA TOOLKIT",
                    "NVIDIA/NVIDIA CUDA",
                    "NVIDIA/CUDA TOOLKIT",
                    "NVIDIA/CUDA",
                    "CUDA TOOLKIT",
                    "CUDA",
                ],
                &["CUDA TOOLKIT", "CUDA"],
            ),
            InstallKind::Sdk => (
                &["NVIDIA_CUDA_SDK", "Apps/NVIDIA_CUDA_SDK", "Apps/CudaSDK"],
                &[
                    "/usr/local/NVIDIA_CUDA_SDK",
                    "/usr/local/CUDASDK",
                    "/usr/local/cuda_sdk",
                    "/Developer/NVIDIA CUDA SDK",
                    "/Developer/CUDA SDK",
                    "/Developer/CUDA",
                ],
                &[
                    "NVIDIA Corporation/NVIDIA CUDA SDK",
                    "NVIDIA/NVIDIA CUDA SDK",
                    "NVIDIA CUDA SDK",
                    "CudaSDK",
                ],
                &["NVIDIA CUDA SDK", "CUDA SDK", "CUDA/SDK"],
            ),
        };

        let mut paths = Vec::new();
        paths.extend(home_dirs.iter().map(|dir| under(&host.home, dir)));
        paths.extend(fixed_dirs.iter().map(PathBuf::from));
        if !host.program_files.is_empty() {
            paths.extend(
                program_files_dirs
                    .iter()
                    .map(|dir| under(&host.program_files, dir)),
            );
        }
        paths.extend(home_drive_dirs.iter().map(|dir| under(&host.home_drive, dir)));
        paths
    }
}

/// `HOME` and `HOMEDRIVE` are prefixes: an empty one leaves an absolute path.
fn under(prefix: &str, dir: &str) -> PathBuf {
    PathBuf::from(format!("{}/{dir}", prefix.trim_end_matches(['/', '\\'])))
}

/// The host environment variables candidate paths are built from.
/// Missing variables are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostVars {
    pub home: String,
    pub program_files: String,
    pub home_drive: String,
}

impl HostVars {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            home: env::var("HOME").unwrap_or_default(),
            program_files: env::var("PROGRAMFILES").unwrap_or_default(),
            home_drive: env::var("HOMEDRIVE").unwrap_or_default(),
        }
    }
}

/// Probe the candidate directories in order and return the first that exists.
pub fn find_install<F>(kind: InstallKind, host: &HostVars, is_dir: F) -> Option<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    kind.candidates(host).into_iter().find(|path| {
        let found = is_dir(path.as_path());
        trace!("Probed {} for the {}: {found}", path.display(), kind.label());
        found
    })
}

/// Resolve an installation and record it in the environment.
///
/// An override already present in the environment is returned as-is, without
/// checking that it exists.
///
/// # Errors
/// Returns [`ToolError::InstallNotFound`] if there is no override and no candidate exists.
pub fn resolve_install<F>(
    env: &mut Environment,
    kind: InstallKind,
    host: &HostVars,
    is_dir: F,
) -> Result<PathBuf, ToolError>
where
    F: Fn(&Path) -> bool,
{
    let path = if let Some(path) = env.get_string(kind.config_key()) {
        debug!("{} set by configuration: {path}", kind.label());
        PathBuf::from(path)
    } else {
        let path = find_install(kind, host, is_dir).ok_or(ToolError::InstallNotFound { kind })?;
        info!("{} found in {}", kind.label(), path.display());
        path
    };
    env.set(kind.config_key(), path.to_string_lossy().into_owned());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn host_in(dir: &TempDir) -> HostVars {
        HostVars {
            home: dir.path().to_string_lossy().into_owned(),
            ..HostVars::default()
        }
    }

    #[test_log::test]
    fn test_override_is_returned_unchanged() {
        let mut env = Environment::default();
        env.set(CUDA_TOOLKIT_PATH, "/does/not/exist");

        let path =
            resolve_install(&mut env, InstallKind::Toolkit, &HostVars::default(), |_| false)
                .unwrap();

        assert_eq!(path, PathBuf::from("/does/not/exist"));
        assert_eq!(env.get_string(CUDA_TOOLKIT_PATH).unwrap(), "/does/not/exist");
    }

    #[test_log::test]
    fn test_override_skips_probing() {
        let mut env = Environment::default();
        env.set(CUDA_SDK_PATH, "/opt/sdk");

        let path = resolve_install(&mut env, InstallKind::Sdk, &HostVars::default(), |_| {
            panic!("override should not touch the filesystem")
        })
        .unwrap();

        assert_eq!(path, PathBuf::from("/opt/sdk"));
    }

    #[test_log::test]
    fn test_single_existing_candidate_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let host = host_in(&dir);
        let expected = dir.path().join("Apps/CudaTK");
        fs::create_dir_all(&expected).unwrap();

        let mut env = Environment::default();
        let resolved = resolve_install(&mut env, InstallKind::Toolkit, &host, Path::is_dir).unwrap();
        assert_eq!(resolved, expected);
        assert_eq!(
            env.get_string(CUDA_TOOLKIT_PATH).unwrap(),
            expected.to_string_lossy()
        );
    }

    #[test_log::test]
    fn test_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        let host = host_in(&dir);
        fs::create_dir_all(dir.path().join("Apps/CudaSDK")).unwrap();
        fs::create_dir_all(dir.path().join("NVIDIA_CUDA_SDK")).unwrap();

        let path = find_install(InstallKind::Sdk, &host, Path::is_dir);

        assert_eq!(path, Some(dir.path().join("NVIDIA_CUDA_SDK")));
    }

    #[test_log::test]
    fn test_files_are_not_installs() {
        let dir = tempfile::tempdir().unwrap();
        let host = host_in(&dir);
        fs::write(dir.path().join("NVIDIA_CUDA_TOOLKIT"), "").unwrap();

        let home_only = |p: &Path| p.starts_with(dir.path()) && p.is_dir();

        assert_eq!(find_install(InstallKind::Toolkit, &host, home_only), None);
    }

    #[test_log::test]
    fn test_no_candidate_is_an_error() {
        let mut env = Environment::default();

        let err = resolve_install(&mut env, InstallKind::Sdk, &HostVars::default(), |_| false)
            .unwrap_err();

        assert_eq!(err, ToolError::InstallNotFound { kind: InstallKind::Sdk });
        assert!(err.to_string().contains("CUDA SDK"));
        assert!(err.to_string().contains(CUDA_SDK_PATH));
        assert!(!env.contains(CUDA_SDK_PATH));
    }

    #[test_log::test]
    fn test_candidates_follow_host_vars() {
        let host = HostVars {
            home: "/home/alice".to_string(),
            program_files: "C:\\Program Files".to_string(),
            home_drive: "C:".to_string(),
        };

        let toolkit = InstallKind::Toolkit.candidates(&host);
        assert_eq!(toolkit.first(), Some(&PathBuf::from("/home/alice/NVIDIA_CUDA_TOOLKIT")));
        assert!(toolkit.contains(&PathBuf::from("/usr/local/cuda")));
        assert!(toolkit.contains(&PathBuf::from("C:\\Program Files/NVIDIA Corporation/CUDA")));
        assert_eq!(toolkit.last(), Some(&PathBuf::from("C:/CUDA")));
        assert_eq!(toolkit.len(), 24);

        let sdk = InstallKind::Sdk.candidates(&host);
        assert_eq!(sdk.first(), Some(&PathBuf::from("/home/alice/NVIDIA_CUDA_SDK")));
        assert_eq!(sdk.last(), Some(&PathBuf::from("C:/CUDA/SDK")));
        assert_eq!(sdk.len(), 16);
    }

    #[test_log::test]
    fn test_empty_program_files_is_skipped() {
        let toolkit = InstallKind::Toolkit.candidates(&HostVars::default());

        assert_eq!(toolkit.len(), 14);
        assert!(toolkit.iter().all(|p| !p.starts_with("NVIDIA Corporation")));
        assert_eq!(toolkit.first(), Some(&PathBuf::from("/NVIDIA_CUDA_TOOLKIT")));
    }
}
