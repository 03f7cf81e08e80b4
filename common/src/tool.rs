//! Register `.cu` support with a build host and configure the environment for `nvcc`.

use crate::environment::Environment;
use crate::error::ToolError;
use crate::locate::{HostVars, InstallKind, resolve_install};
use crate::registry::{BuildHost, ObjectKind};
use crate::scanner::ScannerKind;
use crate::{
    CPPPATH, CUDA_SUFFIX, ENABLESHAREDNVCCFLAG, LIBPATH, LIBS, NVCC, NVCCFLAGS, PATH, PLATFORM,
    SHAREDNVCCCMD, STATICNVCCCMD,
};
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_NVCC: &str = "nvcc";
pub const DEFAULT_SHARED_FLAG: &str = "-shared";
pub const DEFAULT_STATIC_COMMAND: &str =
    "$NVCC -o $TARGET -c $NVCCFLAGS $cuda_strip_flags $_CCCOMCOM $SOURCES";
pub const DEFAULT_SHARED_COMMAND: &str =
    "$NVCC -o $TARGET -c $NVCCFLAGS $cuda_strip_flags $_CCCOMCOM $ENABLESHAREDNVCCFLAG $SOURCES";

/// The runtime library every CUDA object links against.
pub const CUDA_RUNTIME_LIB: &str = "cudart";

/// Where the toolkit and SDK were found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Installation {
    pub toolkit: PathBuf,
    pub sdk: PathBuf,
}

/// The SDK keeps its prebuilt libraries in a per-platform subdirectory.
#[must_use]
pub fn sdk_lib_subdir(platform: &str) -> &'static str {
    match platform {
        "posix" => "/linux",
        "darwin" => "/darwin",
        _ => "",
    }
}

/// Attach the `.cu` builders and include scanner to a build host.
pub fn register<H: BuildHost>(host: &mut H) {
    host.add_action(ObjectKind::Static, CUDA_SUFFIX, STATICNVCCCMD);
    host.add_action(ObjectKind::Shared, CUDA_SUFFIX, SHAREDNVCCCMD);
    host.add_scanner(CUDA_SUFFIX, ScannerKind::CInclude);
}

/// Register CUDA support and configure `env`, probing the real filesystem.
///
/// # Errors
/// Returns an error if the toolkit or the SDK cannot be located.
pub fn generate<H: BuildHost>(
    env: &mut Environment,
    host: &mut H,
    vars: &HostVars,
) -> Result<Installation, ToolError> {
    generate_with(env, host, vars, Path::is_dir)
}

/// Like [`generate`], with a custom directory probe for install discovery.
///
/// Search paths are only touched once both installations are resolved. The
/// `PATH` prepend never duplicates the toolkit `bin` directory, but the
/// include, library path and library appends are literal: running this twice
/// lists those entries twice.
///
/// # Errors
/// Returns an error if the toolkit or the SDK cannot be located.
pub fn generate_with<H, F>(
    env: &mut Environment,
    host: &mut H,
    vars: &HostVars,
    is_dir: F,
) -> Result<Installation, ToolError>
where
    H: BuildHost,
    F: Fn(&Path) -> bool,
{
    register(host);

    env.set_default(NVCC, DEFAULT_NVCC);
    env.set_default(NVCCFLAGS, "");
    env.set_default(ENABLESHAREDNVCCFLAG, DEFAULT_SHARED_FLAG);
    env.set_default(STATICNVCCCMD, DEFAULT_STATIC_COMMAND);
    env.set_default(SHAREDNVCCCMD, DEFAULT_SHARED_COMMAND);

    let toolkit = resolve_install(env, InstallKind::Toolkit, vars, &is_dir)?;
    let sdk = resolve_install(env, InstallKind::Sdk, vars, &is_dir)?;

    let platform = env.get_string(PLATFORM).unwrap_or_default();
    let sub_lib_dir = sdk_lib_subdir(&platform);
    debug!("SDK library subdirectory for platform '{platform}': '{sub_lib_dir}'");

    env.prepend_env_path(PATH, &toolkit.join("bin"));

    let toolkit_dir = toolkit.to_string_lossy();
    let sdk_dir = sdk.to_string_lossy();
    env.append(
        CPPPATH,
        [format!("{sdk_dir}/common/inc"), format!("{toolkit_dir}/include")],
    );
    env.append(
        LIBPATH,
        [
            format!("{sdk_dir}/lib"),
            format!("{sdk_dir}/common/lib{sub_lib_dir}"),
            format!("{toolkit_dir}/lib"),
        ],
    );
    env.append(LIBS, [CUDA_RUNTIME_LIB]);

    Ok(Installation { toolkit, sdk })
}

/// Whether the CUDA compiler can be found on the environment's search path.
/// A build host uses this to decide whether to offer the tool at all.
#[must_use]
pub fn exists(env: &Environment) -> bool {
    let nvcc = env.get_string(NVCC).unwrap_or_else(|| DEFAULT_NVCC.to_string());
    env.detect(&nvcc).is_some()
}
