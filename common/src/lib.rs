//! A library for locating CUDA installations and configuring `nvcc` builds of `.cu` sources.

pub mod command;
pub mod environment;
pub mod error;
pub mod flags;
pub mod locate;
pub mod registry;
pub mod scanner;
pub mod tool;

pub use environment::{Environment, Value};
pub use error::ToolError;

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The source suffix handled by this tool.
pub const CUDA_SUFFIX: &str = ".cu";

// Configuration keys read or written during a configuration pass.
pub const CUDA_TOOLKIT_PATH: &str = "CUDA_TOOLKIT_PATH";
pub const CUDA_SDK_PATH: &str = "CUDA_SDK_PATH";
pub const NVCC: &str = "NVCC";
pub const NVCCFLAGS: &str = "NVCCFLAGS";
pub const ENABLESHAREDNVCCFLAG: &str = "ENABLESHAREDNVCCFLAG";
pub const STATICNVCCCMD: &str = "STATICNVCCCMD";
pub const SHAREDNVCCCMD: &str = "SHAREDNVCCCMD";
pub const PLATFORM: &str = "PLATFORM";
pub const CPPPATH: &str = "CPPPATH";
pub const CPPFLAGS: &str = "CPPFLAGS";
pub const CPPDEFINES: &str = "CPPDEFINES";
pub const LIBPATH: &str = "LIBPATH";
pub const LIBS: &str = "LIBS";
pub const CCFLAGS: &str = "CCFLAGS";

/// The name of the executable search path inside the process environment.
pub const PATH: &str = "PATH";

/// The platform identifier for the machine this was built for.
/// Follows the usual build-system names rather than Rust's target names.
#[must_use]
pub fn host_platform() -> &'static str {
    match std::env::consts::OS {
        "linux" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => "posix",
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}
