//! A CLI that configures `nvcc` builds of CUDA sources.

#![warn(clippy::all, clippy::pedantic)]

extern crate nvcc_common;
use nvcc_common::command::command_line;
use nvcc_common::locate::HostVars;
use nvcc_common::registry::{ObjectKind, Registry, object_target};
use nvcc_common::tool::{exists, generate_with, register};
use nvcc_common::{
    CUDA_SDK_PATH, CUDA_TOOLKIT_PATH, Environment, NVCC, PLATFORM, TOOL_VERSION, host_platform,
};

extern crate serde_json;
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// What to do with the configured environment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Locate CUDA, configure the environment and print it as JSON.
    Configure,
    /// Report whether nvcc is on the environment's search path.
    Exists,
    /// Print the nvcc command line for each source.
    Command,
    /// Print the includes found in each source.
    Scan,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The operation to run
    #[arg(value_enum, default_value = "configure", env = "NVCC_TOOL_MODE")]
    mode: Mode,

    /// Source files for the command and scan modes
    sources: Vec<PathBuf>,

    /// A JSON file to seed the environment with instead of the host defaults
    #[arg(short, long, env = "NVCC_TOOL_CONFIG")]
    config: Option<PathBuf>,

    /// Use this CUDA Toolkit instead of searching for one
    #[arg(long, env = "CUDA_TOOLKIT_PATH")]
    toolkit_path: Option<String>,

    /// Use this CUDA SDK instead of searching for one
    #[arg(long, env = "CUDA_SDK_PATH")]
    sdk_path: Option<String>,

    /// The CUDA compiler to run
    #[arg(long, env = "NVCC")]
    nvcc: Option<String>,

    /// Override the platform identifier (posix, darwin, win32, ...)
    #[arg(long, env = "NVCC_TOOL_PLATFORM")]
    platform: Option<String>,

    /// Which object builder to use for the command mode
    #[arg(long, value_enum, default_value = "static", env = "NVCC_TOOL_OBJECT")]
    object: ObjectKind,

    /// Write the object to this path (command mode, single source only)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suppress all output
    #[arg(short, long, env = "NVCC_TOOL_QUIET")]
    quiet: bool,

    /// Show additional output
    #[arg(short, long, env = "NVCC_TOOL_VERBOSE")]
    verbose: bool,
}

/// Build the starting environment from the config file, the host and the CLI overrides.
fn load_environment(cli: &Cli) -> Result<Environment> {
    let mut env = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Could not read {}", path.display()))?;
            let mut env = Environment::from_json(&json)
                .with_context(|| format!("Could not parse {}", path.display()))?;
            env.set_default(PLATFORM, host_platform());
            env
        }
        None => Environment::for_host(),
    };

    for (key, value) in [
        (CUDA_TOOLKIT_PATH, &cli.toolkit_path),
        (CUDA_SDK_PATH, &cli.sdk_path),
        (NVCC, &cli.nvcc),
        (PLATFORM, &cli.platform),
    ] {
        if let Some(value) = value {
            debug!("{key} set from the command line");
            env.set(key, value.as_str());
        }
    }
    Ok(env)
}

/// Quote an argument for display if a shell would split it.
fn display_arg(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(char::is_whitespace) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

fn run<F>(cli: &Cli, vars: &HostVars, is_dir: F) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    let mut env = load_environment(cli)?;
    let mut registry = Registry::default();

    match cli.mode {
        Mode::Exists => {
            let nvcc = env.get_string(NVCC).unwrap_or_else(|| "nvcc".to_string());
            if !exists(&env) {
                bail!("{nvcc} was not found on the search path");
            }
            if !cli.quiet && let Some(path) = env.detect(&nvcc) {
                println!("{}", path.display());
            }
        }
        Mode::Configure => {
            let installation = generate_with(&mut env, &mut registry, vars, is_dir)?;
            info!(
                "Configured with toolkit {} and SDK {}",
                installation.toolkit.display(),
                installation.sdk.display()
            );
            if !cli.quiet {
                let report = serde_json::json!({
                    "installation": installation,
                    "registry": registry,
                    "environment": env,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Mode::Command => {
            if cli.sources.is_empty() {
                bail!("No sources given");
            }
            if cli.output.is_some() && cli.sources.len() > 1 {
                bail!("--output can only be used with a single source");
            }
            generate_with(&mut env, &mut registry, vars, is_dir)?;
            let platform = env.get_string(PLATFORM).unwrap_or_default();
            for source in &cli.sources {
                let target = cli
                    .output
                    .clone()
                    .unwrap_or_else(|| object_target(cli.object, source, &platform));
                let args = command_line(&env, &registry, cli.object, source, &target)?;
                if !cli.quiet {
                    let line: Vec<String> = args.iter().map(|arg| display_arg(arg)).collect();
                    println!("{}", line.join(" "));
                }
            }
        }
        Mode::Scan => {
            register(&mut registry);
            for source in &cli.sources {
                let Some(scanner) = registry.scanner_for(source) else {
                    bail!("No scanner is registered for {}", source.display());
                };
                let text = fs::read_to_string(source)
                    .with_context(|| format!("Could not read {}", source.display()))?;
                if cli.quiet {
                    continue;
                }
                println!("{}:", source.display());
                for include in scanner.scan(&text) {
                    if include.system {
                        println!("  <{}>", include.path);
                    } else {
                        println!("  \"{}\"", include.path);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Report a fatal error and pick the process exit status.
fn exit_status(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    }
}

fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Set up logger
    env_logger::init();

    if cli.verbose {
        println!("nvcc tool v{TOOL_VERSION}");
        println!("CLI Inputs: {cli:?}");
    }

    let status = exit_status(&run(&cli, &HostVars::from_env(), Path::is_dir));
    if status != 0 {
        std::process::exit(status);
    }
}
