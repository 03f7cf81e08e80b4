use crate::locate::InstallKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// No override was given and none of the candidate directories exist.
    #[error("Cannot find the {} path. Please set env['{}'] to point to your installation.", .kind.label(), .kind.config_key())]
    InstallNotFound { kind: InstallKind },

    #[error("No builder action is registered for '{suffix}' sources")]
    NoBuilder { suffix: String },

    #[error("The command variable {key} is not set")]
    Undefined { key: String },
}
