//! Command-line templates and their expansion into argument vectors.
//!
//! Templates are stored in the environment as text, e.g.
//! `$NVCC -o $TARGET -c $NVCCFLAGS $cuda_strip_flags $_CCCOMCOM $SOURCES`,
//! so a build script can override them. They are only expanded when a command
//! is about to run, which means every variable reflects the environment at that point.

use crate::environment::Environment;
use crate::error::ToolError;
use crate::flags::strip_flag_list;
use crate::registry::{ObjectKind, Registry, source_suffix};
use crate::{CCFLAGS, CPPDEFINES, CPPFLAGS, CPPPATH};
use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

/// Variables that expand to other variables stop being expanded past this depth.
const MAX_EXPANSION_DEPTH: usize = 16;

/// Expands to `CCFLAGS` with the flags `nvcc` rejects removed.
pub const STRIP_FLAGS_VAR: &str = "cuda_strip_flags";

/// Expands to the preprocessor flags, defines and include directories.
pub const CCCOMCOM_VAR: &str = "_CCCOMCOM";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Var(String),
}

/// One whitespace-separated word of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Word(Vec<Piece>);

impl Word {
    fn parse(word: &str) -> Self {
        let mut pieces = Vec::new();
        let mut text = String::new();
        let mut chars = word.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                text.push(c);
                continue;
            }
            let name = match chars.peek().copied() {
                Some('$') => {
                    chars.next();
                    text.push('$');
                    continue;
                }
                Some('{') => {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                }
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if !(c.is_ascii_alphanumeric() || c == '_') {
                            break;
                        }
                        name.push(c);
                        chars.next();
                    }
                    name
                }
                _ => {
                    text.push('$');
                    continue;
                }
            };
            if !text.is_empty() {
                pieces.push(Piece::Text(std::mem::take(&mut text)));
            }
            pieces.push(Piece::Var(name));
        }
        if !text.is_empty() {
            pieces.push(Piece::Text(text));
        }
        Word(pieces)
    }

    fn expand(&self, ctx: &Expansion<'_>, depth: usize) -> Vec<String> {
        // A bare variable may expand to any number of arguments
        if let [Piece::Var(name)] = self.0.as_slice() {
            return ctx.lookup(name, depth);
        }
        let mut out = String::new();
        for piece in &self.0 {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Var(name) => out.push_str(&ctx.lookup(name, depth).join(" ")),
            }
        }
        if out.is_empty() { Vec::new() } else { vec![out] }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for piece in &self.0 {
            match piece {
                Piece::Text(text) => write!(f, "{}", text.replace('$', "$$"))?,
                Piece::Var(name) => write!(f, "${{{name}}}")?,
            }
        }
        Ok(())
    }
}

/// A parsed command-line template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    words: Vec<Word>,
}

impl CommandTemplate {
    #[must_use]
    pub fn parse(template: &str) -> Self {
        Self {
            words: template.split_whitespace().map(Word::parse).collect(),
        }
    }

    /// Names of every variable the template refers to directly, in order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        self.words
            .iter()
            .flat_map(|word| &word.0)
            .filter_map(|piece| match piece {
                Piece::Var(name) => Some(name.as_str()),
                Piece::Text(_) => None,
            })
            .collect()
    }

    /// Expand into the arguments of a single process invocation.
    #[must_use]
    pub fn expand(&self, env: &Environment, target: &Path, sources: &[PathBuf]) -> Vec<String> {
        let ctx = Expansion {
            env,
            target,
            sources,
        };
        self.words
            .iter()
            .flat_map(|word| word.expand(&ctx, 0))
            .collect()
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words: Vec<String> = self.words.iter().map(ToString::to_string).collect();
        write!(f, "{}", words.join(" "))
    }
}

struct Expansion<'a> {
    env: &'a Environment,
    target: &'a Path,
    sources: &'a [PathBuf],
}

impl Expansion<'_> {
    fn lookup(&self, name: &str, depth: usize) -> Vec<String> {
        match name {
            "TARGET" | "TARGETS" => vec![self.target.display().to_string()],
            "SOURCES" => self
                .sources
                .iter()
                .map(|source| source.display().to_string())
                .collect(),
            "SOURCE" => self
                .sources
                .first()
                .map(|source| vec![source.display().to_string()])
                .unwrap_or_default(),
            STRIP_FLAGS_VAR => strip_flag_list(&self.variable(CCFLAGS, depth)),
            CCCOMCOM_VAR => self.cccomcom(depth),
            _ => self.variable(name, depth),
        }
    }

    fn variable(&self, name: &str, depth: usize) -> Vec<String> {
        let Some(value) = self.env.get(name) else {
            return Vec::new();
        };
        let args = value.to_args();
        if depth >= MAX_EXPANSION_DEPTH {
            return args;
        }
        args.iter()
            .flat_map(|arg| Word::parse(arg).expand(self, depth + 1))
            .collect()
    }

    fn list(&self, name: &str, depth: usize) -> Vec<String> {
        let Some(value) = self.env.get(name) else {
            return Vec::new();
        };
        value
            .to_list()
            .iter()
            .flat_map(|entry| {
                if depth >= MAX_EXPANSION_DEPTH {
                    vec![entry.clone()]
                } else {
                    Word::parse(entry).expand(self, depth + 1)
                }
            })
            .collect()
    }

    fn cccomcom(&self, depth: usize) -> Vec<String> {
        let mut args = self.variable(CPPFLAGS, depth);
        args.extend(
            self.list(CPPDEFINES, depth)
                .into_iter()
                .map(|define| format!("-D{define}")),
        );
        args.extend(
            self.list(CPPPATH, depth)
                .into_iter()
                .map(|dir| format!("-I{dir}")),
        );
        args
    }
}

/// Build the command line that compiles `source` into `target` as a `kind` object.
///
/// # Errors
/// Returns an error if no builder handles the source suffix, or if the
/// registered command variable is missing from the environment.
pub fn command_line(
    env: &Environment,
    registry: &Registry,
    kind: ObjectKind,
    source: &Path,
    target: &Path,
) -> Result<Vec<String>, ToolError> {
    let command_var = registry
        .action_for(kind, source)
        .ok_or_else(|| ToolError::NoBuilder {
            suffix: source_suffix(source).unwrap_or_default(),
        })?;
    let template = env
        .get_string(command_var)
        .ok_or_else(|| ToolError::Undefined {
            key: command_var.to_string(),
        })?;
    let args = CommandTemplate::parse(&template).expand(env, target, &[source.to_path_buf()]);
    debug!("{command_var}: {}", args.join(" "));
    Ok(args)
}
