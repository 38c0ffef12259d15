//! Resolution of raw invocation arguments against the pipeline

use thiserror::Error;

use crate::engine::Engine;
use crate::task::TaskRef;

/// Literal separating targets and flags from pass-through arguments
const PASS_THROUGH_SEPARATOR: &str = "--";

/// Errors during argument resolution
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    /// A positional target does not name a registered task
    #[error("task \"{0}\" not found in the pipeline")]
    UnknownTarget(String),
}

/// A raw argument vector projected onto the pipeline's task set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedArgs {
    /// Requested task names, in invocation order
    pub targets: Vec<String>,
    /// Arguments after `--`, handed to tasks verbatim
    pub pass_through: Vec<String>,
}

/// Split an argument vector into targets and pass-through arguments.
///
/// Everything after the first `--` is pass-through. Of the remaining
/// arguments, the leading run of tokens not starting with `-` are targets;
/// each must name a registered bare task or `package#task`. Flags after the
/// targets are ignored here.
pub fn resolve_targets(args: &[String], engine: &Engine) -> Result<ResolvedArgs, ArgsError> {
    let (pre_args, pass_through) = match args.iter().position(|a| a == PASS_THROUGH_SEPARATOR) {
        Some(pos) => (&args[..pos], args[pos + 1..].to_vec()),
        None => (args, Vec::new()),
    };

    let mut targets = Vec::new();
    for arg in pre_args {
        if arg.starts_with('-') {
            break;
        }
        let reference =
            TaskRef::parse(arg).map_err(|_| ArgsError::UnknownTarget(arg.clone()))?;
        if !engine.has_task(&reference) {
            return Err(ArgsError::UnknownTarget(arg.clone()));
        }
        targets.push(arg.clone());
    }

    Ok(ResolvedArgs {
        targets,
        pass_through,
    })
}
