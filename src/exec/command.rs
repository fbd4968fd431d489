// src/exec/command.rs

//! Command descriptions and the seams the kernel runs them through.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Result;
use crate::logs::Log;

/// Pure description of one external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Arguments may contain secrets (passwords); never log them.
    pub censored: bool,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            censored: false,
        }
    }

    pub fn censored(mut self) -> Self {
        self.censored = true;
        self
    }

    /// Render `template` by replacing `{key}` placeholders, then split the
    /// result on whitespace into program and arguments.
    ///
    /// Returns `None` when the rendered template is blank. Unknown
    /// placeholders are left as-is.
    pub fn from_template(template: &str, vars: &[(&str, &str)]) -> Option<Self> {
        let rendered = render(template, vars);
        let mut words = rendered.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program, words))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.censored {
            write!(f, "{} <censored arguments>", self.program)
        } else if self.args.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, self.args.join(" "))
        }
    }
}

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

/// Boxed future returned by [`ExternalCommand::run`].
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// One external process invocation.
///
/// `run` streams every output line to the log and resolves to the captured
/// output once the process exits. `stop` may be called from any thread while
/// `run` is pending and must make it resolve with an error.
pub trait ExternalCommand: Send + Sync {
    /// Human-readable identity, honouring censoring.
    fn describe(&self) -> String;

    fn run<'a>(&'a self, log: &'a dyn Log) -> CommandFuture<'a>;

    fn stop(&self, log: &dyn Log);
}

/// Turns command descriptions into runnable commands.
///
/// Production uses [`super::ShellLauncher`]; tests substitute scripted
/// launchers so no real `mount` or `nmap` is needed.
pub trait CommandLauncher: Send + Sync {
    fn launch(&self, spec: CommandSpec) -> Arc<dyn ExternalCommand>;
}
