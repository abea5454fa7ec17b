use std::io;

use thiserror::Error;

pub type ShellResult<T> = Result<T, ShellError>;

/// Everything that can go wrong while running one command line.
///
/// `Recoverable` is shown to the user and the loop carries on. Every other
/// variant terminates the shell.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{0}")]
    Recoverable(String),

    #[error("failed to read input")]
    Input(#[source] io::Error),

    #[error("unexpected end of input")]
    EndOfInput,

    #[error("failed to write to the terminal")]
    Output(#[source] io::Error),

    #[error("failed to get current directory")]
    CurrentDir(#[source] io::Error),

    #[error("cd: {path}")]
    ChangeDir {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}")]
    ExitStatus {
        program: String,
        status: std::process::ExitStatus,
    },

    #[error("failed to write `{path}`")]
    Redirect {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ShellError {
    pub fn recoverable(message: impl Into<String>) -> Self {
        ShellError::Recoverable(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, ShellError::Recoverable(_))
    }
}
