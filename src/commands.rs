use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use bytes::{BufMut, BytesMut};
use log::debug;

use crate::config::Config;
use crate::error::{ShellError, ShellResult};
use crate::redirection::Operator;

/// Commands implemented by the shell itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Exit,
    Echo,
    Type,
    Pwd,
    Cd,
}

impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::Exit,
        Builtin::Echo,
        Builtin::Type,
        Builtin::Pwd,
        Builtin::Cd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Exit => "exit",
            Builtin::Echo => "echo",
            Builtin::Type => "type",
            Builtin::Pwd => "pwd",
            Builtin::Cd => "cd",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

pub fn is_builtin(name: &str) -> bool {
    Builtin::from_name(name).is_some()
}

/// A command name and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    pub fn from_tokens(tokens: Vec<String>) -> Option<Self> {
        let mut tokens = tokens.into_iter();
        let name = tokens.next()?;
        Some(Self {
            name,
            args: tokens.collect(),
        })
    }
}

/// Output a command produced, before it is routed.
#[derive(Debug, Default)]
pub struct Capture {
    pub stdout: BytesMut,
    pub stderr: BytesMut,
}

impl Capture {
    pub fn from_stdout(text: impl AsRef<[u8]>) -> Self {
        Self {
            stdout: BytesMut::from(text.as_ref()),
            stderr: BytesMut::new(),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// Output is waiting to be routed.
    Captured(Capture),
    /// Nothing left to do for this line.
    Done,
    /// The shell should stop.
    Exit,
}

/// Runs a command.
///
/// `cat` and `ls` report per-argument failures themselves, and may write to
/// `terminal` directly depending on `operator`.
pub fn execute<W: Write>(
    command: &ParsedCommand,
    operator: Option<Operator>,
    config: &Config,
    terminal: &mut W,
) -> ShellResult<Outcome> {
    let name = command.name.as_str();
    let args = command.args.as_slice();

    match Builtin::from_name(name) {
        Some(Builtin::Exit) => Ok(Outcome::Exit),
        Some(Builtin::Echo) => Ok(Outcome::Captured(Capture::from_stdout(args.join(" ")))),
        Some(Builtin::Type) => execute_type(args, config),
        Some(Builtin::Pwd) => env::current_dir()
            .map(|p| Outcome::Captured(Capture::from_stdout(p.display().to_string())))
            .map_err(ShellError::CurrentDir),
        Some(Builtin::Cd) => execute_cd(args, config),
        None if matches!(name, "cat" | "ls") => {
            execute_per_argument(name, args, operator, config, terminal)
        }
        None => execute_external(name, args, config),
    }
}

fn execute_type(args: &[String], config: &Config) -> ShellResult<Outcome> {
    let Some(arg) = args.first() else {
        return Ok(Outcome::Captured(Capture::from_stdout("type: missing argument")));
    };

    let report = if is_builtin(arg) {
        format!("{} is a shell builtin", arg)
    } else {
        match full_path(arg, &config.path_dirs) {
            Some(path) => format!("{} is {}", arg, path.display()),
            None => return Err(ShellError::recoverable(format!("{}: not found", arg))),
        }
    };
    Ok(Outcome::Captured(Capture::from_stdout(report)))
}

fn execute_cd(args: &[String], config: &Config) -> ShellResult<Outcome> {
    let home = || {
        config
            .home
            .clone()
            .ok_or_else(|| ShellError::recoverable("cd: HOME not set"))
    };
    let target = match args.first().map(String::as_str) {
        None | Some("~") => home()?,
        Some(arg) => match arg.strip_prefix("~/") {
            Some(rest) => format!("{}/{}", home()?, rest),
            None => arg.to_string(),
        },
    };

    match env::set_current_dir(&target) {
        Ok(()) => Ok(Outcome::Done),
        Err(e) if is_path_error(e.kind()) => Err(ShellError::recoverable(format!(
            "cd: {}: No such file or directory",
            target
        ))),
        Err(source) => Err(ShellError::ChangeDir {
            path: target,
            source,
        }),
    }
}

/// Failures caused by the path itself rather than by the system.
fn is_path_error(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::NotFound
            | io::ErrorKind::NotADirectory
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::InvalidFilename
            | io::ErrorKind::InvalidInput
    )
}

/// `cat`/`ls`: one process per argument, a failed argument does not stop
/// the rest.
fn execute_per_argument<W: Write>(
    name: &str,
    args: &[String],
    operator: Option<Operator>,
    config: &Config,
    terminal: &mut W,
) -> ShellResult<Outcome> {
    let mut capture = Capture::default();
    let to_stderr = operator.is_some_and(Operator::is_stderr);

    for arg in args {
        match run(name, std::slice::from_ref(arg), config) {
            Ok(output) if output.status.success() => {
                let text = trim_newlines(&output.stdout);
                if to_stderr {
                    terminal
                        .write_all(text)
                        .and_then(|_| terminal.write_all(b"\n"))
                        .map_err(ShellError::Output)?;
                } else {
                    capture.stdout.put_slice(text);
                    if operator.is_some_and(Operator::is_append) {
                        capture.stdout.put_u8(b'\n');
                    }
                }
            }
            _ => {
                let line = format!("{}: {}: No such file or directory\n", name, arg);
                if to_stderr {
                    capture.stderr.put_slice(line.as_bytes());
                } else {
                    terminal
                        .write_all(line.as_bytes())
                        .map_err(ShellError::Output)?;
                }
            }
        }
    }

    Ok(Outcome::Captured(capture))
}

fn execute_external(name: &str, args: &[String], config: &Config) -> ShellResult<Outcome> {
    if full_path(name, &config.path_dirs).is_none() {
        return Err(ShellError::recoverable(format!("{}: command not found", name)));
    }

    let output = run(name, args, config).map_err(|source| ShellError::Spawn {
        program: name.to_string(),
        source,
    })?;
    if !output.status.success() {
        return Err(ShellError::ExitStatus {
            program: name.to_string(),
            status: output.status,
        });
    }

    Ok(Outcome::Captured(Capture {
        stdout: BytesMut::from(trim_newlines(&output.stdout)),
        stderr: BytesMut::from(output.stderr.as_slice()),
    }))
}

/// Spawns `name` and waits for it. The program keeps `name` as its argv[0]
/// even when it was resolved through `PATH`.
fn run(name: &str, args: &[String], config: &Config) -> io::Result<Output> {
    let mut command = match full_path(name, &config.path_dirs) {
        Some(path) => {
            let mut command = Command::new(path);
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                command.arg0(name);
            }
            command
        }
        None => Command::new(name),
    };
    debug!("spawning {} {:?}", name, args);
    let output = command.args(args).output()?;
    debug!("{} exited with {}", name, output.status);
    Ok(output)
}

fn trim_newlines(bytes: &[u8]) -> &[u8] {
    let is_newline = |b: &u8| *b == b'\n' || *b == b'\r';
    let start = bytes
        .iter()
        .position(|b| !is_newline(b))
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !is_newline(b))
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Finds the full path of a command by searching the given directories in
/// order.
pub fn full_path(command: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(command))
        .find(|full| is_executable(full))
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path).is_ok_and(|m| {
        m.is_file() && {
            #[cfg(unix)]
            {
                m.permissions().mode() & 0o111 != 0
            }
            #[cfg(not(unix))]
            {
                true
            }
        }
    })
}
