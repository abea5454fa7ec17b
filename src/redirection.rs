use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use bytes::{BufMut, BytesMut};
use log::debug;

use crate::commands::Capture;
use crate::error::{ShellError, ShellResult};

/// Represents a redirection operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    StdoutTruncate,
    StdoutAppend,
    StderrTruncate,
    StderrAppend,
}

impl Operator {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            ">" | "1>" => Some(Operator::StdoutTruncate),
            ">>" | "1>>" => Some(Operator::StdoutAppend),
            "2>" => Some(Operator::StderrTruncate),
            "2>>" => Some(Operator::StderrAppend),
            _ => None,
        }
    }

    pub fn is_append(self) -> bool {
        matches!(self, Operator::StdoutAppend | Operator::StderrAppend)
    }

    pub fn is_stderr(self) -> bool {
        matches!(self, Operator::StderrTruncate | Operator::StderrAppend)
    }
}

/// Where the output of a command line goes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedirectionSpec {
    pub operator: Option<Operator>,
    pub target: Option<String>,
    /// Words after the target. They are appended to the redirected output.
    pub extra_args: Vec<String>,
}

impl RedirectionSpec {
    fn active(&self) -> Option<(Operator, &str)> {
        Some((self.operator?, self.target.as_deref()?))
    }
}

/// Splits tokens at the first redirection operator.
///
/// Only argument positions are scanned, so the command name itself is never
/// taken as an operator and the returned command tokens are never empty when
/// `tokens` is not.
pub fn detect_redirection(mut tokens: Vec<String>) -> (Vec<String>, RedirectionSpec) {
    let found = tokens
        .iter()
        .enumerate()
        .skip(1)
        .find_map(|(i, token)| Operator::from_token(token).map(|op| (i, op)));

    let Some((i, operator)) = found else {
        return (tokens, RedirectionSpec::default());
    };

    let mut rest = tokens.split_off(i).into_iter().skip(1);
    let spec = RedirectionSpec {
        operator: Some(operator),
        target: rest.next(),
        extra_args: rest.collect(),
    };
    (tokens, spec)
}

/// Checks that everything before the last `/` of `target` exists.
fn parent_exists(target: &str) -> bool {
    match target.rsplit_once('/') {
        Some(("", _)) => true,
        Some((dir, _)) => Path::new(dir).exists(),
        None => true,
    }
}

fn open_options(append: bool) -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    if append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options
}

/// Writes content to a file. In append mode the content goes on a new line.
pub fn write_to_file(file: &str, content: &[u8], append: bool) -> Result<(), io::Error> {
    let mut payload = BytesMut::with_capacity(content.len() + 1);
    if append {
        payload.put_u8(b'\n');
    }
    payload.put_slice(content);
    open_options(append)
        .open(file)
        .and_then(|mut f| f.write_all(&payload))
}

/// Sends the captured output of `command` to the terminal or to the
/// redirection target.
///
/// A missing target directory is reported as a recoverable error and nothing
/// is written.
pub fn route_output<W: Write, E: Write>(
    command: &str,
    capture: Capture,
    spec: &RedirectionSpec,
    out: &mut W,
    err: &mut E,
) -> ShellResult<()> {
    let Capture { mut stdout, stderr } = capture;

    let Some((operator, target)) = spec.active() else {
        stdout.put_u8(b'\n');
        out.write_all(&stdout).map_err(ShellError::Output)?;
        return err.write_all(&stderr).map_err(ShellError::Output);
    };

    if !spec.extra_args.is_empty() {
        stdout.put_u8(b' ');
        stdout.put_slice(spec.extra_args.join(" ").as_bytes());
    }

    if !parent_exists(target) {
        return Err(ShellError::recoverable(format!(
            "no such file or directory: {}",
            target
        )));
    }

    debug!("redirecting {:?} to {}", operator, target);
    let content = if operator.is_stderr() { &stderr } else { &stdout };
    write_to_file(target, content, operator.is_append()).map_err(|source| {
        ShellError::Redirect {
            path: target.to_string(),
            source,
        }
    })?;

    if operator.is_stderr() {
        // echo has nothing on stderr, its output still belongs on screen
        if command == "echo" {
            stdout.put_u8(b'\n');
            out.write_all(&stdout).map_err(ShellError::Output)?;
        }
        Ok(())
    } else {
        err.write_all(&stderr).map_err(ShellError::Output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    fn capture(stdout: &str, stderr: &str) -> Capture {
        Capture {
            stdout: BytesMut::from(stdout.as_bytes()),
            stderr: BytesMut::from(stderr.as_bytes()),
        }
    }

    fn target(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_parse_stdout_redirect() {
        let (command, spec) = detect_redirection(words("echo hi > out.txt"));
        assert_eq!(command, vec!["echo", "hi"]);
        assert_eq!(spec.operator, Some(Operator::StdoutTruncate));
        assert_eq!(spec.target.as_deref(), Some("out.txt"));
        assert!(spec.extra_args.is_empty());
    }

    #[test]
    fn test_parse_stderr_redirect() {
        let (command, spec) = detect_redirection(words("ls 2>> err.txt"));
        assert_eq!(command, vec!["ls"]);
        assert_eq!(spec.operator, Some(Operator::StderrAppend));
    }

    #[test]
    fn test_operator_tokens() {
        assert_eq!(Operator::from_token("1>"), Some(Operator::StdoutTruncate));
        assert_eq!(Operator::from_token("1>>"), Some(Operator::StdoutAppend));
        assert_eq!(Operator::from_token("2>"), Some(Operator::StderrTruncate));
        assert_eq!(Operator::from_token("3>"), None);
        assert!(Operator::StderrAppend.is_append());
        assert!(!Operator::StdoutTruncate.is_stderr());
    }

    #[test]
    fn test_first_operator_wins_and_rest_is_extra() {
        let (command, spec) = detect_redirection(words("echo a > f.txt b >> g.txt"));
        assert_eq!(command, vec!["echo", "a"]);
        assert_eq!(spec.target.as_deref(), Some("f.txt"));
        assert_eq!(spec.extra_args, vec!["b", ">>", "g.txt"]);
    }

    #[test]
    fn test_no_redirect() {
        let (command, spec) = detect_redirection(words("echo a b"));
        assert_eq!(command, vec!["echo", "a", "b"]);
        assert_eq!(spec, RedirectionSpec::default());
    }

    #[test]
    fn test_command_name_is_not_an_operator() {
        let (command, spec) = detect_redirection(words("> x"));
        assert_eq!(command, vec![">", "x"]);
        assert_eq!(spec.operator, None);
    }

    #[test]
    fn test_operator_without_target() {
        let (command, spec) = detect_redirection(words("echo hi >"));
        assert_eq!(command, vec!["echo", "hi"]);
        assert_eq!(spec.operator, Some(Operator::StdoutTruncate));
        assert_eq!(spec.target, None);
    }

    #[test]
    fn test_parent_exists() {
        assert!(parent_exists("out.txt"));
        assert!(parent_exists("/out.txt"));
        assert!(!parent_exists("/definitely/not/here/out.txt"));
    }

    #[test]
    fn test_truncate_then_append() {
        let dir = TempDir::new().unwrap();
        let file = target(&dir, "out.txt");
        write_to_file(&file, b"first", false).unwrap();
        write_to_file(&file, b"second", true).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "first\nsecond");
        write_to_file(&file, b"third", false).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "third");
    }

    #[cfg(unix)]
    #[test]
    fn test_created_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let file = target(&dir, "mode.txt");
        write_to_file(&file, b"x", false).unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        // the process umask can only remove bits
        assert_eq!(mode & !0o644, 0);
    }

    #[test]
    fn test_route_to_terminal() {
        let (mut out, mut err): (Vec<u8>, Vec<u8>) = (Vec::new(), Vec::new());
        route_output(
            "foo",
            capture("hello", "oops\n"),
            &RedirectionSpec::default(),
            &mut out,
            &mut err,
        )
        .unwrap();
        assert_eq!(out, b"hello\n");
        assert_eq!(err, b"oops\n");
    }

    #[test]
    fn test_route_stdout_with_extra_args() {
        let dir = TempDir::new().unwrap();
        let file = target(&dir, "out.txt");
        let spec = RedirectionSpec {
            operator: Some(Operator::StdoutTruncate),
            target: Some(file.clone()),
            extra_args: vec!["b".to_string(), "c".to_string()],
        };
        let (mut out, mut err): (Vec<u8>, Vec<u8>) = (Vec::new(), Vec::new());
        route_output("echo", capture("a", ""), &spec, &mut out, &mut err).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "a b c");
        assert!(out.is_empty());
    }

    #[test]
    fn test_route_stderr_keeps_echo_on_screen() {
        let dir = TempDir::new().unwrap();
        let file = target(&dir, "err.txt");
        let spec = RedirectionSpec {
            operator: Some(Operator::StderrTruncate),
            target: Some(file.clone()),
            extra_args: Vec::new(),
        };
        let (mut out, mut err): (Vec<u8>, Vec<u8>) = (Vec::new(), Vec::new());
        route_output("echo", capture("hi", ""), &spec, &mut out, &mut err).unwrap();
        assert_eq!(out, b"hi\n");
        assert_eq!(fs::read_to_string(&file).unwrap(), "");

        out.clear();
        route_output("pwd", capture("/tmp", ""), &spec, &mut out, &mut err).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_route_missing_directory() {
        let dir = TempDir::new().unwrap();
        let file = target(&dir, "missing/out.txt");
        let spec = RedirectionSpec {
            operator: Some(Operator::StdoutAppend),
            target: Some(file.clone()),
            extra_args: Vec::new(),
        };
        let (mut out, mut err): (Vec<u8>, Vec<u8>) = (Vec::new(), Vec::new());
        let result = route_output("echo", capture("hi", ""), &spec, &mut out, &mut err);
        match result {
            Err(ShellError::Recoverable(msg)) => {
                assert_eq!(msg, format!("no such file or directory: {}", file))
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!Path::new(&file).exists());
    }
}
