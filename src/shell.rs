use std::io::{BufRead, Write};

use log::debug;

use crate::commands::{self, Capture, Outcome, ParsedCommand};
use crate::config::Config;
use crate::error::{ShellError, ShellResult};
use crate::redirection::{detect_redirection, route_output};
use crate::tokenize::tokenize;

/// What the loop does after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Read-eval-print loop over an input reader and two output streams.
pub struct Shell<R, W, E> {
    config: Config,
    input: R,
    out: W,
    err: E,
}

impl<R: BufRead, W: Write, E: Write> Shell<R, W, E> {
    pub fn new(config: Config, input: R, out: W, err: E) -> Self {
        Self {
            config,
            input,
            out,
            err,
        }
    }

    /// Runs until `exit`. Returns the first fatal error otherwise.
    pub fn run(&mut self) -> ShellResult<()> {
        loop {
            let line = self.read_line()?;
            if self.eval(&line)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    fn read_line(&mut self) -> ShellResult<String> {
        write!(self.out, "{}", self.config.prompt)
            .and_then(|_| self.out.flush())
            .map_err(ShellError::Output)?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => Err(ShellError::EndOfInput),
            Ok(_) => Ok(line),
            Err(e) => Err(ShellError::Input(e)),
        }
    }

    /// Handles one input line.
    pub fn eval(&mut self, line: &str) -> ShellResult<Flow> {
        let tokens = tokenize(line);
        debug!("tokens: {:?}", tokens);

        let (tokens, redirection) = detect_redirection(tokens);
        let Some(command) = ParsedCommand::from_tokens(tokens) else {
            return Ok(Flow::Continue);
        };
        debug!("command: {:?}, redirection: {:?}", command, redirection);

        let capture = match commands::execute(
            &command,
            redirection.operator,
            &self.config,
            &mut self.out,
        ) {
            Ok(Outcome::Captured(capture)) => capture,
            Ok(Outcome::Done) => return Ok(Flow::Continue),
            Ok(Outcome::Exit) => return Ok(Flow::Exit),
            Err(e) if !e.is_fatal() => Capture::from_stdout(e.to_string()),
            Err(e) => return Err(e),
        };

        match route_output(
            &command.name,
            capture,
            &redirection,
            &mut self.out,
            &mut self.err,
        ) {
            Err(e) if !e.is_fatal() => writeln!(self.out, "{}", e).map_err(ShellError::Output)?,
            result => result?,
        }

        self.out.flush().map_err(ShellError::Output)?;
        Ok(Flow::Continue)
    }
}
