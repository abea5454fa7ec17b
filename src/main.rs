mod commands;
mod config;
mod error;
mod redirection;
mod shell;
mod tokenize;

use std::io;

use env_logger::Env;

use crate::config::Config;
use crate::shell::Shell;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("off")).init();

    let stdin = io::stdin();
    let mut shell = Shell::new(Config::from_env(), stdin.lock(), io::stdout(), io::stderr());
    shell.run()?;
    Ok(())
}
