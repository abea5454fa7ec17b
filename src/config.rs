use std::env;
use std::path::PathBuf;

pub const PROMPT: &str = "$ ";

/// Startup snapshot of the environment the shell depends on.
#[derive(Debug, Clone)]
pub struct Config {
    pub prompt: String,
    pub path_dirs: Vec<PathBuf>,
    pub home: Option<String>,
}

impl Config {
    pub fn new(path_dirs: Vec<PathBuf>, home: Option<String>) -> Self {
        Self {
            prompt: PROMPT.to_string(),
            path_dirs,
            home,
        }
    }

    /// Reads `PATH` and `HOME` from the process environment.
    pub fn from_env() -> Self {
        let path_dirs = env::var("PATH")
            .map(|path| split_path(&path))
            .unwrap_or_default();
        Self::new(path_dirs, env::var("HOME").ok())
    }
}

fn split_path(path: &str) -> Vec<PathBuf> {
    path.split(':')
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .collect()
}
