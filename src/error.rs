#[cfg(feature = "live")]
use std::sync::mpsc::RecvError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChizuError {
    #[error("Unknown task '{0}'")]
    UnknownTask(String),

    #[error("Task '{0}':\n{1}")]
    Task(String, anyhow::Error),

    #[error("Cycle detected in task graph at '{0}'")]
    Cycle(String),

    #[error("Couldn't read profile from '{0}'.\n{1}")]
    Profile(String, anyhow::Error),

    #[cfg(feature = "live")]
    #[error("Error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised while deleting the output directories.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("Couldn't remove '{0}'.\n{1}")]
    Remove(String, std::io::Error),

    #[error("Couldn't create '{0}'.\n{1}")]
    Create(String, std::io::Error),
}

/// Errors that can occur when compiling stylesheets.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sass compilation error in '{0}': {1}")]
    Sass(String, Box<grass::Error>),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Couldn't serialize source map.\n{0}")]
    SourceMap(#[from] serde_json::Error),
}

/// Errors that can occur when compiling templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template '{0}':\n{1:#}")]
    Render(String, minijinja::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

/// Errors raised while copying static assets or vendor files.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("Couldn't copy '{0}'.\n{1}")]
    Io(String, std::io::Error),

    #[error("Couldn't read package manifest '{0}'.\n{1}")]
    Manifest(String, anyhow::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

/// Errors raised while fingerprinting or externalizing output files.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("IO error on '{0}': {1}")]
    Io(String, std::io::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Couldn't write manifest.\n{0}")]
    Manifest(#[from] serde_json::Error),
}

#[cfg(feature = "live")]
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Couldn't bind the live-reload socket.\n{0}")]
    Bind(std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Recv(#[from] RecvError),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error("Couldn't resolve watched path '{0}'")]
    Resolve(String),
}

/// Errors produced when fetching the GeoJSON document for a map.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed GeoJSON: {0}")]
    Parse(String),
}
