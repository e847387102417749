use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use console::Style;

use crate::config::Profile;

const ANSI_BLUE: Style = Style::new().blue();

/// A 32-byte BLAKE3 hash used for change detection and fingerprinting.
///
/// In `chizu`, this serves two purposes:
/// 1. The template task keeps one per source file in watch mode, so that
///    unchanged partials are not reprocessed on repeated runs.
/// 2. The fingerprint task embeds a prefix of it into output file names,
///    ensuring effective browser caching.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    pub(crate) fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    pub(crate) fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = String::with_capacity(64);

        for &byte in &self.0 {
            acc.push(HEX[(byte >> 4) as usize] as char);
            acc.push(HEX[(byte & 0xF) as usize] as char);
        }

        acc
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

/// The mode in which the pipeline is running.
///
/// The mode is passed explicitly to every task, it decides whether compiler
/// errors abort the build and whether the watch-mode change cache is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A one-time build, compiler errors abort the task.
    Build,
    /// A continuous watch mode for development, compiler errors are logged.
    Watch,
}

/// Everything a task needs to know about the current invocation.
#[derive(Debug, Clone)]
pub struct Environment {
    /// The active build profile.
    pub profile: Arc<Profile>,
    /// Project root, every profile path is relative to it.
    pub root: Utf8PathBuf,
    /// The current build mode (Build or Watch).
    pub mode: Mode,
    /// The port of the live-reload websocket (if running).
    pub port: Option<u16>,
}

impl Environment {
    pub fn new(profile: Profile, root: impl Into<Utf8PathBuf>, mode: Mode) -> Self {
        Self {
            profile: Arc::new(profile),
            root: root.into(),
            mode,
            port: None,
        }
    }

    /// Directory holding the template, style and asset sources.
    pub fn source_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.profile.paths.source)
    }

    /// Directory the compile and copy tasks write into.
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.profile.paths.output)
    }

    /// Directory that ends up deployed. For fingerprinting profiles this is
    /// the final directory, otherwise it is the output directory itself.
    pub fn publish_dir(&self) -> Utf8PathBuf {
        match &self.profile.paths.final_output {
            Some(path) if self.profile.fingerprint.enabled => self.root.join(path),
            _ => self.output_dir(),
        }
    }

    pub fn is_watching(&self) -> bool {
        self.mode == Mode::Watch
    }

    /// Returns a JavaScript snippet that reloads the page when the
    /// live-reload socket broadcasts a message.
    pub fn refresh_script(&self) -> Option<String> {
        self.port.map(|port| {
            format!(
                r#"
const socket = new WebSocket("ws://localhost:{port}");
socket.addEventListener("message", event => {{
    window.location.reload();
}});
"#
            )
        })
    }
}

/// The context passed to every task execution.
pub struct TaskContext<'a> {
    pub env: &'a Environment,
    /// Tracing span assigned to this task.
    pub span: tracing::Span,
}

pub(crate) fn as_overhead(s: Instant) -> impl Display {
    let f = format!("(+{}ms)", s.elapsed().as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Returns `path` relative to `base`, with forward slashes.
pub(crate) fn relative(path: &Utf8Path, base: &Utf8Path) -> Utf8PathBuf {
    let path = path.strip_prefix(base).unwrap_or(path);
    Utf8PathBuf::from(path.as_str().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let a = Hash32::hash(b"body { color: red }");
        let b = Hash32::hash(b"body { color: red }");
        let c = Hash32::hash(b"body { color: blue }");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn test_publish_dir() {
        let env = Environment::new(Profile::online(), "/site", Mode::Build);
        assert_eq!(env.output_dir(), "/site/tmp");
        assert_eq!(env.publish_dir(), "/site/online");

        let env = Environment::new(Profile::development(), "/site", Mode::Build);
        assert_eq!(env.publish_dir(), "/site/dist");
    }

    #[test]
    fn test_refresh_script() {
        let mut env = Environment::new(Profile::development(), ".", Mode::Watch);
        assert!(env.refresh_script().is_none());

        env.port = Some(1337);
        let script = env.refresh_script().unwrap();
        assert!(script.contains("ws://localhost:1337"));
    }
}
