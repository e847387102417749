//! Watch mode is implemented as a three-part system:
//!
//! 1. **File watcher**: Uses the `notify` crate to monitor filesystem events
//!    recursively. Debouncing prevents duplicate runs from rapid file saves.
//! 2. **WebSocket server**: A dedicated thread using `tungstenite` keeps
//!    persistent connections with open browser tabs.
//! 3. **Client script**: Templates receive the snippet from
//!    [`Environment::refresh_script`] as the `livereload` local. It connects
//!    to the socket and reloads the page on every message.
//!
//! When a debounced batch of events arrives, every task whose watched globs
//! match one of the paths is re-run once. Tasks already running are not
//! cancelled, the next batch waits for the current one to finish.

use std::collections::{HashMap, HashSet};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::RecursiveMode;
use notify_debouncer_full::new_debouncer;
use tungstenite::WebSocket;

use super::run_tasks_parallel;
use crate::core::{Environment, Mode};
use crate::engine::{Plan, Website};
use crate::error::{ChizuError, WatchError};

pub(crate) fn watch(site: &Website, target: &str, mut env: Environment) -> Result<(), ChizuError> {
    let (tcp, port) = reserve_port()?;

    env.mode = Mode::Watch;
    env.port = Some(port);

    tracing::info!("running initial build...");
    site.run(target, &env)?;

    tracing::info!("initial build completed, now watching for changes...");
    let clients = Arc::new(Mutex::new(vec![]));

    let _thread_i = new_thread_ws_incoming(tcp, clients.clone());
    let (tx_reload, _thread_o) = new_thread_ws_reload(clients.clone());

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer =
        new_debouncer(Duration::from_millis(250), None, tx).map_err(WatchError::Notify)?;

    let mut watched = HashSet::new();
    for glob in site.watched(&env) {
        match resolve_watch_path(&env.root, &glob) {
            Ok((path, _)) => {
                watched.insert(path);
            }
            Err(e) => tracing::warn!("not watching {glob}: {e}"),
        }
    }

    for path in collapse_watch_paths(watched) {
        tracing::info!("watching {}", path);
        debouncer
            .watch(path.as_std_path(), RecursiveMode::Recursive)
            .map_err(WatchError::Notify)?;
    }

    #[cfg(feature = "server")]
    let _thread_http = env
        .profile
        .server
        .enabled
        .then(|| super::http::start(env.publish_dir(), env.profile.server.port));

    let root = env
        .root
        .canonicalize_utf8()
        .map_err(WatchError::Io)?;

    loop {
        let events = match rx.recv().map_err(WatchError::Recv)? {
            Ok(events) => events,
            Err(errors) => {
                for e in errors {
                    tracing::error!("watch error: {:?}", e);
                }
                continue;
            }
        };

        let mut dirty = HashMap::new();
        for de in &events {
            for path in &de.event.paths {
                let Some(path) = Utf8Path::from_path(path) else {
                    continue;
                };
                let Ok(path) = path.strip_prefix(&root) else {
                    continue;
                };

                for task in site.dirty_tasks(&env, path) {
                    dirty.insert(task.name(), task);
                }
            }
        }

        if dirty.is_empty() {
            continue;
        }

        // Each dirty task runs once, independently of the others.
        let mut plan = Plan::new();
        for task in dirty.into_values() {
            plan.add_node(task);
        }

        tracing::info!("change detected, re-running {} tasks...", plan.node_count());
        match run_tasks_parallel(&plan, &env) {
            Ok(_) => {
                if tx_reload.send(()).is_err() {
                    tracing::warn!("live-reload thread is gone");
                }
                tracing::info!("rebuild complete, watching for changes...");
            }
            Err(e) => tracing::error!("{e}"),
        }
    }
}

fn reserve_port() -> Result<(TcpListener, u16), WatchError> {
    let listener = match TcpListener::bind("127.0.0.1:1337") {
        Ok(sock) => sock,
        Err(_) => TcpListener::bind("127.0.0.1:0").map_err(WatchError::Bind)?,
    };

    let addr = listener.local_addr().map_err(WatchError::Bind)?;
    Ok((listener, addr.port()))
}

fn new_thread_ws_incoming(
    server: TcpListener,
    client: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for stream in server.incoming() {
            let Ok(stream) = stream else { continue };
            match tungstenite::accept(stream) {
                Ok(socket) => match client.lock() {
                    Ok(mut clients) => clients.push(socket),
                    Err(_) => return,
                },
                Err(e) => tracing::debug!("rejected live-reload client: {e}"),
            }
        }
    })
}

fn new_thread_ws_reload(
    client: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
) -> (Sender<()>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();

    let thread = std::thread::spawn(move || {
        while rx.recv().is_ok() {
            let Ok(mut clients) = client.lock() else {
                return;
            };
            let mut broken = vec![];

            for (i, socket) in clients.iter_mut().enumerate() {
                match socket.send("reload".into()) {
                    Ok(_) => {}
                    Err(tungstenite::error::Error::Io(e)) => {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            broken.push(i);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error: {e:?}");
                    }
                }
            }

            for i in broken.into_iter().rev() {
                clients.remove(i);
            }

            // Close all but the last 10 connections
            let len = clients.len();
            if len > 10 {
                for mut socket in clients.drain(0..len - 10) {
                    socket.close(None).ok();
                }
            }
        }
    });

    (tx, thread)
}

/// Splits a root-relative glob into a canonicalized static directory (for
/// watching) and a compiled absolute pattern (for matching).
pub fn resolve_watch_path(
    root: &Utf8Path,
    glob_str: &str,
) -> Result<(Utf8PathBuf, Pattern), WatchError> {
    let path = Utf8Path::new(glob_str);

    // Split path into static root and dynamic suffix (containing wildcards)
    let components: Vec<_> = path.components().collect();
    let split_idx = components
        .iter()
        .position(|c| c.as_str().contains(['*', '?', '[']))
        .unwrap_or(components.len());

    let root_part: Utf8PathBuf = components.iter().take(split_idx).collect();
    let suffix_part: Utf8PathBuf = components.iter().skip(split_idx).collect();

    let absolute_root = root
        .join(&root_part)
        .canonicalize_utf8()
        .map_err(|_| WatchError::Resolve(glob_str.to_string()))?;

    // A concrete file is watched through its parent so that atomic writes
    // are caught.
    let (watch_root, pattern) = if suffix_part.as_str().is_empty() && absolute_root.is_file() {
        let parent = absolute_root
            .parent()
            .unwrap_or(&absolute_root)
            .to_path_buf();
        (parent, absolute_root)
    } else {
        let pattern = absolute_root.join(&suffix_part);
        (absolute_root, pattern)
    };

    let pattern = Pattern::new(pattern.as_str())?;

    Ok((watch_root, pattern))
}

/// Reduces a set of paths to the minimal set of watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a` because the
/// watcher is recursive.
fn collapse_watch_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();

    let mut filtered = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn project() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().canonicalize().unwrap()).unwrap();
        fs::create_dir_all(root.join("src/scss")).unwrap();
        fs::write(root.join("src/favicon.png"), b"png").unwrap();
        (dir, root)
    }

    #[test]
    fn test_concrete_file() {
        let (_dir, root) = project();
        let (watch, pattern) = resolve_watch_path(&root, "src/favicon.png").unwrap();

        assert_eq!(watch, root.join("src"));
        assert_eq!(pattern.as_str(), root.join("src/favicon.png"));
    }

    #[test]
    fn test_concrete_directory() {
        let (_dir, root) = project();
        let (watch, pattern) = resolve_watch_path(&root, "src/scss").unwrap();

        assert_eq!(watch, root.join("src/scss"));
        assert_eq!(pattern.as_str(), root.join("src/scss"));
    }

    #[test]
    fn test_directory_wildcard() {
        let (_dir, root) = project();
        let (watch, pattern) = resolve_watch_path(&root, "src/scss/**/*.scss").unwrap();

        assert_eq!(watch, root.join("src/scss"));
        assert_eq!(pattern.as_str(), root.join("src/scss/**/*.scss"));
        assert!(pattern.matches(root.join("src/scss/modules/_map.scss").as_str()));
    }

    #[test]
    fn test_missing_directory() {
        let (_dir, root) = project();
        assert!(resolve_watch_path(&root, "src/fonts/**").is_err());
    }

    #[test]
    fn test_collapse_watch_paths() {
        let mut paths = HashSet::new();
        paths.insert(Utf8PathBuf::from("/a"));
        paths.insert(Utf8PathBuf::from("/a/b"));
        paths.insert(Utf8PathBuf::from("/a/b/c"));
        paths.insert(Utf8PathBuf::from("/b"));
        paths.insert(Utf8PathBuf::from("/c/d"));

        let collapsed = collapse_watch_paths(paths);

        assert_eq!(
            collapsed,
            vec![
                Utf8PathBuf::from("/a"),
                Utf8PathBuf::from("/b"),
                Utf8PathBuf::from("/c/d")
            ]
        );
    }

    #[test]
    fn test_collapse_watch_paths_similar_names() {
        let mut paths = HashSet::new();
        paths.insert(Utf8PathBuf::from("/foo"));
        paths.insert(Utf8PathBuf::from("/foo-bar"));

        let collapsed = collapse_watch_paths(paths);

        // /foo-bar is not a subdirectory of /foo
        assert_eq!(
            collapsed,
            vec![Utf8PathBuf::from("/foo"), Utf8PathBuf::from("/foo-bar")]
        );
    }
}
