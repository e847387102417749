//! Content-hashed file names for long-lived browser caching.
//!
//! The output tree is copied into the published directory. Every file which
//! is not excluded gets a prefix of its BLAKE3 hash embedded into its name,
//! and every reference to a renamed file inside the text files is rewritten.
//!
//! Binary files are hashed first, on their raw content. Text files are
//! hashed in dependency order, each on its content after the references to
//! every file it points at were rewritten, so that a changed image also
//! changes the name of every stylesheet pointing at it and of every page
//! pointing at that stylesheet. Text files referencing each other in a
//! cycle are hashed without the references inside the cycle rewritten.
//!
//! Text files which are not valid UTF-8 are treated as binary files.

use std::collections::BTreeMap;
use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::DiGraph;

use crate::core::{Environment, Hash32, TaskContext, as_overhead, relative};
use crate::engine::Task;
use crate::error::RewriteError;
use crate::io::{list_files, write};

const TEXT: &[&str] = &["html", "css", "js", "json", "svg", "txt", "xml"];

/// Original path to fingerprinted path, both relative to the output root.
pub type RevManifest = BTreeMap<String, String>;

/// Renames output files after their content and rewrites references to them.
pub struct Fingerprint;

fn is_text(path: &Utf8Path) -> bool {
    path.extension().is_some_and(|ext| TEXT.contains(&ext))
}

fn hashed_name(path: &Utf8Path, hash: Hash32, length: usize) -> String {
    let hex = hash.to_hex();
    let hex = &hex[..length.min(hex.len())];

    let name = match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!("{stem}.{hex}.{ext}"),
        _ => format!("{}.{hex}", path.file_name().unwrap_or_default()),
    };

    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => format!("{parent}/{name}"),
        _ => name,
    }
}

impl Fingerprint {
    /// Writes the fingerprinted tree and returns the manifest of renamed
    /// files. Nothing happens for profiles without fingerprinting.
    pub fn run(&self, env: &Environment) -> Result<RevManifest, RewriteError> {
        let options = &env.profile.fingerprint;
        if !options.enabled {
            tracing::info!("fingerprinting is disabled for this profile");
            return Ok(RevManifest::new());
        }

        let Some(final_output) = &env.profile.paths.final_output else {
            tracing::warn!("fingerprinting needs a final output directory");
            return Ok(RevManifest::new());
        };

        let source = env.output_dir();
        let target = env.root.join(final_output);

        let exclude = options
            .exclude
            .iter()
            .map(|glob| Pattern::new(glob))
            .collect::<Result<Vec<_>, _>>()?;

        let files: Vec<Utf8PathBuf> = list_files(&source)
            .map_err(|e| RewriteError::Io(source.to_string(), e))?
            .iter()
            .map(|path| relative(path, &source))
            .collect();

        let is_excluded = |path: &Utf8Path| exclude.iter().any(|p| p.matches(path.as_str()));
        let read = |path: &Utf8Path| {
            let path = source.join(path);
            fs::read(&path).map_err(|e| RewriteError::Io(path.to_string(), e))
        };

        let mut texts = BTreeMap::new();
        for path in files.iter().filter(|p| is_text(p)) {
            match String::from_utf8(read(path)?) {
                Ok(text) => {
                    texts.insert(path.as_path(), text);
                }
                Err(_) => tracing::debug!(%path, "not valid UTF-8, left as is"),
            }
        }

        let mut manifest = RevManifest::new();

        for path in files.iter().filter(|p| !texts.contains_key(p.as_path()) && !is_excluded(p)) {
            let hash = Hash32::hash(read(path)?);
            manifest.insert(path.to_string(), hashed_name(path, hash, options.length));
        }

        // An edge points from a text file to a text file it references.
        let mut graph = DiGraph::<&Utf8Path, ()>::new();
        let nodes: Vec<_> = texts
            .keys()
            .filter(|p| !is_excluded(p))
            .map(|&path| graph.add_node(path))
            .collect();

        for &from in &nodes {
            for &to in &nodes {
                let (path, target) = (graph[from], graph[to]);
                if from != to && references(&texts[path], path, target.as_str()) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        // Components come out with the referenced files first.
        for component in kosaraju_scc(&graph) {
            let names: Vec<_> = component
                .iter()
                .map(|&node| {
                    let path = graph[node];
                    let hash = Hash32::hash(rewrite(&texts[path], path, &manifest));
                    (path.to_string(), hashed_name(path, hash, options.length))
                })
                .collect();
            manifest.extend(names);
        }

        for path in &files {
            let name = manifest.get(path.as_str()).map(String::as_str).unwrap_or(path.as_str());
            let dst = target.join(name);

            let data = match texts.get(path.as_path()) {
                Some(text) => rewrite(text, path, &manifest).into_bytes(),
                None => read(path)?,
            };

            write(&dst, data).map_err(|e| RewriteError::Io(dst.to_string(), e))?;
        }

        if let Some(name) = &options.manifest {
            let path = target.join(name);
            let json = serde_json::to_string_pretty(&manifest)?;
            write(&path, json).map_err(|e| RewriteError::Io(path.to_string(), e))?;
        }

        Ok(manifest)
    }
}

/// `target` as seen from a file living in `dir`.
fn relative_to(dir: &Utf8Path, target: &str) -> String {
    let from: Vec<_> = dir.components().map(|c| c.as_str()).collect();
    let to: Vec<_> = target.split('/').collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts = vec![".."; from.len() - common];
    parts.extend(&to[common..]);
    parts.join("/")
}

fn is_boundary_before(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => matches!(c, '"' | '\'' | '(' | '=' | ',') || c.is_whitespace(),
    }
}

fn is_boundary_after(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => matches!(c, '"' | '\'' | ')' | '?' | '#') || c.is_whitespace(),
    }
}

/// Offsets of the occurrences of `from` which stand on their own as a
/// reference, `/img/a.png` is never matched inside `/x/img/a.png` but is
/// matched in `./img/a.png`.
fn bounded<'a>(text: &'a str, from: &'a str) -> impl Iterator<Item = usize> + 'a {
    text.match_indices(from).filter_map(move |(i, _)| {
        let head = &text[..i];
        let head = head.strip_suffix("./").unwrap_or(head);
        let before = head.chars().next_back();
        let after = text[i + from.len()..].chars().next();

        (is_boundary_before(before) && is_boundary_after(after)).then_some(i)
    })
}

fn replace_bounded(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for i in bounded(text, from) {
        out.push_str(&text[last..i]);
        out.push_str(to);
        last = i + from.len();
    }

    out.push_str(&text[last..]);
    out
}

/// The forms a reference to `target` takes inside a file at `path`.
fn forms(path: &Utf8Path, target: &str) -> Vec<String> {
    let dir = path.parent().unwrap_or(Utf8Path::new(""));
    let mut forms = vec![format!("/{target}"), relative_to(dir, target)];

    if forms[1] != target {
        forms.push(target.to_string());
    }

    forms
}

/// Whether the text file at `path` references `target` in any form.
fn references(text: &str, path: &Utf8Path, target: &str) -> bool {
    forms(path, target)
        .iter()
        .any(|form| bounded(text, form).next().is_some())
}

/// Rewrites references to renamed files in a text file at `path`. Each
/// reference is recognised in root-absolute (`/css/a.css`), root-relative
/// (`css/a.css`) and file-relative (`../css/a.css`) form.
pub(crate) fn rewrite(text: &str, path: &Utf8Path, manifest: &RevManifest) -> String {
    let mut text = text.to_string();

    for (from, to) in manifest {
        if !text.contains(from.rsplit('/').next().unwrap_or(from)) {
            continue;
        }

        for (from, to) in forms(path, from).iter().zip(forms(path, to).iter()) {
            text = replace_bounded(&text, from, to);
        }
    }

    text
}

impl Task for Fingerprint {
    fn name(&self) -> &'static str {
        "fingerprint"
    }

    fn execute(&self, context: &TaskContext) -> anyhow::Result<()> {
        let start = Instant::now();
        let manifest = self.run(context.env)?;
        tracing::info!("fingerprinted {} files {}", manifest.len(), as_overhead(start));
        Ok(())
    }
}
