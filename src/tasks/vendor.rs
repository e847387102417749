use std::collections::BTreeMap;
use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use serde::Deserialize;

use crate::core::{Environment, TaskContext, as_overhead, relative};
use crate::engine::Task;
use crate::error::CopyError;
use crate::io::{copy_if_stale, list_files};

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
}

/// Copies the distributable files of every production dependency into the
/// vendor directory.
pub struct CopyVendor;

impl CopyVendor {
    /// Returns the files copied by this run.
    pub fn run(&self, env: &Environment) -> Result<Vec<Utf8PathBuf>, CopyError> {
        let options = &env.profile.vendor;

        let manifest = env.root.join(&options.manifest);
        let Some(manifest) = read_manifest(&manifest)? else {
            tracing::warn!("no package manifest at {manifest}, nothing to vendor");
            return Ok(vec![]);
        };

        let exclude = options
            .exclude
            .iter()
            .map(|glob| Pattern::new(glob))
            .collect::<Result<Vec<_>, _>>()?;

        let target = env.output_dir().join(&env.profile.paths.vendor);

        let mut copied = Vec::new();
        for name in manifest.dependencies.keys() {
            let package = env.root.join(&options.packages).join(name);
            if !package.is_dir() {
                tracing::warn!(package = name.as_str(), "dependency is not installed");
                continue;
            }

            let files = list_files(&package).map_err(|e| CopyError::Io(package.to_string(), e))?;

            for path in files {
                let rel = relative(&path, &package);
                if exclude.iter().any(|p| p.matches(rel.as_str())) {
                    continue;
                }

                let dst = target.join(name).join(strip(&rel, &options.strip));
                if copy_if_stale(&path, &dst).map_err(|e| CopyError::Io(path.to_string(), e))? {
                    copied.push(dst);
                }
            }
        }

        Ok(copied)
    }
}

fn read_manifest(path: &Utf8Path) -> Result<Option<Manifest>, CopyError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CopyError::Io(path.to_string(), e)),
    };

    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| CopyError::Manifest(path.to_string(), e.into()))
}

/// Drops the directory components listed in `strip`, the file name is kept.
fn strip(path: &Utf8Path, strip: &[String]) -> Utf8PathBuf {
    let mut stripped = Utf8PathBuf::new();

    if let Some(parent) = path.parent() {
        for component in parent.components() {
            if !strip.iter().any(|s| s == component.as_str()) {
                stripped.push(component);
            }
        }
    }

    if let Some(name) = path.file_name() {
        stripped.push(name);
    }

    stripped
}

impl Task for CopyVendor {
    fn name(&self) -> &'static str {
        "copy-vendor"
    }

    fn execute(&self, context: &TaskContext) -> anyhow::Result<()> {
        let start = Instant::now();
        let copied = self.run(context.env)?;
        tracing::info!("vendored {} files {}", copied.len(), as_overhead(start));
        Ok(())
    }
}
