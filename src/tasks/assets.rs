use std::time::Instant;

use camino::Utf8PathBuf;

use crate::core::{Environment, TaskContext, as_overhead, relative};
use crate::engine::Task;
use crate::error::CopyError;
use crate::io::{copy_if_stale, glob_files};

/// Copies the allow-listed static files from the source to the output root.
pub struct CopyAssets;

impl CopyAssets {
    /// Copy every allow-listed file whose destination is outdated, returning
    /// the copied destinations.
    pub fn run(&self, env: &Environment) -> Result<Vec<Utf8PathBuf>, CopyError> {
        let source = env.source_dir();
        let output = env.output_dir();

        let mut copied = Vec::new();
        for entry in &env.profile.assets.copy {
            for path in glob_files::<CopyError>(&source, entry)? {
                let target = output.join(relative(&path, &source));
                if copy_if_stale(&path, &target).map_err(|e| CopyError::Io(path.to_string(), e))? {
                    copied.push(target);
                }
            }
        }

        Ok(copied)
    }
}

impl Task for CopyAssets {
    fn name(&self) -> &'static str {
        "copy-assets"
    }

    fn execute(&self, context: &TaskContext) -> anyhow::Result<()> {
        let start = Instant::now();
        let copied = self.run(context.env)?;
        tracing::info!("copied {} assets {}", copied.len(), as_overhead(start));
        Ok(())
    }

    fn watched(&self, env: &Environment) -> Vec<String> {
        env.profile
            .assets
            .watch
            .iter()
            .map(|glob| env.profile.paths.source.join(glob).into_string())
            .collect()
    }
}
