use std::time::Instant;

use crate::core::{Environment, TaskContext, as_overhead};
use crate::engine::Task;
use crate::error::CleanError;
use crate::io::{create_dir, remove_dir};

/// Deletes the output directory (and the published directory of
/// fingerprinting profiles), then recreates an empty output root.
pub struct Clean;

impl Clean {
    pub fn run(&self, env: &Environment) -> Result<(), CleanError> {
        let output = env.output_dir();
        remove_dir(&output)?;

        if let Some(path) = &env.profile.paths.final_output {
            remove_dir(&env.root.join(path))?;
        }

        create_dir(&output)
    }
}

impl Task for Clean {
    fn name(&self) -> &'static str {
        "clean"
    }

    fn execute(&self, context: &TaskContext) -> anyhow::Result<()> {
        let start = Instant::now();
        self.run(context.env)?;
        tracing::info!("cleaned {} {}", context.env.output_dir(), as_overhead(start));
        Ok(())
    }
}
