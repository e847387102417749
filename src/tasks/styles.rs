mod prefix;

use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;

use crate::config::OutputStyle;
use crate::core::{Environment, TaskContext, as_overhead, relative};
use crate::engine::Task;
use crate::error::StyleError;
use crate::io::{glob_files, write};

/// Compiles the entry stylesheets with `grass`.
pub struct CompileStyles;

impl CompileStyles {
    /// Compile every entry stylesheet, returning the written files.
    ///
    /// In watch mode a stylesheet which fails to compile is logged and
    /// skipped, otherwise the first error aborts the run.
    pub fn run(&self, env: &Environment) -> Result<Vec<Utf8PathBuf>, StyleError> {
        let options = &env.profile.styles;
        let entries = glob_files::<StyleError>(&env.source_dir(), &options.entry)?;

        let load_paths: Vec<Utf8PathBuf> = options
            .include_paths
            .iter()
            .map(|path| env.root.join(path))
            .collect();

        let target = env.output_dir().join(&env.profile.paths.styles);

        let results: Vec<Result<Vec<Utf8PathBuf>, StyleError>> = entries
            .par_iter()
            .map(|entry| {
                let written = compile(env, entry, &load_paths, &target);
                match written {
                    Err(StyleError::Sass(path, e)) if env.is_watching() => {
                        tracing::error!("{path}:\n{e}");
                        Ok(vec![])
                    }
                    other => other,
                }
            })
            .collect();

        let mut written = Vec::new();
        for result in results {
            written.extend(result?);
        }

        Ok(written)
    }
}

fn render(
    entry: &Utf8Path,
    load_paths: &[Utf8PathBuf],
    style: OutputStyle,
    add_prefixes: bool,
) -> Result<String, StyleError> {
    let options = grass::Options::default()
        .style(style.into())
        .load_paths(load_paths);

    let css = grass::from_path(entry, &options) //
        .map_err(|e| StyleError::Sass(entry.to_string(), e))?;

    if add_prefixes {
        return Ok(prefix::prefix(&css));
    }

    Ok(css)
}

fn compile(
    env: &Environment,
    entry: &Utf8Path,
    load_paths: &[Utf8PathBuf],
    target: &Utf8Path,
) -> Result<Vec<Utf8PathBuf>, StyleError> {
    let options = &env.profile.styles;
    let stem = entry.file_stem().unwrap_or("style");

    let path = target.join(format!("{stem}.css"));
    let css = render(entry, load_paths, options.output_style, options.prefix)?;
    write(&path, css)?;

    let mut written = vec![path];

    if options.minify {
        let name = format!("{stem}.min.css");
        let css = render(entry, load_paths, OutputStyle::Compressed, options.prefix)?;
        let css = format!("{css}\n/*# sourceMappingURL={name}.map */\n");

        let map = source_map(&name, &relative(entry, &env.root), &fs::read_to_string(entry)?)?;

        let path = target.join(&name);
        write(&path, css)?;
        written.push(path);

        let path = target.join(format!("{name}.map"));
        write(&path, map)?;
        written.push(path);
    }

    Ok(written)
}

/// A version 3 source map pointing back at the entry file. The compiler
/// does not report positions, so `mappings` stays empty.
fn source_map(file: &str, source: &Utf8Path, content: &str) -> Result<String, StyleError> {
    let map = serde_json::json!({
        "version": 3,
        "file": file,
        "sources": [source],
        "sourcesContent": [content],
        "names": [],
        "mappings": "",
    });

    Ok(serde_json::to_string(&map)?)
}

impl Task for CompileStyles {
    fn name(&self) -> &'static str {
        "compile-styles"
    }

    fn execute(&self, context: &TaskContext) -> anyhow::Result<()> {
        let start = Instant::now();
        let written = self.run(context.env)?;
        tracing::info!("compiled {} stylesheets {}", written.len(), as_overhead(start));
        Ok(())
    }

    fn watched(&self, env: &Environment) -> Vec<String> {
        vec![
            env.profile
                .paths
                .source
                .join(&env.profile.styles.watch)
                .into_string(),
        ]
    }
}
