mod includes;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use minijinja::{context, path_loader};
use rayon::prelude::*;

use crate::core::{Environment, Hash32, Mode, TaskContext, as_overhead, relative};
use crate::engine::Task;
use crate::error::TemplateError;
use crate::io::{glob_files, write};

use self::includes::IncludeGraph;

/// Renders the template tree with `minijinja`.
///
/// Only the templates affected by a change are rendered again in
/// incremental profiles:
/// 1. templates whose output is missing or older than the source pass,
///    partials always pass;
/// 2. in watch mode templates whose content hash did not change since the
///    last run are dropped;
/// 3. every template which transitively includes a remaining one is added;
/// 4. partials are dropped and the rest is rendered.
#[derive(Default)]
pub struct CompileTemplates {
    /// Content hashes of the templates seen in watch mode.
    cache: Mutex<HashMap<Utf8PathBuf, Hash32>>,
}

impl CompileTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the affected templates, returning the written files.
    pub fn run(&self, env: &Environment) -> Result<Vec<Utf8PathBuf>, TemplateError> {
        let source = env.source_dir();
        let output = env.output_dir();
        let options = &env.profile.templates;

        let templates: Vec<Utf8PathBuf> = glob_files::<TemplateError>(&source, &options.glob)?
            .iter()
            .map(|path| relative(path, &source))
            .collect();

        let is_partial = |path: &Utf8Path| path.starts_with(&options.partials);

        let selected = if options.incremental {
            let changed = self.changed(env, &source, &output, &templates, is_partial)?;
            let graph = IncludeGraph::build(&source, &templates)?;
            let affected = graph.dependents(changed.iter().map(Utf8PathBuf::as_path));

            templates
                .iter()
                .filter(|path| affected.contains(*path))
                .cloned()
                .collect()
        } else {
            templates
        };

        let selected: Vec<Utf8PathBuf> = selected
            .into_iter()
            .filter(|path| !is_partial(path))
            .collect();

        tracing::debug!(count = selected.len(), "rendering templates");

        let mut jinja = minijinja::Environment::new();
        jinja.set_loader(path_loader(&source));
        jinja.set_trim_blocks(true);
        jinja.set_lstrip_blocks(true);

        let mode = match env.mode {
            Mode::Build => "build",
            Mode::Watch => "watch",
        };

        let locals = context! {
            style_switcher => options.locals.style_switcher,
            no_index => options.locals.no_index,
            mode => mode,
            livereload => env.refresh_script(),
        };

        let results: Vec<Result<Option<Utf8PathBuf>, TemplateError>> = selected
            .par_iter()
            .map(|path| {
                let rendered = jinja
                    .get_template(path.as_str())
                    .and_then(|template| template.render(&locals));

                let html = match rendered {
                    Ok(html) => html,
                    Err(e) if env.is_watching() => {
                        tracing::error!("{path}:\n{e:#}");
                        return Ok(None);
                    }
                    Err(e) => return Err(TemplateError::Render(path.to_string(), e)),
                };

                let target = output.join(path.with_extension("html"));
                write(&target, html)?;
                Ok(Some(target))
            })
            .collect();

        let mut written = Vec::new();
        for result in results {
            written.extend(result?);
        }

        Ok(written)
    }

    /// Stages 1 and 2 of the narrowing.
    fn changed(
        &self,
        env: &Environment,
        source: &Utf8Path,
        output: &Utf8Path,
        templates: &[Utf8PathBuf],
        is_partial: impl Fn(&Utf8Path) -> bool,
    ) -> io::Result<Vec<Utf8PathBuf>> {
        let mut changed = Vec::new();

        for path in templates {
            let src = source.join(path);
            if is_partial(path) || is_stale(&src, &output.join(path.with_extension("html")))? {
                changed.push(path.clone());
            }
        }

        if env.mode == Mode::Watch {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            let mut fresh = Vec::new();

            for path in changed {
                let hash = Hash32::hash(fs::read(source.join(&path))?);
                if cache.insert(path.clone(), hash) != Some(hash) {
                    fresh.push(path);
                }
            }

            changed = fresh;
        }

        Ok(changed)
    }
}

/// The output is missing or older than the source.
fn is_stale(src: &Utf8Path, dst: &Utf8Path) -> io::Result<bool> {
    let dst = match fs::metadata(dst) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };

    Ok(fs::metadata(src)?.modified()? > dst.modified()?)
}

impl Task for CompileTemplates {
    fn name(&self) -> &'static str {
        "compile-templates"
    }

    fn execute(&self, context: &TaskContext) -> anyhow::Result<()> {
        let start = Instant::now();
        let written = self.run(context.env)?;
        tracing::info!("rendered {} templates {}", written.len(), as_overhead(start));
        Ok(())
    }

    fn watched(&self, env: &Environment) -> Vec<String> {
        vec![
            env.profile
                .paths
                .source
                .join(&env.profile.templates.glob)
                .into_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tempfile::TempDir;

    use super::*;
    use crate::config::Profile;

    fn names(written: &[Utf8PathBuf], base: &Utf8Path) -> HashSet<String> {
        written
            .iter()
            .map(|path| relative(path, base).into_string())
            .collect()
    }

    fn project(profile: Profile, mode: Mode) -> (TempDir, Environment) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        write(&root.join("src/_includes/head.jinja"), "<title>Site</title>\n").unwrap();
        write(
            &root.join("src/_includes/layout.jinja"),
            "<html>\n{% include '_includes/head.jinja' %}\n{% block body %}{% endblock %}\n</html>\n",
        )
        .unwrap();
        write(
            &root.join("src/index.jinja"),
            "{% extends '_includes/layout.jinja' %}\n{% block body %}<p>home</p>{% endblock %}\n",
        )
        .unwrap();
        write(
            &root.join("src/listings/detail.jinja"),
            "{% if no_index %}<meta name=\"robots\" content=\"noindex\">{% endif %}\n<p>detail</p>\n",
        )
        .unwrap();

        (dir, Environment::new(profile, root, mode))
    }

    #[test]
    fn test_one_output_per_template() {
        let (_dir, env) = project(Profile::distribution(), Mode::Build);

        let written = CompileTemplates::new().run(&env).unwrap();

        let expected: HashSet<String> = ["index.html", "listings/detail.html"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names(&written, &env.output_dir()), expected);
        assert!(!env.output_dir().join("_includes").exists());

        let index = fs::read_to_string(env.output_dir().join("index.html")).unwrap();
        assert!(index.contains("<title>Site</title>"));
        assert!(index.contains("<p>home</p>"));
    }

    #[test]
    fn test_locals() {
        let (_dir, env) = project(Profile::online(), Mode::Build);

        CompileTemplates::new().run(&env).unwrap();

        let detail = fs::read_to_string(env.output_dir().join("listings/detail.html")).unwrap();
        assert!(detail.contains("noindex"));
    }

    #[test]
    fn test_changed_partial_rebuilds_includers_only() {
        let (_dir, env) = project(Profile::development(), Mode::Watch);
        let task = CompileTemplates::new();

        let written = task.run(&env).unwrap();
        assert_eq!(written.len(), 2);

        // nothing changed
        assert!(task.run(&env).unwrap().is_empty());

        write(&env.source_dir().join("_includes/head.jinja"), "<title>New</title>\n").unwrap();

        let written = task.run(&env).unwrap();
        let expected: HashSet<String> = ["index.html"].into_iter().map(String::from).collect();
        assert_eq!(names(&written, &env.output_dir()), expected);

        let index = fs::read_to_string(env.output_dir().join("index.html")).unwrap();
        assert!(index.contains("<title>New</title>"));
    }

    #[test]
    fn test_errors_abort_builds_but_not_watch() {
        let (_dir, env) = project(Profile::distribution(), Mode::Build);
        write(&env.source_dir().join("broken.jinja"), "{% if %}").unwrap();

        assert!(matches!(
            CompileTemplates::new().run(&env),
            Err(TemplateError::Render(..))
        ));

        let env = Environment {
            mode: Mode::Watch,
            ..env
        };
        let written = CompileTemplates::new().run(&env).unwrap();
        assert_eq!(written.len(), 2);
    }
}
