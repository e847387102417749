//! All the generic task graph related abstractions.
//!
//! A [`Task`] is a named unit of work. Tasks are registered once in a
//! [`Blueprint`] and can be composed into named recipes built from
//! [`Step::Series`] (run one after another) and [`Step::Parallel`] (run
//! concurrently). Invoking a name compiles its recipe into a Directed Acyclic
//! Graph, where each edge points from a task to a task that must wait for
//! it, and runs that graph on the rayon pool.
//!
//! The same task can be invoked standalone or as part of any number of
//! composites, ordering only exists inside the recipe being run.

mod runner;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use camino::Utf8Path;
use glob::Pattern;
use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::core::{Environment, TaskContext};
use crate::error::ChizuError;

pub use runner::{Diagnostics, TaskExecution};

/// A unit of work registered in a [`Blueprint`].
pub trait Task: Send + Sync {
    /// Unique name the task is invoked by.
    fn name(&self) -> &'static str;

    /// Run the task once.
    fn execute(&self, context: &TaskContext) -> anyhow::Result<()>;

    /// Globs relative to the project root which should re-run this task in
    /// watch mode.
    fn watched(&self, _: &Environment) -> Vec<String> {
        vec![]
    }

    /// Whether a change to `path` (relative to the project root) makes this
    /// task outdated.
    fn is_dirty(&self, env: &Environment, path: &Utf8Path) -> bool {
        self.watched(env)
            .iter()
            .filter_map(|glob| Pattern::new(glob).ok())
            .any(|pattern| pattern.matches(path.as_str()))
    }
}

/// A recipe for a composite task.
#[derive(Debug, Clone)]
pub enum Step {
    /// A registered task or another composite, by name.
    Run(&'static str),
    /// Steps which run strictly one after another.
    Series(Vec<Step>),
    /// Steps which may run concurrently.
    Parallel(Vec<Step>),
}

pub fn series(steps: impl IntoIterator<Item = Step>) -> Step {
    Step::Series(steps.into_iter().collect())
}

pub fn parallel(steps: impl IntoIterator<Item = Step>) -> Step {
    Step::Parallel(steps.into_iter().collect())
}

pub fn run(name: &'static str) -> Step {
    Step::Run(name)
}

/// The blueprint of a pipeline.
///
/// # Example
///
/// ```rust,no_run
/// use chizu::engine::{Blueprint, parallel, run, series};
/// # use chizu::engine::Task;
/// # struct Noop(&'static str);
/// # impl Task for Noop {
/// #     fn name(&self) -> &'static str { self.0 }
/// #     fn execute(&self, _: &chizu::TaskContext) -> anyhow::Result<()> { Ok(()) }
/// # }
///
/// let mut config = Blueprint::new();
/// config.add_task(Noop("clean"));
/// config.add_task(Noop("styles"));
/// config.add_task(Noop("scripts"));
/// config.compose("build", series([run("clean"), parallel([run("styles"), run("scripts")])]));
/// let website = config.finish();
/// ```
#[derive(Default)]
pub struct Blueprint {
    tasks: HashMap<&'static str, Arc<dyn Task>>,
    composites: HashMap<&'static str, Step>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task<T>(&mut self, task: T) -> &mut Self
    where
        T: Task + 'static,
    {
        let name = task.name();
        if self.tasks.insert(name, Arc::new(task)).is_some() {
            tracing::warn!(task = name, "task registered twice, the last one wins");
        }
        self
    }

    /// Register a composite task under `name`.
    pub fn compose(&mut self, name: &'static str, recipe: Step) -> &mut Self {
        self.composites.insert(name, recipe);
        self
    }

    /// Register an alternative name for a task or composite.
    pub fn alias(&mut self, alias: &'static str, name: &'static str) -> &mut Self {
        self.aliases.insert(alias, name);
        self
    }

    pub fn finish(self) -> Website {
        Website {
            tasks: self.tasks,
            composites: self.composites,
            aliases: self.aliases,
        }
    }
}

pub(crate) type Plan = Graph<Arc<dyn Task>, ()>;

/// A finished pipeline which can be invoked by task name.
pub struct Website {
    tasks: HashMap<&'static str, Arc<dyn Task>>,
    composites: HashMap<&'static str, Step>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Website {
    /// All names and aliases tasks can be invoked by, sorted.
    pub fn task_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .tasks
            .keys()
            .chain(self.composites.keys())
            .chain(self.aliases.keys())
            .copied()
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).copied().unwrap_or(name)
    }

    /// Compile the recipe behind `name` into a graph of task executions.
    pub(crate) fn plan(&self, name: &str) -> Result<Plan, ChizuError> {
        let mut graph = Graph::new();
        let mut visiting = HashSet::new();
        self.plan_step(name, &[], &mut graph, &mut visiting)?;
        Ok(graph)
    }

    fn plan_step(
        &self,
        name: &str,
        after: &[NodeIndex],
        graph: &mut Plan,
        visiting: &mut HashSet<String>,
    ) -> Result<Vec<NodeIndex>, ChizuError> {
        let name = self.canonical(name);

        if let Some(task) = self.tasks.get(name) {
            let index = graph.add_node(task.clone());
            for &dependency in after {
                graph.add_edge(dependency, index, ());
            }
            return Ok(vec![index]);
        }

        let Some(recipe) = self.composites.get(name) else {
            return Err(ChizuError::UnknownTask(name.to_string()));
        };

        if !visiting.insert(name.to_string()) {
            return Err(ChizuError::Cycle(name.to_string()));
        }
        let exits = self.plan_recipe(recipe, after, graph, visiting)?;
        visiting.remove(name);

        Ok(exits)
    }

    fn plan_recipe(
        &self,
        step: &Step,
        after: &[NodeIndex],
        graph: &mut Plan,
        visiting: &mut HashSet<String>,
    ) -> Result<Vec<NodeIndex>, ChizuError> {
        match step {
            Step::Run(name) => self.plan_step(name, after, graph, visiting),
            Step::Series(steps) => {
                let mut exits = after.to_vec();
                for step in steps {
                    exits = self.plan_recipe(step, &exits, graph, visiting)?;
                }
                Ok(exits)
            }
            Step::Parallel(steps) => {
                let mut exits = Vec::new();
                for step in steps {
                    exits.extend(self.plan_recipe(step, after, graph, visiting)?);
                }
                Ok(exits)
            }
        }
    }

    /// Run the task or composite called `name`.
    pub fn run(&self, name: &str, env: &Environment) -> Result<Diagnostics, ChizuError> {
        let plan = self.plan(name)?;
        runner::run_tasks_parallel(&plan, env)
    }

    /// Every registered task whose watched globs match `path`.
    pub(crate) fn dirty_tasks(&self, env: &Environment, path: &Utf8Path) -> Vec<Arc<dyn Task>> {
        self.tasks
            .values()
            .filter(|task| task.is_dirty(env, path))
            .cloned()
            .collect()
    }

    /// Every glob watched by any registered task.
    pub(crate) fn watched(&self, env: &Environment) -> Vec<String> {
        self.tasks
            .values()
            .flat_map(|task| task.watched(env))
            .collect()
    }

    /// Run `name` in watch mode, then re-run tasks as their sources change.
    #[cfg(feature = "live")]
    pub fn watch(&self, name: &str, env: Environment) -> Result<(), ChizuError> {
        runner::watch(self, name, env)
    }

    /// Serve the published directory until the process is stopped.
    #[cfg(feature = "server")]
    pub fn serve(&self, env: &Environment) -> Result<(), ChizuError> {
        runner::serve(env)
    }
}
