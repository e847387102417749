mod diagnostics;
#[cfg(feature = "server")]
mod http;
#[cfg(feature = "live")]
mod watch;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use petgraph::graph::NodeIndex;
use tracing::{Level, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::core::{Environment, TaskContext};
use crate::engine::Plan;
use crate::error::ChizuError;

pub use diagnostics::{Diagnostics, TaskExecution};
#[cfg(feature = "live")]
pub(crate) use watch::watch;

/// Bookkeeping shared by every task of a run.
struct Schedule<'a> {
    graph: &'a Plan,
    env: &'a Environment,
    dependents: HashMap<NodeIndex, Vec<NodeIndex>>,
    root: Span,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// Dependencies each node is still waiting for.
    pending: HashMap<NodeIndex, usize>,
    diagnostics: Diagnostics,
    failure: Option<ChizuError>,
}

/// Runs every task of the plan on the rayon pool.
///
/// The algorithm works as follows:
/// 1. Every node gets a counter of its pending dependencies.
/// 2. Nodes with no pending dependencies are spawned on the pool.
/// 3. A finished task decrements the counters of its dependents and spawns
///    those that reach zero, so no thread ever blocks waiting for results.
/// 4. The first failure stops scheduling, tasks already running are allowed
///    to finish.
pub(crate) fn run_tasks_parallel(graph: &Plan, env: &Environment) -> Result<Diagnostics, ChizuError> {
    let total_tasks = graph.node_count();
    if total_tasks == 0 {
        return Ok(Diagnostics::default());
    }

    let mut dependents: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
    for edge in graph.raw_edges() {
        dependents
            .entry(edge.source())
            .or_default()
            .push(edge.target());
    }

    let pending: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|i| {
            (
                i,
                graph
                    .neighbors_directed(i, petgraph::Direction::Incoming)
                    .count(),
            )
        })
        .collect();

    let root_span = tracing::span!(Level::INFO, "running_tasks");
    root_span.pb_set_length(total_tasks as u64);
    root_span.pb_set_style(&crate::utils::style_root());
    root_span.pb_set_message("Running tasks...");

    let start = Instant::now();
    let schedule = Schedule {
        graph,
        env,
        dependents,
        root: root_span,
        state: Mutex::new(State {
            pending,
            ..State::default()
        }),
    };

    rayon::scope(|s| {
        for index in graph.node_indices() {
            if graph
                .neighbors_directed(index, petgraph::Direction::Incoming)
                .next()
                .is_none()
            {
                spawn_task(s, &schedule, index);
            }
        }
    });

    let state = schedule
        .state
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(failure) = state.failure {
        return Err(failure);
    }

    tracing::info!("finished {} tasks {}", total_tasks, crate::core::as_overhead(start));
    Ok(state.diagnostics)
}

fn spawn_task<'s>(scope: &rayon::Scope<'s>, schedule: &'s Schedule<'s>, index: NodeIndex) {
    scope.spawn(move |s| {
        let task = &schedule.graph[index];

        let span = tracing::span!(parent: &schedule.root, Level::INFO, "task", name = task.name());
        span.pb_set_style(&crate::utils::style_task());
        span.pb_set_message(&format!("Running {}", task.name()));
        let _enter = span.enter();

        let context = TaskContext {
            env: schedule.env,
            span: span.clone(),
        };

        let start_time = Instant::now();

        let output = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            task.execute(&context)
        })) {
            Ok(result) => result,
            Err(panic) => {
                let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    format!("Task panicked: {s}")
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    format!("Task panicked: {s}")
                } else {
                    String::from("Task panicked with unknown payload")
                };

                Err(anyhow::anyhow!(msg))
            }
        };

        let duration = start_time.elapsed();

        let ready = {
            let mut state = schedule
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match output {
                Err(e) => {
                    if state.failure.is_none() {
                        state.failure = Some(ChizuError::Task(task.name().to_string(), e));
                    }
                    return;
                }
                Ok(()) => {
                    state.diagnostics.execution_times.insert(
                        task.name(),
                        TaskExecution {
                            start: start_time,
                            duration,
                        },
                    );
                }
            }

            schedule.root.pb_inc(1);

            if state.failure.is_some() {
                return;
            }

            let mut ready = Vec::new();
            for &dependent in schedule.dependents.get(&index).into_iter().flatten() {
                if let Some(count) = state.pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(dependent);
                    }
                }
            }
            ready
        };

        for dependent in ready {
            spawn_task(s, schedule, dependent);
        }
    });
}

#[cfg(feature = "server")]
pub(crate) fn serve(env: &Environment) -> Result<(), ChizuError> {
    let handle = http::start(env.publish_dir(), env.profile.server.port);

    handle
        .join()
        .map_err(|_| ChizuError::Other(anyhow::anyhow!("HTTP server thread panicked")))??;

    Ok(())
}
