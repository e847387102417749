use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub start: Instant,
    pub duration: Duration,
}

/// Timings of a single run, keyed by task name.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub execution_times: HashMap<&'static str, TaskExecution>,
}

impl Diagnostics {
    /// Names of the tasks that ran, in the order they started.
    pub fn executed(&self) -> Vec<&'static str> {
        let mut items: Vec<_> = self.execution_times.iter().collect();
        items.sort_by_key(|(name, exec)| (exec.start, **name));
        items.into_iter().map(|(name, _)| *name).collect()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let width = self
            .execution_times
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0);

        for name in self.executed() {
            let exec = &self.execution_times[name];
            writeln!(f, "{name:<width$}  {:>10.2?}", exec.duration)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executed_order_and_table() {
        let now = Instant::now();
        let mut diagnostics = Diagnostics::default();

        diagnostics.execution_times.insert(
            "compile-styles",
            TaskExecution {
                start: now + Duration::from_millis(5),
                duration: Duration::from_millis(12),
            },
        );
        diagnostics.execution_times.insert(
            "clean",
            TaskExecution {
                start: now,
                duration: Duration::from_millis(1),
            },
        );

        assert_eq!(diagnostics.executed(), vec!["clean", "compile-styles"]);

        let table = diagnostics.to_string();
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("clean "));
        assert!(lines[1].starts_with("compile-styles"));
    }
}
