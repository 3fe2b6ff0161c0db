//! Job and resource naming
//!
//! Every rendered job needs a name that is unique within the graph, and
//! the `passed`/`needs` constraint of a job refers to the names chosen for
//! its predecessors. [`JobIndex`] fixes all job names up front, in execution
//! order, so the dependency wiring can be computed for any leaf without
//! threading a half-built graph through the render pass.

use halfpipe_core::{LeafTask, TaskList, TaskPath};
use std::collections::{HashMap, HashSet};

/// First name of the form `candidate`, `candidate-1`, `candidate-2`, ...
/// that is not in `used`
#[must_use]
pub fn unique_name(candidate: &str, used: &HashSet<String>) -> String {
    if !used.contains(candidate) {
        return candidate.to_string();
    }
    (1..)
        .map(|i| format!("{candidate}-{i}"))
        .find(|name| !used.contains(name))
        .unwrap_or_else(|| candidate.to_string())
}

/// Names handed out so far within one namespace
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve and return a unique name derived from `candidate`
    pub fn claim(&mut self, candidate: &str) -> String {
        let name = unique_name(candidate, &self.used);
        self.used.insert(name.clone());
        name
    }

    /// Whether `name` was handed out
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Number of names handed out
    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Whether no name was handed out yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// One rendered job per leaf task, named uniquely in execution order
#[derive(Debug, Clone, Default)]
pub struct JobIndex {
    order: Vec<TaskPath>,
    names: HashMap<TaskPath, String>,
}

impl JobIndex {
    /// Name every leaf by its display name
    #[must_use]
    pub fn new(tasks: &TaskList) -> Self {
        Self::with_namer(tasks, LeafTask::name)
    }

    /// Name every leaf with `namer`, deduplicating the results
    #[must_use]
    pub fn with_namer<F>(tasks: &TaskList, namer: F) -> Self
    where
        F: Fn(&LeafTask) -> String,
    {
        let mut registry = NameRegistry::new();
        let mut index = Self::default();
        for (path, leaf) in tasks.leaves() {
            let name = registry.claim(&namer(leaf));
            index.names.insert(path.clone(), name);
            index.order.push(path);
        }
        index
    }

    /// Job name of the leaf at `path`
    #[must_use]
    pub fn name(&self, path: &[usize]) -> Option<&str> {
        self.names.get(path).map(String::as_str)
    }

    /// Names of the jobs that must pass before the leaf at `path` runs
    #[must_use]
    pub fn passed(&self, tasks: &TaskList, path: &[usize]) -> Vec<String> {
        tasks.passed_names_by(path, |p, leaf| {
            self.name(p).map_or_else(|| leaf.name(), str::to_string)
        })
    }

    /// Leaf positions paired with their job names, in execution order
    pub fn iter(&self) -> impl Iterator<Item = (&[usize], &str)> {
        self.order
            .iter()
            .filter_map(|path| self.name(path).map(|name| (path.as_slice(), name)))
    }

    /// Number of jobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether there are no jobs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halfpipe_core::Task;
    use halfpipe_core::manifest::{Parallel, Run, Sequence, TaskCommon};

    fn run(script: &str) -> Task {
        Run {
            script: script.to_string(),
            ..Run::default()
        }
        .into()
    }

    fn named(name: &str) -> Task {
        Run {
            common: TaskCommon {
                name: name.to_string(),
                ..TaskCommon::default()
            },
            script: "build.sh".to_string(),
            ..Run::default()
        }
        .into()
    }

    #[test]
    fn test_unique_name_skips_taken_suffixes() {
        let used: HashSet<String> = ["build", "build-1"].iter().map(ToString::to_string).collect();
        assert_eq!(unique_name("build", &used), "build-2");
        assert_eq!(unique_name("test", &used), "test");
    }

    #[test]
    fn test_registry_claims() {
        let mut registry = NameRegistry::new();
        assert_eq!(registry.claim("deploy"), "deploy");
        assert_eq!(registry.claim("deploy"), "deploy-1");
        assert_eq!(registry.claim("deploy"), "deploy-2");
        assert!(registry.contains("deploy-1"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_duplicate_job_names() {
        let tasks = TaskList::from(vec![named("test"), named("test"), named("test")]);
        let index = JobIndex::new(&tasks);

        let names: Vec<_> = index.iter().map(|(_, name)| name).collect();
        assert_eq!(names, vec!["test", "test-1", "test-2"]);
        assert_eq!(index.passed(&tasks, &[2]), vec!["test-1"]);
    }

    #[test]
    fn test_fan_out_and_fan_in() {
        let tasks = TaskList::from(vec![
            run("first.sh"),
            Task::Parallel(Parallel {
                tasks: TaskList::from(vec![
                    run("p1.sh"),
                    Task::Sequence(Sequence {
                        tasks: TaskList::from(vec![run("s1.sh"), run("s2.sh")]),
                    }),
                ]),
            }),
            run("last.sh"),
        ]);
        let index = JobIndex::new(&tasks);

        assert_eq!(index.len(), 5);
        assert!(index.passed(&tasks, &[0]).is_empty());
        assert_eq!(index.passed(&tasks, &[1, 0]), vec!["run first.sh"]);
        assert_eq!(index.passed(&tasks, &[1, 1, 0]), vec!["run first.sh"]);
        assert_eq!(index.passed(&tasks, &[1, 1, 1]), vec!["run s1.sh"]);
        assert_eq!(index.passed(&tasks, &[2]), vec!["run p1.sh", "run s2.sh"]);
    }

    #[test]
    fn test_custom_namer() {
        let tasks = TaskList::from(vec![named("Build It"), named("build_it")]);
        let index = JobIndex::with_namer(&tasks, |leaf| leaf.name().to_lowercase().replace(' ', "_"));
        assert_eq!(index.name(&[0]), Some("build_it"));
        assert_eq!(index.name(&[1]), Some("build_it-1"));
    }
}
