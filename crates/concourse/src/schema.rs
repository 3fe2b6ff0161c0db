//! Concourse Pipeline Schema Types
//!
//! Defines the data structures for Concourse pipeline YAML generation.
//! See: <https://concourse-ci.org/pipelines.html>

use indexmap::IndexMap;
use serde::Serialize;

/// Free-form resource source or step params
pub type Params = IndexMap<String, serde_yaml::Value>;

/// Environment of a task
pub type TaskEnv = IndexMap<String, String>;

/// A Concourse pipeline definition
#[derive(Debug, Clone, Default, Serialize)]
pub struct Pipeline {
    /// Custom resource types
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<ResourceType>,

    /// Resources referenced by jobs
    pub resources: Vec<Resource>,

    /// Jobs, in execution order
    pub jobs: Vec<Job>,
}

impl Pipeline {
    /// Resource by name
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Resource type by name
    #[must_use]
    pub fn resource_type(&self, name: &str) -> Option<&ResourceType> {
        self.resource_types.iter().find(|r| r.name == name)
    }

    /// Job by name
    #[must_use]
    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.name == name)
    }
}

/// A custom resource type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceType {
    /// Name used by resources
    pub name: String,

    /// Type of the image providing the resource type
    #[serde(rename = "type")]
    pub kind: String,

    /// Where to fetch the image
    pub source: Params,

    /// Check interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_every: Option<String>,

    /// Share version history across resources of this type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_version_history: Option<bool>,
}

impl ResourceType {
    /// A resource type backed by a registry image
    pub fn registry_image(name: impl Into<String>, source: Params) -> Self {
        Self {
            name: name.into(),
            kind: "registry-image".to_string(),
            source,
            check_every: None,
            unique_version_history: None,
        }
    }
}

/// A resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    /// Resource name
    pub name: String,

    /// Resource type
    #[serde(rename = "type")]
    pub kind: String,

    /// Resource configuration
    pub source: Params,

    /// Check interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_every: Option<String>,
}

impl Resource {
    /// Create a resource
    pub fn new(name: impl Into<String>, kind: impl Into<String>, source: Params) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            source,
            check_every: None,
        }
    }

    /// Set the check interval
    #[must_use]
    pub fn with_check_every(mut self, interval: impl Into<String>) -> Self {
        self.check_every = Some(interval.into());
        self
    }
}

/// How many build logs to keep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildLogRetention {
    /// Succeeded builds always kept
    pub minimum_succeeded_builds: u32,

    /// Total builds kept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builds: Option<u32>,
}

/// A job
#[derive(Debug, Clone, Default, Serialize)]
pub struct Job {
    /// Job name
    pub name: String,

    /// Never run two builds of this job at once
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub serial: bool,

    /// Log retention
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_log_retention: Option<BuildLogRetention>,

    /// Steps
    pub plan: Vec<Step>,

    /// Runs when the plan succeeds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Box<Step>>,

    /// Runs when the plan fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<Box<Step>>,

    /// Runs after the plan regardless of outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensure: Option<Box<Step>>,
}

impl Job {
    /// Every step of the plan, including nested ones, depth first
    #[must_use]
    pub fn steps(&self) -> Vec<&Step> {
        let mut out = Vec::new();
        for step in &self.plan {
            step.collect(&mut out);
        }
        out
    }

    /// Task steps of the plan with the given name
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&TaskStep> {
        self.steps().into_iter().find_map(|s| match &s.kind {
            StepKind::Task(task) if task.task == name => Some(&**task),
            _ => None,
        })
    }

    /// Get steps of the plan
    #[must_use]
    pub fn gets(&self) -> Vec<&GetStep> {
        self.steps()
            .into_iter()
            .filter_map(|s| match &s.kind {
                StepKind::Get(get) => Some(get),
                _ => None,
            })
            .collect()
    }
}

/// A step plus its retry and timeout modifiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    /// What the step does
    #[serde(flatten)]
    pub kind: StepKind,

    /// Total attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,

    /// Give up after this long
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// The step variants halfpipe emits
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepKind {
    /// Fetch a resource version
    Get(GetStep),
    /// Push to a resource
    Put(PutStep),
    /// Run a container
    Task(Box<TaskStep>),
    /// Run steps concurrently
    InParallel(InParallelStep),
}

impl Step {
    fn of(kind: StepKind) -> Self {
        Self {
            kind,
            attempts: None,
            timeout: None,
        }
    }

    /// Fetch the named resource
    pub fn get(name: impl Into<String>) -> Self {
        Self::of(StepKind::Get(GetStep {
            get: name.into(),
            ..GetStep::default()
        }))
    }

    /// Fetch with params
    pub fn get_with(name: impl Into<String>, params: Params) -> Self {
        Self::of(StepKind::Get(GetStep {
            get: name.into(),
            params,
            ..GetStep::default()
        }))
    }

    /// Push to the resource of the same name
    pub fn put(name: impl Into<String>, params: Params) -> Self {
        Self::of(StepKind::Put(PutStep {
            put: name.into(),
            resource: None,
            params,
        }))
    }

    /// Named push to `resource`
    pub fn put_to(name: impl Into<String>, resource: impl Into<String>, params: Params) -> Self {
        Self::of(StepKind::Put(PutStep {
            put: name.into(),
            resource: Some(resource.into()),
            params,
        }))
    }

    /// Run a task
    #[must_use]
    pub fn task(task: TaskStep) -> Self {
        Self::of(StepKind::Task(Box::new(task)))
    }

    /// A single step as is, several steps in parallel failing fast
    #[must_use]
    pub fn parallelize(mut steps: Vec<Self>) -> Option<Self> {
        match steps.len() {
            0 => None,
            1 => steps.pop(),
            _ => Some(Self::of(StepKind::InParallel(InParallelStep {
                in_parallel: InParallelConfig {
                    steps,
                    fail_fast: true,
                },
            }))),
        }
    }

    /// Wrap with a timeout and, above one attempt, retries
    #[must_use]
    pub fn with_attempts_and_timeout(mut self, attempts: u32, timeout: impl Into<String>) -> Self {
        self.attempts = (attempts > 1).then_some(attempts);
        self.timeout = Some(timeout.into());
        self
    }

    /// Visit every get step, including those nested in `in_parallel`
    pub fn for_each_get_mut(&mut self, f: &mut impl FnMut(&mut GetStep)) {
        match &mut self.kind {
            StepKind::Get(get) => f(get),
            StepKind::InParallel(parallel) => {
                for step in &mut parallel.in_parallel.steps {
                    step.for_each_get_mut(f);
                }
            }
            StepKind::Put(_) | StepKind::Task(_) => {}
        }
    }

    /// Name of the get, put or task, `None` for `in_parallel`
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Get(get) => Some(&get.get),
            StepKind::Put(put) => Some(&put.put),
            StepKind::Task(task) => Some(&task.task),
            StepKind::InParallel(_) => None,
        }
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Self>) {
        out.push(self);
        if let StepKind::InParallel(parallel) = &self.kind {
            for step in &parallel.in_parallel.steps {
                step.collect(out);
            }
        }
    }
}

/// Fetches a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GetStep {
    /// Resource name
    pub get: String,

    /// Start a build when a new version appears
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub trigger: bool,

    /// Only versions that passed these jobs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub passed: Vec<String>,

    /// Resource specific parameters
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub params: Params,
}

/// Pushes to a resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PutStep {
    /// Step name, also the resource when `resource` is unset
    pub put: String,

    /// Resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Resource specific parameters
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub params: Params,
}

/// Runs a container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStep {
    /// Step name
    pub task: String,

    /// Run with elevated privileges
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,

    /// Task definition
    pub config: TaskConfig,
}

/// Definition of a task container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskConfig {
    /// Always `linux`
    pub platform: String,

    /// Image to run in
    pub image_resource: ImageResource,

    /// Environment variables
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub params: TaskEnv,

    /// Command
    pub run: TaskRun,

    /// Artifacts mounted into the container
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<TaskIo>,

    /// Artifacts produced by the container
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<TaskIo>,
}

impl TaskConfig {
    /// Linux task running `run` in `image`
    #[must_use]
    pub fn linux(image_resource: ImageResource, run: TaskRun) -> Self {
        Self {
            platform: "linux".to_string(),
            image_resource,
            params: TaskEnv::new(),
            run,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Names of the inputs
    #[must_use]
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.name.as_str()).collect()
    }
}

/// Image of a task container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageResource {
    /// Resource type used to fetch the image
    #[serde(rename = "type")]
    pub kind: String,

    /// Repository, tag and credentials
    pub source: Params,
}

/// Command of a task
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskRun {
    /// Executable
    pub path: String,

    /// Arguments
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Working directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// Named task input or output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskIo {
    /// Artifact name
    pub name: String,
}

impl TaskIo {
    /// Input or output called `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Concurrent steps
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InParallelStep {
    /// Step configuration
    pub in_parallel: InParallelConfig,
}

/// Steps run concurrently
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InParallelConfig {
    /// Steps
    pub steps: Vec<Step>,

    /// Abort the others when one fails
    pub fail_fast: bool,
}

/// Build [`Params`] from key/value pairs
#[must_use]
pub fn params<K, V, I>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<serde_yaml::Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
