//! Task tree
//!
//! [`Task`] is closed over three shapes: a [`LeafTask`] (one executable
//! unit, which becomes one rendered job) and the two composites
//! [`Sequence`] and [`Parallel`]. Per-leaf queries such as `name`,
//! `timeout` or `attempts` only exist on [`LeafTask`]; composites expose
//! just what can be derived from their children.

use super::notifications::Notifications;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

/// Environment variables / build arguments of a task
pub type Vars = BTreeMap<String, String>;

/// Position of a task in the tree, one index per nesting level
pub type TaskPath = Vec<usize>;

/// Timeout applied to leaf tasks that do not set one
pub const DEFAULT_TIMEOUT: &str = "1h";

/// Prefix of paths that point into restored artifacts
pub const ARTIFACTS_PREFIX: &str = "../artifacts/";

fn is_zero(n: &i32) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Attributes shared by every leaf task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskCommon {
    /// Job name; blank means the kind's default
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Duration such as `30m` or `1h`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub timeout: String,

    /// Extra attempts after a failure, 0 to 5
    #[serde(skip_serializing_if = "is_zero")]
    pub retries: i32,

    /// Slack notifications; `None` when the author did not set them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Notifications>,

    /// Also notify the default channel on success
    #[serde(skip_serializing_if = "is_false")]
    pub notify_on_success: bool,

    /// Only run when triggered by hand
    #[serde(skip_serializing_if = "is_false")]
    pub manual_trigger: bool,

    /// Number of builds to keep logs for; 0 keeps the engine default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_history: Option<u32>,

    /// Paths saved to the artifact store on success
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub save_artifacts: Vec<String>,

    /// Paths saved to the artifact store on failure
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub save_artifacts_on_failure: Vec<String>,

    /// Restore previously saved artifacts before running
    #[serde(skip_serializing_if = "is_false")]
    pub restore_artifacts: bool,

    /// Environment variables
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: Vars,
}

/// Image a run task executes in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Docker {
    /// Image reference
    pub image: String,

    /// Registry username
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,

    /// Registry password
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

/// Runs a script inside a docker image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Run {
    /// Shared leaf attributes
    #[serde(flatten)]
    pub common: TaskCommon,

    /// Script path, optionally followed by arguments
    pub script: String,

    /// Image to run in
    pub docker: Docker,
}

/// Builds and pushes a docker image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerPush {
    /// Shared leaf attributes
    #[serde(flatten)]
    pub common: TaskCommon,

    /// Target image, optionally with a tag
    pub image: String,

    /// Registry username
    pub username: String,

    /// Registry password
    pub password: String,

    /// Dockerfile relative to the manifest
    pub dockerfile_path: String,

    /// Build context relative to the manifest
    pub build_path: String,

    /// `gitref` or `version`; chooses the tag downstream deploys use
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,

    /// Target platforms
    pub platforms: Vec<String>,

    /// Reuse the registry build cache
    pub use_cache: bool,

    /// Vulnerability scan timeout in minutes
    pub scan_timeout: u32,
}

impl Default for DockerPush {
    fn default() -> Self {
        Self {
            common: TaskCommon::default(),
            image: String::new(),
            username: "_json_key".to_string(),
            password: "((halfpipe-gcr.private_key))".to_string(),
            dockerfile_path: "Dockerfile".to_string(),
            build_path: String::new(),
            tag: String::new(),
            platforms: vec!["linux/amd64".to_string()],
            use_cache: false,
            scan_timeout: 15,
        }
    }
}

/// Runs a service from a docker-compose file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerCompose {
    /// Shared leaf attributes
    #[serde(flatten)]
    pub common: TaskCommon,

    /// Compose file relative to the manifest
    pub compose_file: String,

    /// Service to run
    pub service: String,

    /// Command override
    #[serde(skip_serializing_if = "String::is_empty")]
    pub command: String,
}

impl Default for DockerCompose {
    fn default() -> Self {
        Self {
            common: TaskCommon::default(),
            compose_file: "docker-compose.yml".to_string(),
            service: "app".to_string(),
            command: String::new(),
        }
    }
}

/// Deploys an application to Cloud Foundry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployCf {
    /// Shared leaf attributes
    #[serde(flatten)]
    pub common: TaskCommon,

    /// CF API endpoint
    pub api: String,

    /// CF organisation
    pub org: String,

    /// CF space
    pub space: String,

    /// CF username
    pub username: String,

    /// CF password
    pub password: String,

    /// CF application manifest relative to the manifest
    pub manifest: String,

    /// Files supplying `((var))` values for the CF manifest
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vars_files: Vec<String>,

    /// Domain used for the candidate route
    #[serde(skip_serializing_if = "String::is_empty")]
    pub test_domain: String,

    /// Pre-built artifact to push instead of the source
    #[serde(skip_serializing_if = "String::is_empty")]
    pub deploy_artifact: String,

    /// Deploy without a candidate app
    #[serde(skip_serializing_if = "is_false")]
    pub rolling: bool,

    /// Checks run against the candidate app before promotion
    #[serde(skip_serializing_if = "TaskList::is_empty")]
    pub pre_promote: TaskList,
}

impl Default for DeployCf {
    fn default() -> Self {
        Self {
            common: TaskCommon::default(),
            api: String::new(),
            org: String::new(),
            space: String::new(),
            username: "((cloudfoundry.username))".to_string(),
            password: "((cloudfoundry.password))".to_string(),
            manifest: "manifest.yml".to_string(),
            vars_files: Vec::new(),
            test_domain: String::new(),
            deploy_artifact: String::new(),
            rolling: false,
            pre_promote: TaskList::default(),
        }
    }
}

/// Deploys a zip to MarkLogic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployMlZip {
    /// Shared leaf attributes
    #[serde(flatten)]
    pub common: TaskCommon,

    /// Zip to deploy
    pub deploy_zip: String,

    /// Application name
    pub app_name: String,

    /// Application version
    #[serde(skip_serializing_if = "String::is_empty")]
    pub app_version: String,

    /// MarkLogic hosts
    pub targets: Vec<String>,

    /// Use the pipeline build version as the app version
    #[serde(skip_serializing_if = "is_false")]
    pub use_build_version: bool,
}

/// Deploys released MarkLogic modules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployMlModules {
    /// Shared leaf attributes
    #[serde(flatten)]
    pub common: TaskCommon,

    /// Version of the ml-modules release
    pub ml_modules_version: String,

    /// Application name
    pub app_name: String,

    /// Application version
    #[serde(skip_serializing_if = "String::is_empty")]
    pub app_version: String,

    /// MarkLogic hosts
    pub targets: Vec<String>,

    /// Use the pipeline build version as the app version
    #[serde(skip_serializing_if = "is_false")]
    pub use_build_version: bool,
}

/// Runs a consumer's contract tests against this provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerIntegrationTest {
    /// Shared leaf attributes
    #[serde(flatten)]
    pub common: TaskCommon,

    /// Consumer repo, optionally `repo/subdir`
    pub consumer: String,

    /// Host of the consumer
    pub consumer_host: String,

    /// Host of the provider under test
    #[serde(skip_serializing_if = "String::is_empty")]
    pub provider_host: String,

    /// Test script in the consumer repo
    pub script: String,

    /// Compose service the script runs in
    pub docker_compose_service: String,

    /// Extra options for `git clone`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub git_clone_options: String,

    /// Publish results to covenant
    #[serde(skip_serializing_if = "is_false")]
    pub use_covenant: bool,
}

impl Default for ConsumerIntegrationTest {
    fn default() -> Self {
        Self {
            common: TaskCommon::default(),
            consumer: String::new(),
            consumer_host: String::new(),
            provider_host: String::new(),
            script: String::new(),
            docker_compose_service: "code".to_string(),
            git_clone_options: String::new(),
            use_covenant: false,
        }
    }
}

/// Deploys to the Katee platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployKatee {
    /// Shared leaf attributes
    #[serde(flatten)]
    pub common: TaskCommon,

    /// Application name
    pub application_name: String,

    /// Image to deploy
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// `gitref` or `version`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,

    /// Vela application file
    pub vela_manifest: String,

    /// Namespace; blank means `katee-<team>`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Seconds between deployment status checks
    pub check_interval: u32,

    /// Maximum number of status checks
    pub max_checks: u32,
}

impl Default for DeployKatee {
    fn default() -> Self {
        Self {
            common: TaskCommon::default(),
            application_name: String::new(),
            image: String::new(),
            tag: String::new(),
            vela_manifest: "vela.yaml".to_string(),
            namespace: String::new(),
            check_interval: 1,
            max_checks: 60,
        }
    }
}

impl DeployKatee {
    /// Namespace, `katee-<team>` when blank
    #[must_use]
    pub fn namespace_or_team(&self, team: &str) -> String {
        if self.namespace.is_empty() {
            format!("katee-{team}")
        } else {
            self.namespace.clone()
        }
    }

    /// Team the namespace belongs to
    #[must_use]
    pub fn katee_team(&self, team: &str) -> String {
        let namespace = self.namespace_or_team(team);
        namespace
            .strip_prefix("katee-")
            .unwrap_or(&namespace)
            .to_string()
    }
}

/// Updates the pipeline itself and bumps the version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Update {
    /// Shared leaf attributes
    #[serde(flatten)]
    pub common: TaskCommon,

    /// Tag the commit with the new version
    #[serde(skip_serializing_if = "is_false")]
    pub tag_repo: bool,
}

/// A chain of leaf tasks that runs alongside its siblings in a [`Parallel`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sequence {
    /// Children, run one after the other
    pub tasks: TaskList,
}

/// Tasks that run concurrently
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parallel {
    /// Children, run at the same time
    pub tasks: TaskList,
}

/// An executable task; each renders to exactly one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafTask {
    /// Script in a container
    Run(Run),
    /// Docker image build and push
    DockerPush(DockerPush),
    /// docker-compose service
    DockerCompose(DockerCompose),
    /// Cloud Foundry deployment
    DeployCf(DeployCf),
    /// MarkLogic zip deployment
    DeployMlZip(DeployMlZip),
    /// MarkLogic modules deployment
    DeployMlModules(DeployMlModules),
    /// Consumer driven contract test
    ConsumerIntegrationTest(ConsumerIntegrationTest),
    /// Katee deployment
    DeployKatee(DeployKatee),
    /// Pipeline self-update
    Update(Update),
}

/// A node of the task tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTask", into = "RawTask")]
pub enum Task {
    /// Executable unit
    Leaf(LeafTask),
    /// Linear chain of leaves
    Sequence(Sequence),
    /// Concurrent branches
    Parallel(Parallel),
}

/// Flat wire representation; the capability split is not part of the format
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum RawTask {
    Run(Run),
    DockerPush(DockerPush),
    DockerCompose(DockerCompose),
    DeployCf(DeployCf),
    DeployMlZip(DeployMlZip),
    DeployMlModules(DeployMlModules),
    ConsumerIntegrationTest(ConsumerIntegrationTest),
    DeployKatee(DeployKatee),
    Update(Update),
    Sequence(Sequence),
    Parallel(Parallel),
}

impl From<RawTask> for Task {
    fn from(raw: RawTask) -> Self {
        match raw {
            RawTask::Run(t) => Self::Leaf(LeafTask::Run(t)),
            RawTask::DockerPush(t) => Self::Leaf(LeafTask::DockerPush(t)),
            RawTask::DockerCompose(t) => Self::Leaf(LeafTask::DockerCompose(t)),
            RawTask::DeployCf(t) => Self::Leaf(LeafTask::DeployCf(t)),
            RawTask::DeployMlZip(t) => Self::Leaf(LeafTask::DeployMlZip(t)),
            RawTask::DeployMlModules(t) => Self::Leaf(LeafTask::DeployMlModules(t)),
            RawTask::ConsumerIntegrationTest(t) => {
                Self::Leaf(LeafTask::ConsumerIntegrationTest(t))
            }
            RawTask::DeployKatee(t) => Self::Leaf(LeafTask::DeployKatee(t)),
            RawTask::Update(t) => Self::Leaf(LeafTask::Update(t)),
            RawTask::Sequence(s) => Self::Sequence(s),
            RawTask::Parallel(p) => Self::Parallel(p),
        }
    }
}

impl From<Task> for RawTask {
    fn from(task: Task) -> Self {
        match task {
            Task::Leaf(LeafTask::Run(t)) => Self::Run(t),
            Task::Leaf(LeafTask::DockerPush(t)) => Self::DockerPush(t),
            Task::Leaf(LeafTask::DockerCompose(t)) => Self::DockerCompose(t),
            Task::Leaf(LeafTask::DeployCf(t)) => Self::DeployCf(t),
            Task::Leaf(LeafTask::DeployMlZip(t)) => Self::DeployMlZip(t),
            Task::Leaf(LeafTask::DeployMlModules(t)) => Self::DeployMlModules(t),
            Task::Leaf(LeafTask::ConsumerIntegrationTest(t)) => Self::ConsumerIntegrationTest(t),
            Task::Leaf(LeafTask::DeployKatee(t)) => Self::DeployKatee(t),
            Task::Leaf(LeafTask::Update(t)) => Self::Update(t),
            Task::Sequence(s) => Self::Sequence(s),
            Task::Parallel(p) => Self::Parallel(p),
        }
    }
}

impl From<LeafTask> for Task {
    fn from(leaf: LeafTask) -> Self {
        Self::Leaf(leaf)
    }
}

macro_rules! leaf_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for LeafTask {
                fn from(task: $variant) -> Self {
                    Self::$variant(task)
                }
            }

            impl From<$variant> for Task {
                fn from(task: $variant) -> Self {
                    Self::Leaf(LeafTask::$variant(task))
                }
            }
        )*
    };
}

leaf_from!(
    Run,
    DockerPush,
    DockerCompose,
    DeployCf,
    DeployMlZip,
    DeployMlModules,
    ConsumerIntegrationTest,
    DeployKatee,
    Update,
);

impl From<Sequence> for Task {
    fn from(sequence: Sequence) -> Self {
        Self::Sequence(sequence)
    }
}

impl From<Parallel> for Task {
    fn from(parallel: Parallel) -> Self {
        Self::Parallel(parallel)
    }
}

impl LeafTask {
    /// Shared leaf attributes
    #[must_use]
    pub const fn common(&self) -> &TaskCommon {
        match self {
            Self::Run(t) => &t.common,
            Self::DockerPush(t) => &t.common,
            Self::DockerCompose(t) => &t.common,
            Self::DeployCf(t) => &t.common,
            Self::DeployMlZip(t) => &t.common,
            Self::DeployMlModules(t) => &t.common,
            Self::ConsumerIntegrationTest(t) => &t.common,
            Self::DeployKatee(t) => &t.common,
            Self::Update(t) => &t.common,
        }
    }

    /// Mutable shared leaf attributes
    pub const fn common_mut(&mut self) -> &mut TaskCommon {
        match self {
            Self::Run(t) => &mut t.common,
            Self::DockerPush(t) => &mut t.common,
            Self::DockerCompose(t) => &mut t.common,
            Self::DeployCf(t) => &mut t.common,
            Self::DeployMlZip(t) => &mut t.common,
            Self::DeployMlModules(t) => &mut t.common,
            Self::ConsumerIntegrationTest(t) => &mut t.common,
            Self::DeployKatee(t) => &mut t.common,
            Self::Update(t) => &mut t.common,
        }
    }

    /// Type tag as written in the manifest
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::DockerPush(_) => "docker-push",
            Self::DockerCompose(_) => "docker-compose",
            Self::DeployCf(_) => "deploy-cf",
            Self::DeployMlZip(_) => "deploy-ml-zip",
            Self::DeployMlModules(_) => "deploy-ml-modules",
            Self::ConsumerIntegrationTest(_) => "consumer-integration-test",
            Self::DeployKatee(_) => "deploy-katee",
            Self::Update(_) => "update",
        }
    }

    /// Display name, falling back to the kind's default
    #[must_use]
    pub fn name(&self) -> String {
        let common = self.common();
        if !common.name.is_empty() {
            return common.name.clone();
        }
        match self {
            Self::Run(run) => format!("run {}", run.script.replacen("./", "", 1)),
            other => other.kind().to_string(),
        }
    }

    /// Timeout, `1h` when unset
    #[must_use]
    pub fn timeout(&self) -> &str {
        let timeout = &self.common().timeout;
        if timeout.is_empty() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        }
    }

    /// Configured retries
    #[must_use]
    pub const fn retries(&self) -> i32 {
        self.common().retries
    }

    /// Total attempts, one plus retries
    #[must_use]
    pub fn attempts(&self) -> u32 {
        1 + u32::try_from(self.retries()).unwrap_or(0)
    }

    /// Notification settings, if any were set or defaulted
    #[must_use]
    pub const fn notifications(&self) -> Option<&Notifications> {
        self.common().notifications.as_ref()
    }

    /// Whether the task should notify the default channel on success
    #[must_use]
    pub const fn notifies_on_success(&self) -> bool {
        self.common().notify_on_success
    }

    /// Whether the task only runs when triggered by hand
    #[must_use]
    pub const fn is_manual_trigger(&self) -> bool {
        self.common().manual_trigger
    }

    /// Builds to keep logs for
    #[must_use]
    pub const fn build_history(&self) -> Option<u32> {
        self.common().build_history
    }

    /// Environment variables
    #[must_use]
    pub const fn vars(&self) -> &Vars {
        &self.common().vars
    }

    /// Whether the task needs artifacts restored before it runs.
    ///
    /// A Cloud Foundry deploy also reads them for a manifest or app under
    /// `../artifacts/` and for pre-promote tasks that restore them.
    #[must_use]
    pub fn reads_from_artifacts(&self) -> bool {
        if self.common().restore_artifacts {
            return true;
        }
        match self {
            Self::DeployCf(cf) => {
                cf.manifest.starts_with(ARTIFACTS_PREFIX)
                    || cf.deploy_artifact.starts_with(ARTIFACTS_PREFIX)
                    || cf.pre_promote.reads_from_artifacts()
            }
            _ => false,
        }
    }

    /// Whether the task, or one of its pre-promote tasks, saves artifacts
    /// on success
    #[must_use]
    pub fn saves_artifacts(&self) -> bool {
        !self.common().save_artifacts.is_empty()
            || matches!(self, Self::DeployCf(cf) if cf.pre_promote.saves_artifacts())
    }

    /// Whether the task, or one of its pre-promote tasks, saves artifacts
    /// on failure
    #[must_use]
    pub fn saves_artifacts_on_failure(&self) -> bool {
        !self.common().save_artifacts_on_failure.is_empty()
            || matches!(self, Self::DeployCf(cf) if cf.pre_promote.saves_artifacts_on_failure())
    }

    /// Whether any notification channel is set
    #[must_use]
    pub fn uses_notifications(&self) -> bool {
        self.notifications().is_some_and(Notifications::is_defined)
    }

    /// Copy of the task with the given notifications
    #[must_use]
    pub fn with_notifications(mut self, notifications: Option<Notifications>) -> Self {
        self.common_mut().notifications = notifications;
        self
    }
}

impl Task {
    /// The leaf, if this is one
    #[must_use]
    pub const fn as_leaf(&self) -> Option<&LeafTask> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Children of a composite; empty for leaves
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Leaf(_) => &[],
            Self::Sequence(s) => &s.tasks,
            Self::Parallel(p) => &p.tasks,
        }
    }

    /// Type tag as written in the manifest
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Leaf(leaf) => leaf.kind(),
            Self::Sequence(_) => "sequence",
            Self::Parallel(_) => "parallel",
        }
    }

    /// Whether this task or any descendant restores artifacts
    #[must_use]
    pub fn reads_from_artifacts(&self) -> bool {
        match self {
            Self::Leaf(leaf) => leaf.reads_from_artifacts(),
            _ => self.children().iter().any(Self::reads_from_artifacts),
        }
    }

    /// Whether this task or any descendant saves artifacts
    #[must_use]
    pub fn saves_artifacts(&self) -> bool {
        match self {
            Self::Leaf(leaf) => leaf.saves_artifacts(),
            _ => self.children().iter().any(Self::saves_artifacts),
        }
    }

    /// Whether this task or any descendant saves artifacts on failure
    #[must_use]
    pub fn saves_artifacts_on_failure(&self) -> bool {
        match self {
            Self::Leaf(leaf) => leaf.saves_artifacts_on_failure(),
            _ => self.children().iter().any(Self::saves_artifacts_on_failure),
        }
    }

    /// Whether this task or any descendant sends notifications
    #[must_use]
    pub fn uses_notifications(&self) -> bool {
        match self {
            Self::Leaf(leaf) => leaf.uses_notifications(),
            _ => self.children().iter().any(Self::uses_notifications),
        }
    }
}

/// Ordered list of tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskList(pub Vec<Task>);

impl From<Vec<Task>> for TaskList {
    fn from(tasks: Vec<Task>) -> Self {
        Self(tasks)
    }
}

impl FromIterator<Task> for TaskList {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for TaskList {
    type Target = [Task];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a TaskList {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl TaskList {
    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All leaves in execution order
    #[must_use]
    pub fn flatten(&self) -> Vec<&LeafTask> {
        self.leaves().into_iter().map(|(_, leaf)| leaf).collect()
    }

    /// All leaves in execution order, with their positions
    #[must_use]
    pub fn leaves(&self) -> Vec<(TaskPath, &LeafTask)> {
        fn walk<'a>(tasks: &'a [Task], prefix: &[usize], out: &mut Vec<(TaskPath, &'a LeafTask)>) {
            for (i, task) in tasks.iter().enumerate() {
                let mut path = prefix.to_vec();
                path.push(i);
                match task {
                    Task::Leaf(leaf) => out.push((path, leaf)),
                    _ => walk(task.children(), &path, out),
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.0, &[], &mut out);
        out
    }

    /// Task at `path`
    #[must_use]
    pub fn get_path(&self, path: &[usize]) -> Option<&Task> {
        let (first, rest) = path.split_first()?;
        let mut task = self.0.get(*first)?;
        for i in rest {
            task = task.children().get(*i)?;
        }
        Some(task)
    }

    /// Leaf at `path`
    #[must_use]
    pub fn leaf_at(&self, path: &[usize]) -> Option<&LeafTask> {
        self.get_path(path).and_then(Task::as_leaf)
    }

    /// Any task restores artifacts
    #[must_use]
    pub fn reads_from_artifacts(&self) -> bool {
        self.0.iter().any(Task::reads_from_artifacts)
    }

    /// Any task saves artifacts
    #[must_use]
    pub fn saves_artifacts(&self) -> bool {
        self.0.iter().any(Task::saves_artifacts)
    }

    /// Any task saves artifacts on failure
    #[must_use]
    pub fn saves_artifacts_on_failure(&self) -> bool {
        self.0.iter().any(Task::saves_artifacts_on_failure)
    }

    /// Any task sends notifications
    #[must_use]
    pub fn uses_notifications(&self) -> bool {
        self.0.iter().any(Task::uses_notifications)
    }

    /// Whether an update task exists anywhere in the tree
    #[must_use]
    pub fn has_update_task(&self) -> bool {
        self.flatten()
            .into_iter()
            .any(|leaf| matches!(leaf, LeafTask::Update(_)))
    }

    /// Positions of the leaves that must have passed before the task at
    /// `path` may run.
    ///
    /// In the top level list and inside a [`Sequence`] each task waits on
    /// the exit of its previous sibling, and the first child inherits what
    /// its parent waits on. Every child of a [`Parallel`] inherits what the
    /// parallel waits on. The exit of a sequence is its last child, the exit
    /// of a parallel is every branch's exit.
    #[must_use]
    pub fn passed_paths(&self, path: &[usize]) -> Vec<TaskPath> {
        fn walk(
            tasks: &[Task],
            prefix: &mut TaskPath,
            entry: Vec<TaskPath>,
            parallel: bool,
            path: &[usize],
        ) -> Vec<TaskPath> {
            let Some((&i, rest)) = path.split_first() else {
                return entry;
            };
            let Some(task) = tasks.get(i) else {
                return Vec::new();
            };

            let entry = if parallel || i == 0 {
                entry
            } else {
                let mut previous = prefix.clone();
                previous.push(i - 1);
                exits(&tasks[i - 1], previous)
            };

            if rest.is_empty() {
                return entry;
            }

            prefix.push(i);
            match task {
                Task::Sequence(s) => walk(&s.tasks, prefix, entry, false, rest),
                Task::Parallel(p) => walk(&p.tasks, prefix, entry, true, rest),
                Task::Leaf(_) => entry,
            }
        }

        walk(&self.0, &mut Vec::new(), Vec::new(), false, path)
    }

    /// Names that must have passed before the task at `path` may run,
    /// using `name_of` to name each predecessor leaf.
    pub fn passed_names_by<F>(&self, path: &[usize], mut name_of: F) -> Vec<String>
    where
        F: FnMut(&[usize], &LeafTask) -> String,
    {
        self.passed_paths(path)
            .iter()
            .filter_map(|p| self.leaf_at(p).map(|leaf| name_of(p, leaf)))
            .collect()
    }

    /// Task names the top level task `i` depends on
    #[must_use]
    pub fn previous_task_names(&self, i: usize) -> Vec<String> {
        self.passed_names_by(&[i], |_, leaf| leaf.name())
    }
}

fn exits(task: &Task, path: TaskPath) -> Vec<TaskPath> {
    match task {
        Task::Leaf(_) => vec![path],
        Task::Sequence(s) => match s.tasks.len().checked_sub(1) {
            Some(last) => {
                let mut child = path;
                child.push(last);
                exits(&s.tasks[last], child)
            }
            None => Vec::new(),
        },
        Task::Parallel(p) => p
            .tasks
            .iter()
            .enumerate()
            .flat_map(|(i, t)| {
                let mut child = path.clone();
                child.push(i);
                exits(t, child)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str) -> Task {
        Run {
            script: script.to_string(),
            ..Run::default()
        }
        .into()
    }

    fn parallel(tasks: Vec<Task>) -> Task {
        Parallel { tasks: tasks.into() }.into()
    }

    fn sequence(tasks: Vec<Task>) -> Task {
        Sequence { tasks: tasks.into() }.into()
    }

    #[test]
    fn test_default_names() {
        let Task::Leaf(leaf) = run("./build.sh --fast") else {
            unreachable!()
        };
        assert_eq!(leaf.name(), "run build.sh --fast");
        assert_eq!(LeafTask::from(DeployCf::default()).name(), "deploy-cf");
        assert_eq!(LeafTask::from(Update::default()).name(), "update");

        let named = LeafTask::from(Run {
            common: TaskCommon {
                name: "Test".to_string(),
                ..TaskCommon::default()
            },
            ..Run::default()
        });
        assert_eq!(named.name(), "Test");
    }

    #[test]
    fn test_timeout_and_attempts() {
        let mut leaf = LeafTask::from(Run::default());
        assert_eq!(leaf.timeout(), "1h");
        assert_eq!(leaf.attempts(), 1);

        leaf.common_mut().retries = 3;
        leaf.common_mut().timeout = "30m".to_string();
        assert_eq!(leaf.attempts(), 4);
        assert_eq!(leaf.timeout(), "30m");
    }

    #[test]
    fn test_deploy_cf_reads_artifacts_from_paths() {
        let from_manifest = LeafTask::from(DeployCf {
            manifest: "../artifacts/manifest.yml".to_string(),
            ..DeployCf::default()
        });
        assert!(from_manifest.reads_from_artifacts());

        let from_artifact = LeafTask::from(DeployCf {
            deploy_artifact: "../artifacts/app.jar".to_string(),
            ..DeployCf::default()
        });
        assert!(from_artifact.reads_from_artifacts());

        assert!(!LeafTask::from(DeployCf::default()).reads_from_artifacts());
    }

    #[test]
    fn test_deploy_cf_artifacts_include_pre_promote() {
        let smoke = Run {
            script: "smoke.sh".to_string(),
            common: TaskCommon {
                restore_artifacts: true,
                save_artifacts_on_failure: vec!["reports".to_string()],
                ..TaskCommon::default()
            },
            ..Run::default()
        };
        let deploy = LeafTask::from(DeployCf {
            pre_promote: TaskList::from(vec![smoke.into()]),
            ..DeployCf::default()
        });

        assert!(deploy.reads_from_artifacts());
        assert!(deploy.saves_artifacts_on_failure());
        assert!(!deploy.saves_artifacts());

        let tasks = TaskList::from(vec![Task::Leaf(deploy)]);
        assert!(tasks.reads_from_artifacts());
        assert!(tasks.saves_artifacts_on_failure());
    }

    #[test]
    fn test_has_update_task_finds_nested_update() {
        assert!(!TaskList::from(vec![run("a")]).has_update_task());
        let nested = TaskList::from(vec![
            run("a"),
            parallel(vec![run("b"), Update::default().into()]),
        ]);
        assert!(nested.has_update_task());
    }

    #[test]
    fn test_composites_derive_from_children() {
        let restoring = Run {
            common: TaskCommon {
                restore_artifacts: true,
                ..TaskCommon::default()
            },
            ..Run::default()
        };
        let tree = parallel(vec![run("a"), sequence(vec![run("b"), restoring.into()])]);

        assert!(tree.reads_from_artifacts());
        assert!(!tree.saves_artifacts());
        assert!(!tree.saves_artifacts_on_failure());
    }

    #[test]
    fn test_flatten_in_execution_order() {
        let tasks = TaskList::from(vec![
            run("1"),
            parallel(vec![run("2"), sequence(vec![run("3"), run("4")])]),
            run("5"),
        ]);
        let names: Vec<_> = tasks.flatten().iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["run 1", "run 2", "run 3", "run 4", "run 5"]);

        let paths: Vec<_> = tasks.leaves().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![vec![0], vec![1, 0], vec![1, 1, 0], vec![1, 1, 1], vec![2]]
        );
    }

    #[test]
    fn test_passed_paths_fan_out_and_fan_in() {
        let tasks = TaskList::from(vec![
            run("first"),
            parallel(vec![run("p1"), sequence(vec![run("s1"), run("s2")])]),
            run("last"),
        ]);

        assert!(tasks.passed_paths(&[0]).is_empty());
        assert_eq!(tasks.passed_paths(&[1, 0]), vec![vec![0]]);
        assert_eq!(tasks.passed_paths(&[1, 1, 0]), vec![vec![0]]);
        assert_eq!(tasks.passed_paths(&[1, 1, 1]), vec![vec![1, 1, 0]]);
        assert_eq!(tasks.passed_paths(&[2]), vec![vec![1, 0], vec![1, 1, 1]]);
    }

    #[test]
    fn test_previous_task_names() {
        let tasks = TaskList::from(vec![
            run("a"),
            parallel(vec![run("b"), run("c")]),
            run("d"),
        ]);
        assert!(tasks.previous_task_names(0).is_empty());
        assert_eq!(tasks.previous_task_names(1), vec!["run a"]);
        assert_eq!(tasks.previous_task_names(2), vec!["run b", "run c"]);
    }

    #[test]
    fn test_yaml_round_trip_keeps_type_tags() {
        let tasks = TaskList::from(vec![parallel(vec![run("./a.sh")])]);
        let yaml = serde_yaml::to_string(&tasks).unwrap();
        assert!(yaml.contains("type: parallel"));
        assert!(yaml.contains("type: run"));

        let back: TaskList = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, tasks);
    }

    #[test]
    fn test_katee_namespace_defaults_to_team() {
        let katee = DeployKatee::default();
        assert_eq!(katee.namespace_or_team("ee"), "katee-ee");
        assert_eq!(katee.katee_team("ee"), "ee");

        let katee = DeployKatee {
            namespace: "katee-other".to_string(),
            ..DeployKatee::default()
        };
        assert_eq!(katee.namespace_or_team("ee"), "katee-other");
        assert_eq!(katee.katee_team("ee"), "other");
    }
}
