//! GitHub Actions renderer
//!
//! Lowers a manifest into a single [`Workflow`]: triggers become `on:`
//! events and every leaf task becomes a job whose `needs` names the jobs
//! that precede it.

use crate::jobs::{JobBuilder, docker_push_event, global_env, job_id};
use crate::schema::{
    PushTrigger, RepositoryDispatchTrigger, ScheduleTrigger, Workflow, WorkflowDispatchTrigger,
    WorkflowTriggers,
};
use halfpipe_core::{CompilerConfig, Manifest, Trigger};
use halfpipe_render::{JobIndex, RenderError, RenderResult, Renderer};
use indexmap::IndexMap;
use tracing::{debug, instrument};

/// Renders manifests as GitHub Actions workflows
///
/// # Manifest to GitHub Actions Mapping
///
/// | Manifest | GitHub Actions |
/// |----------|----------------|
/// | `pipeline` | Workflow `name:` |
/// | git trigger | `on.push` with branch and paths |
/// | timer trigger | `on.schedule` |
/// | docker trigger | `on.repository_dispatch` of `docker-push:<image>` |
/// | (always) | `on.workflow_dispatch` |
/// | leaf task | Job keyed by its sanitized name |
/// | preceding tasks | Job `needs:` |
/// | `timeout` | `timeout-minutes:` |
/// | `save_artifacts` | `actions/upload-artifact` step |
/// | `notifications` | Slack steps at the end of the job |
///
/// Pipeline triggers and task retries have no equivalent and are dropped.
#[derive(Debug, Clone, Default)]
pub struct ActionsRenderer {
    config: CompilerConfig,
}

impl ActionsRenderer {
    /// Renderer using `config`
    #[must_use]
    pub const fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Workflow events for the manifest's triggers
    #[must_use]
    pub fn triggers(manifest: &Manifest) -> WorkflowTriggers {
        let mut on = WorkflowTriggers {
            workflow_dispatch: Some(WorkflowDispatchTrigger::default()),
            ..WorkflowTriggers::default()
        };

        for trigger in &manifest.triggers {
            match trigger {
                Trigger::Git(git) if !git.manual_trigger => {
                    on.push = Some(PushTrigger {
                        branches: vec![git.branch_or_default().to_string()],
                        paths: git.watched_paths.clone(),
                        paths_ignore: git.ignored_paths.clone(),
                    });
                }
                Trigger::Timer(timer) => {
                    on.schedule
                        .get_or_insert_with(Vec::new)
                        .push(ScheduleTrigger {
                            cron: timer.cron.clone(),
                        });
                }
                Trigger::Docker(docker) => {
                    on.repository_dispatch
                        .get_or_insert_with(RepositoryDispatchTrigger::default)
                        .types
                        .push(docker_push_event(&docker.image));
                }
                Trigger::Git(_) | Trigger::Pipeline(_) => {}
            }
        }
        on
    }
}

impl Renderer for ActionsRenderer {
    type Graph = Workflow;

    #[instrument(
        name = "render_actions",
        skip_all,
        fields(pipeline = %manifest.pipeline, tasks = manifest.tasks.len())
    )]
    fn render(&self, manifest: &Manifest) -> RenderResult<Workflow> {
        self.validate(manifest)?;

        let mut workflow = Workflow {
            name: manifest.pipeline.clone(),
            on: Self::triggers(manifest),
            ..Workflow::default()
        };
        if manifest.tasks.is_empty() {
            return Ok(workflow);
        }

        let builder = JobBuilder::new(manifest, &self.config);
        let index = JobIndex::with_namer(&manifest.tasks, |leaf| job_id(&leaf.name()));

        let mut jobs = IndexMap::with_capacity(index.len());
        for (path, id) in index.iter() {
            let leaf = manifest.tasks.leaf_at(path).ok_or_else(|| {
                RenderError::invalid_ir(format!("no leaf task at {path:?}"))
            })?;
            let needs = index.passed(&manifest.tasks, path);
            debug!(job = id, needs = ?needs, "rendering job");
            jobs.insert(id.to_string(), builder.job(leaf, needs)?);
        }

        workflow.env = global_env();
        workflow.jobs = jobs;
        Ok(workflow)
    }

    fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn format_name(&self) -> &'static str {
        "actions"
    }

    fn description(&self) -> &'static str {
        "GitHub Actions workflow"
    }
}
