//! Concourse renderer
//!
//! Lowers a manifest into a Concourse [`Pipeline`]: resources first, then
//! one job per leaf task in execution order, wired together through the
//! `passed` constraints of each job's trigger gets.

use crate::jobs::JobBuilder;
use crate::resources::ResourceSet;
use crate::schema::Pipeline;
use halfpipe_core::{CompilerConfig, Manifest};
use halfpipe_render::{JobIndex, RenderError, RenderResult, Renderer};
use tracing::{debug, instrument};

/// Renders manifests as Concourse pipelines
///
/// # Manifest to Concourse Mapping
///
/// | Manifest | Concourse |
/// |----------|-----------|
/// | git trigger | `git` resource |
/// | timer trigger | `cron` resource of type `cron-resource` |
/// | docker trigger | `docker-trigger` resource |
/// | pipeline trigger | resource of type `halfpipe-pipeline-trigger` |
/// | `update-pipeline` toggle | `version` semver resource, gating ordinary jobs |
/// | leaf task | job with `serial: true` |
/// | preceding tasks | `passed` on every trigger get |
/// | `save_artifacts` | put to `artifacts` |
/// | `notifications` | puts to `slack` in `on_success`/`on_failure` |
/// | deploy-cf | puts to a deduplicated `cf-resource` |
#[derive(Debug, Clone, Default)]
pub struct ConcourseRenderer {
    config: CompilerConfig,
}

impl ConcourseRenderer {
    /// Renderer using `config`
    #[must_use]
    pub const fn new(config: CompilerConfig) -> Self {
        Self { config }
    }
}

impl Renderer for ConcourseRenderer {
    type Graph = Pipeline;

    #[instrument(
        name = "render_concourse",
        skip_all,
        fields(pipeline = %manifest.pipeline_name(), tasks = manifest.tasks.len())
    )]
    fn render(&self, manifest: &Manifest) -> RenderResult<Pipeline> {
        self.validate(manifest)?;

        let mut resources = ResourceSet::for_manifest(manifest, &self.config);
        let builder = JobBuilder::new(manifest, &self.config);
        let index = JobIndex::new(&manifest.tasks);

        let mut jobs = Vec::with_capacity(index.len());
        for (path, name) in index.iter() {
            let leaf = manifest.tasks.leaf_at(path).ok_or_else(|| {
                RenderError::invalid_ir(format!("no leaf task at {path:?}"))
            })?;
            let passed = index.passed(&manifest.tasks, path);
            debug!(job = name, passed = ?passed, "rendering job");
            jobs.push(builder.job(name, leaf, &passed, &mut resources)?);
        }

        Ok(Pipeline {
            resource_types: resources.types,
            resources: resources.resources,
            jobs,
        })
    }

    fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn format_name(&self) -> &'static str {
        "concourse"
    }

    fn description(&self) -> &'static str {
        "Concourse pipeline configuration"
    }
}
