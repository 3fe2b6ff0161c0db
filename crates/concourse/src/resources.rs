//! Resources and resource types of a rendered pipeline

use crate::schema::{Params, Resource, ResourceType, params};
use halfpipe_core::manifest::{
    DEFAULT_BRANCHES, DeployCf, DockerTrigger, GitTrigger, PipelineTrigger, TimerTrigger,
    restrict_identifier,
};
use halfpipe_core::{CompilerConfig, FeatureToggles, LeafTask, Manifest, Trigger};
use halfpipe_render::NameRegistry;
use serde_yaml::Value;

/// Git resource
pub const GIT: &str = "git";
/// Resource type used to transfer artifacts
pub const GCP_RESOURCE: &str = "gcp-resource";
/// Artifacts saved on success
pub const ARTIFACTS: &str = "artifacts";
/// Artifacts saved on failure
pub const ARTIFACTS_ON_FAILURE: &str = "artifacts-on-failure";
/// Semantic version resource
pub const VERSION: &str = "version";
/// Slack resource and resource type
pub const SLACK: &str = "slack";
/// Cron resource type
pub const CRON_RESOURCE: &str = "cron-resource";
/// Deploy resource type for Cloud Foundry
pub const CF_RESOURCE: &str = "cf-resource";
/// Resource type of pipeline triggers
pub const PIPELINE_TRIGGER_RESOURCE: &str = "halfpipe-pipeline-trigger";

/// Check interval of resources that are only ever put to
pub const LONG_CHECK_INTERVAL: &str = "24h";

const GCR_USERNAME: &str = "_json_key";
const GCR_PASSWORD: &str = "((halfpipe-gcr.private_key))";

/// Lowercase `input` and drop everything outside `[a-z0-9-]`
#[must_use]
pub fn folder_component(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Bucket folder holding the artifacts of the pipeline
#[must_use]
pub fn artifacts_folder(manifest: &Manifest) -> String {
    format!(
        "{}/{}",
        folder_component(&manifest.team),
        folder_component(&manifest.pipeline_name())
    )
}

/// Image source in halfpipe's registry, authenticated with the GCR key
#[must_use]
pub fn gcr_source(config: &CompilerConfig, name: &str, tag: &str) -> Params {
    params([
        ("repository", config.registry_image(name)),
        ("tag", tag.to_string()),
        ("password", GCR_PASSWORD.to_string()),
        ("username", GCR_USERNAME.to_string()),
    ])
}

fn strings(values: &[String]) -> Value {
    Value::Sequence(values.iter().cloned().map(Value::from).collect())
}

/// Name of the deploy resource of a Cloud Foundry target
#[must_use]
pub fn cf_resource_name(cf: &DeployCf) -> String {
    let api = cf
        .api
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("((cloudfoundry.api-")
        .trim_end_matches("))");
    restrict_identifier(&format!("cf-{api}-{}-{}", cf.org, cf.space))
}

/// Resource types and resources of a pipeline under construction.
///
/// Resource names are claimed from a single [`NameRegistry`]; deploy
/// targets with identical sources share one resource. The name claimed for
/// each trigger is kept by its position in the manifest's trigger list.
#[derive(Debug, Default)]
pub struct ResourceSet {
    /// Resource types, in insertion order
    pub types: Vec<ResourceType>,
    /// Resources, in insertion order
    pub resources: Vec<Resource>,
    names: NameRegistry,
    triggers: Vec<Option<String>>,
}

impl ResourceSet {
    /// Everything the manifest needs: triggers, notifications, artifacts,
    /// versioning, deploy targets and upstream pipelines
    #[must_use]
    pub fn for_manifest(manifest: &Manifest, config: &CompilerConfig) -> Self {
        let mut set = Self {
            triggers: vec![None; manifest.triggers.len()],
            ..Self::default()
        };

        for (i, trigger) in manifest.triggers.iter().enumerate() {
            let name = match trigger {
                Trigger::Git(git) => set.push(git_resource(git)),
                Trigger::Timer(timer) => {
                    set.push_type(cron_resource_type());
                    set.push(cron_resource(timer))
                }
                Trigger::Docker(docker) => set.push(docker_trigger_resource(docker)),
                Trigger::Pipeline(_) => continue,
            };
            set.triggers[i] = Some(name);
        }

        if manifest.tasks.uses_notifications() {
            set.push_type(slack_resource_type());
            set.push(slack_resource(config));
        }

        let saves = manifest.tasks.saves_artifacts() || manifest.tasks.reads_from_artifacts();
        let saves_on_failure = manifest.tasks.saves_artifacts_on_failure();
        if saves || saves_on_failure {
            set.push_type(ResourceType::registry_image(
                GCP_RESOURCE,
                gcr_source(config, GCP_RESOURCE, "stable"),
            ));
            if saves {
                set.push(artifacts_resource(manifest, config, ARTIFACTS));
            }
            if saves_on_failure {
                set.push(artifacts_resource(manifest, config, ARTIFACTS_ON_FAILURE));
            }
        }

        if manifest.feature_toggles.update_pipeline() {
            set.push(version_resource(manifest, config));
        }

        for leaf in manifest.tasks.flatten() {
            if let LeafTask::DeployCf(cf) = leaf {
                set.cf_resource(cf, &manifest.feature_toggles, config);
            }
        }

        let upstream: Vec<(usize, &PipelineTrigger)> = manifest
            .triggers
            .iter()
            .enumerate()
            .filter_map(|(i, trigger)| match trigger {
                Trigger::Pipeline(pipeline) => Some((i, pipeline)),
                _ => None,
            })
            .collect();
        if !upstream.is_empty() {
            set.push_type(ResourceType::registry_image(
                PIPELINE_TRIGGER_RESOURCE,
                gcr_source(config, "halfpipe-pipeline-trigger-resource", "latest"),
            ));
            for (i, pipeline) in upstream {
                set.triggers[i] = Some(set.push(pipeline_trigger_resource(pipeline)));
            }
        }

        set
    }

    /// Resource name claimed for the trigger at `index` of the manifest's
    /// trigger list
    #[must_use]
    pub fn trigger_resource(&self, index: usize) -> Option<&str> {
        self.triggers.get(index).and_then(Option::as_deref)
    }

    fn push_type(&mut self, resource_type: ResourceType) {
        if !self.types.iter().any(|t| t.name == resource_type.name) {
            self.types.push(resource_type);
        }
    }

    fn push(&mut self, mut resource: Resource) -> String {
        resource.name = self.names.claim(&resource.name);
        let name = resource.name.clone();
        self.resources.push(resource);
        name
    }

    /// Name of the deploy resource for `cf`, adding it on first use
    pub fn cf_resource(&mut self, cf: &DeployCf, toggles: &FeatureToggles, config: &CompilerConfig) -> String {
        let source = params([
            ("api", cf.api.clone()),
            ("org", cf.org.clone()),
            ("space", cf.space.clone()),
            ("username", cf.username.clone()),
            ("password", cf.password.clone()),
        ]);

        if let Some(existing) = self
            .resources
            .iter()
            .find(|r| r.kind == CF_RESOURCE && r.source == source)
        {
            return existing.name.clone();
        }

        let image = if toggles.contains(FeatureToggles::NEW_DEPLOY_RESOURCE) {
            "cf-resource-v2"
        } else {
            CF_RESOURCE
        };
        self.push_type(ResourceType::registry_image(
            CF_RESOURCE,
            gcr_source(config, image, "stable"),
        ));
        self.push(Resource::new(cf_resource_name(cf), CF_RESOURCE, source).with_check_every(LONG_CHECK_INTERVAL))
    }
}

fn git_resource(git: &GitTrigger) -> Resource {
    let mut source = params([("uri", git.uri.clone())]);
    if !git.private_key.is_empty() {
        source.insert("private_key".to_string(), git.private_key.clone().into());
    }
    if !git.watched_paths.is_empty() {
        source.insert("paths".to_string(), strings(&git.watched_paths));
    }
    if !git.ignored_paths.is_empty() {
        source.insert("ignore_paths".to_string(), strings(&git.ignored_paths));
    }
    if !git.git_crypt_key.is_empty() {
        source.insert("git_crypt_key".to_string(), git.git_crypt_key.clone().into());
    }
    source.insert("branch".to_string(), git.branch_or_default().into());

    Resource::new(GIT, "git", source)
}

fn cron_resource_type() -> ResourceType {
    let mut resource_type = ResourceType::registry_image(
        CRON_RESOURCE,
        params([("repository", "cftoolsmiths/cron-resource"), ("tag", "v0.3")]),
    );
    resource_type.unique_version_history = Some(true);
    resource_type
}

fn cron_resource(timer: &TimerTrigger) -> Resource {
    let mut source = params([("expression", timer.cron.as_str()), ("location", "UTC")]);
    source.insert("fire_immediately".to_string(), Value::Bool(true));
    Resource::new(Trigger::Timer(timer.clone()).name(), CRON_RESOURCE, source).with_check_every("1m")
}

fn docker_trigger_resource(docker: &DockerTrigger) -> Resource {
    let mut source = params([("repository", docker.image.as_str())]);
    if !docker.username.is_empty() {
        source.insert("username".to_string(), docker.username.clone().into());
    }
    if !docker.password.is_empty() {
        source.insert("password".to_string(), docker.password.clone().into());
    }
    Resource::new(Trigger::Docker(docker.clone()).name(), "docker-image", source)
}

fn slack_resource_type() -> ResourceType {
    let mut resource_type = ResourceType::registry_image(
        SLACK,
        params([
            ("repository", "cfcommunity/slack-notification-resource"),
            ("tag", "v1.4.2"),
        ]),
    );
    resource_type.check_every = Some(LONG_CHECK_INTERVAL.to_string());
    resource_type
}

fn slack_resource(config: &CompilerConfig) -> Resource {
    Resource::new(SLACK, SLACK, params([("url", config.slack_webhook.as_str())]))
        .with_check_every(LONG_CHECK_INTERVAL)
}

fn artifacts_resource(manifest: &Manifest, config: &CompilerConfig, name: &str) -> Resource {
    Resource::new(
        name,
        GCP_RESOURCE,
        params([
            ("bucket", manifest.artifacts_bucket(&config.artifacts_bucket).to_string()),
            ("folder", artifacts_folder(manifest)),
            ("json_key", manifest.artifacts_json_key(&config.artifacts_json_key).to_string()),
        ]),
    )
    .with_check_every(LONG_CHECK_INTERVAL)
}

/// Key of the version in the version bucket
#[must_use]
pub fn version_key(manifest: &Manifest) -> String {
    let key = format!("{}-{}", manifest.team, manifest.pipeline);
    match manifest.triggers.git_trigger() {
        Some(git) if !git.branch.is_empty() && !DEFAULT_BRANCHES.contains(&git.branch.as_str()) => {
            format!("{key}-{}", git.branch)
        }
        _ => key,
    }
}

fn version_resource(manifest: &Manifest, config: &CompilerConfig) -> Resource {
    Resource::new(
        VERSION,
        "semver",
        params([
            ("driver", "gcs".to_string()),
            ("key", version_key(manifest)),
            ("bucket", config.version_bucket.clone()),
            ("json_key", config.version_json_key.clone()),
        ]),
    )
}

fn pipeline_trigger_resource(pipeline: &PipelineTrigger) -> Resource {
    Resource::new(
        Trigger::Pipeline(pipeline.clone()).name(),
        PIPELINE_TRIGGER_RESOURCE,
        params([
            ("concourse_url", pipeline.concourse_url.as_str()),
            ("username", pipeline.username.as_str()),
            ("password", pipeline.password.as_str()),
            ("team", pipeline.team.as_str()),
            ("pipeline", pipeline.pipeline.as_str()),
            ("job", pipeline.job.as_str()),
            ("status", pipeline.status.as_str()),
        ]),
    )
}
