//! Manifest Intermediate Representation
//!
//! A [`Manifest`] is the fully typed form of a `.halfpipe.io` file. It is
//! owned by a single compilation and treated as an immutable value: every
//! transform (see [`crate::defaults`]) produces a new manifest.
//!
//! ## Task tree
//!
//! Tasks form a tree. Leaves ([`LeafTask`]) are the executable units and
//! carry the per-task attributes (name, timeout, retries, notifications,
//! artifact declarations). The composites [`Sequence`] and [`Parallel`] only
//! own child tasks; anything a composite "has" is derived from its children.
//!
//! ## Wire format
//!
//! The IR derives serde so a YAML manifest can be parsed straight into it.
//! Tasks and triggers are internally tagged by `type`.

mod features;
mod notifications;
mod task;
mod trigger;

pub use features::FeatureToggles;
pub use notifications::Notifications;
pub use task::{
    ConsumerIntegrationTest, DeployCf, DeployKatee, DeployMlModules, DeployMlZip, Docker,
    DockerCompose, DockerPush, LeafTask, Parallel, Run, Sequence, Task, TaskCommon, TaskList,
    TaskPath, Update, Vars, ARTIFACTS_PREFIX, DEFAULT_TIMEOUT,
};
pub use trigger::{
    DockerTrigger, GitTrigger, PipelineTrigger, TimerTrigger, Trigger, TriggerList,
    restrict_identifier,
};

use serde::{Deserialize, Serialize};

/// Branches that render under the plain pipeline name.
pub const DEFAULT_BRANCHES: [&str; 2] = ["master", "main"];

/// Target CI engine for a manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Concourse jobs and resources
    #[default]
    Concourse,
    /// GitHub Actions workflow
    Actions,
}

impl Platform {
    /// Whether this manifest targets GitHub Actions
    #[must_use]
    pub const fn is_actions(self) -> bool {
        matches!(self, Self::Actions)
    }
}

/// Overrides for the shared artifact store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Bucket name; empty means the configured default
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bucket: String,

    /// Credentials key; empty means the configured default
    #[serde(skip_serializing_if = "String::is_empty")]
    pub json_key: String,
}

/// A parsed pipeline manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Owning team
    pub team: String,

    /// Pipeline name
    pub pipeline: String,

    /// Default Slack channel for task notifications
    #[serde(skip_serializing_if = "String::is_empty")]
    pub slack_channel: String,

    /// Default message sent on task success
    #[serde(skip_serializing_if = "String::is_empty")]
    pub slack_success_message: String,

    /// Default message sent on task failure
    #[serde(skip_serializing_if = "String::is_empty")]
    pub slack_failure_message: String,

    /// Artifact store overrides
    #[serde(skip_serializing_if = "is_default_artifact_config")]
    pub artifact_config: ArtifactConfig,

    /// Enabled feature toggles
    #[serde(skip_serializing_if = "FeatureToggles::is_empty")]
    pub feature_toggles: FeatureToggles,

    /// Pipeline triggers
    pub triggers: TriggerList,

    /// The task tree
    pub tasks: TaskList,

    /// Target CI engine
    pub platform: Platform,
}

fn is_default_artifact_config(config: &ArtifactConfig) -> bool {
    config == &ArtifactConfig::default()
}

impl Manifest {
    /// Name the pipeline is deployed under.
    ///
    /// Pipelines tracking a branch other than `master`/`main` get the branch
    /// appended so that branch pipelines do not overwrite each other.
    #[must_use]
    pub fn pipeline_name(&self) -> String {
        match self.triggers.git_trigger() {
            Some(git) if !git.branch.is_empty() && !DEFAULT_BRANCHES.contains(&git.branch.as_str()) => {
                format!("{}-{}", self.pipeline, git.branch)
            }
            _ => self.pipeline.clone(),
        }
    }

    /// Bucket used for artifacts, honouring the manifest override
    #[must_use]
    pub fn artifacts_bucket<'a>(&'a self, default: &'a str) -> &'a str {
        if self.artifact_config.bucket.is_empty() {
            default
        } else {
            &self.artifact_config.bucket
        }
    }

    /// Credentials key used for artifacts, honouring the manifest override
    #[must_use]
    pub fn artifacts_json_key<'a>(&'a self, default: &'a str) -> &'a str {
        if self.artifact_config.json_key.is_empty() {
            default
        } else {
            &self.artifact_config.json_key
        }
    }

    /// Whether the git trigger asks for manual triggering
    #[must_use]
    pub fn git_is_manual(&self) -> bool {
        self.triggers.git_trigger().is_some_and(|git| git.manual_trigger)
    }

    /// Base path of the manifest relative to the git root
    #[must_use]
    pub fn base_path(&self) -> &str {
        self.triggers
            .git_trigger()
            .map_or("", |git| git.base_path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_branch(branch: &str) -> Manifest {
        Manifest {
            pipeline: "my-pipeline".to_string(),
            triggers: TriggerList::from(vec![Trigger::Git(GitTrigger {
                branch: branch.to_string(),
                ..GitTrigger::default()
            })]),
            ..Manifest::default()
        }
    }

    #[test]
    fn test_pipeline_name_plain_on_default_branches() {
        assert_eq!(with_branch("").pipeline_name(), "my-pipeline");
        assert_eq!(with_branch("master").pipeline_name(), "my-pipeline");
        assert_eq!(with_branch("main").pipeline_name(), "my-pipeline");
    }

    #[test]
    fn test_pipeline_name_appends_feature_branch() {
        assert_eq!(with_branch("feature-x").pipeline_name(), "my-pipeline-feature-x");
    }

    #[test]
    fn test_artifact_overrides() {
        let mut man = Manifest::default();
        assert_eq!(man.artifacts_bucket("default-bucket"), "default-bucket");

        man.artifact_config.bucket = "mine".to_string();
        assert_eq!(man.artifacts_bucket("default-bucket"), "mine");
        assert_eq!(man.artifacts_json_key("key"), "key");
    }

    #[test]
    fn test_parse_yaml_manifest() {
        let yaml = r"
team: engineering-enablement
pipeline: halfpipe-example
slack_channel: '#ee-builds'
feature_toggles:
  - update-pipeline
triggers:
  - type: git
    watched_paths: [src]
  - type: timer
    cron: '*/10 * * * *'
tasks:
  - type: run
    script: ./build.sh
    docker:
      image: golang:1.22
    save_artifacts: [target]
  - type: parallel
    tasks:
      - type: docker-push
        image: eu.gcr.io/halfpipe-io/example
        restore_artifacts: true
      - type: sequence
        tasks:
          - type: deploy-cf
            api: ((cloudfoundry.api-snpaas))
            space: dev
          - type: consumer-integration-test
            consumer: other-app
";
        let man: Manifest = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(man.team, "engineering-enablement");
        assert!(man.feature_toggles.update_pipeline());
        assert_eq!(man.triggers.len(), 2);
        assert_eq!(man.tasks.len(), 2);
        assert_eq!(man.tasks.flatten().len(), 4);
        assert!(man.tasks.saves_artifacts());
        assert!(man.tasks.reads_from_artifacts());
        assert_eq!(man.platform, Platform::Concourse);

        let Task::Parallel(parallel) = &man.tasks[1] else {
            panic!("expected parallel");
        };
        assert!(matches!(parallel.tasks[1], Task::Sequence(_)));
    }
}
