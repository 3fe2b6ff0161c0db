//! Jobs of a rendered pipeline
//!
//! Every leaf task becomes one job. Its plan starts with the trigger gets
//! and an optional artifact restore, followed by the task specific body.
//! Artifact saving on failure and Slack notifications hang off the job's
//! `on_failure`/`on_success` hooks.

use crate::docker_push;
use crate::paths;
use crate::resources::{
    ARTIFACTS, ARTIFACTS_ON_FAILURE, GCP_RESOURCE, GIT, ResourceSet, SLACK, VERSION,
    artifacts_folder, gcr_source,
};
use crate::schema::{
    BuildLogRetention, ImageResource, Job, Params, Step, TaskConfig, TaskEnv, TaskIo, TaskRun,
    TaskStep, params,
};
use halfpipe_core::manifest::{
    DeployCf, DeployKatee, Docker, Notifications, Run, Update, restrict_identifier,
};
use halfpipe_core::{CompilerConfig, FeatureToggles, LeafTask, Manifest, Trigger};
use halfpipe_render::convert::{self, ScriptTask, script_command, split_image};
use halfpipe_render::{RenderError, RenderResult};
use serde_yaml::Value;

/// Attempts of steps that talk to external systems
pub const DEFAULT_ATTEMPTS: u32 = 2;
/// Timeout of steps that talk to external systems
pub const DEFAULT_STEP_TIMEOUT: &str = "15m";

/// Directory the git resource is fetched into
pub const GIT_DIR: &str = "git";
/// Task output saved to the artifacts resource on success
pub const ARTIFACTS_OUT: &str = "artifacts-out";
/// Task output saved to the artifacts resource on failure
pub const ARTIFACTS_OUT_FAILURE: &str = "artifacts-out-failure";
/// Directory restored artifacts are downloaded into
pub const ARTIFACTS_IN: &str = "artifacts";

const GIT_REF_FILE: &str = "git/.git/ref";

const SUCCESS_MESSAGE: &str = "Success! $BUILD_PIPELINE_NAME/$BUILD_JOB_NAME\n$ATC_EXTERNAL_URL/teams/$BUILD_TEAM_NAME/pipelines/$BUILD_PIPELINE_NAME/jobs/$BUILD_JOB_NAME/builds/$BUILD_NAME";
const FAILURE_MESSAGE: &str = "Failed :( $BUILD_PIPELINE_NAME/$BUILD_JOB_NAME\n$ATC_EXTERNAL_URL/teams/$BUILD_TEAM_NAME/pipelines/$BUILD_PIPELINE_NAME/jobs/$BUILD_JOB_NAME/builds/$BUILD_NAME";

const COPY_ARTIFACT_FUNCTION: &str = r#"copyArtifact() {
  ARTIFACT=$1
  ARTIFACT_OUT_PATH=$2

  if [ -e $ARTIFACT ] ; then
    mkdir -p $ARTIFACT_OUT_PATH
    cp -r $ARTIFACT $ARTIFACT_OUT_PATH
  else
    echo "ERROR: Artifact '$ARTIFACT' not found. Try fly hijack to check the filesystem."
    exit 1
  fi
}
"#;

/// Builds the job of each leaf task
#[derive(Debug)]
pub struct JobBuilder<'a> {
    manifest: &'a Manifest,
    config: &'a CompilerConfig,
}

impl<'a> JobBuilder<'a> {
    /// Builder for jobs of `manifest`
    #[must_use]
    pub const fn new(manifest: &'a Manifest, config: &'a CompilerConfig) -> Self {
        Self { manifest, config }
    }

    fn versioned(&self) -> bool {
        self.manifest.feature_toggles.update_pipeline()
    }

    fn base_path(&self) -> &str {
        self.manifest.base_path()
    }

    fn working_dir(&self) -> String {
        paths::join([GIT_DIR, self.base_path()])
    }

    /// The complete job of `leaf`, waiting on the jobs in `passed`
    ///
    /// # Errors
    /// Returns [`RenderError::InvalidIr`] if a deploy task holds a
    /// pre-promote task that cannot run as a script
    pub fn job(
        &self,
        name: &str,
        leaf: &LeafTask,
        passed: &[String],
        resources: &mut ResourceSet,
    ) -> RenderResult<Job> {
        let mut plan = self.initial_plan(leaf, passed, resources);
        let mut ensure = None;

        match leaf {
            LeafTask::DockerPush(push) => {
                plan.extend(docker_push::steps(push, self.manifest, self.config));
            }
            LeafTask::DeployCf(cf) => {
                let resource = resources.cf_resource(cf, &self.manifest.feature_toggles, self.config);
                let (steps, cleanup) = self.deploy_cf_steps(cf, &resource)?;
                plan.extend(steps);
                ensure = cleanup.map(Box::new);
            }
            LeafTask::DeployKatee(katee) => plan.push(self.katee_step(katee)),
            LeafTask::Update(update) => plan.extend(self.update_steps(update)),
            LeafTask::Run(_)
            | LeafTask::DockerCompose(_)
            | LeafTask::ConsumerIntegrationTest(_)
            | LeafTask::DeployMlZip(_)
            | LeafTask::DeployMlModules(_) => {
                let script = convert::lower(leaf, self.manifest, self.config).ok_or_else(|| {
                    RenderError::invalid_ir(format!("{} cannot be lowered to a script", leaf.kind()))
                })?;
                plan.extend(self.run_steps(&script));
            }
        }

        Ok(Job {
            name: name.to_string(),
            serial: true,
            build_log_retention: Some(BuildLogRetention {
                minimum_succeeded_builds: 1,
                builds: leaf.build_history().filter(|builds| *builds > 0),
            }),
            plan,
            on_success: self.on_success(leaf).map(Box::new),
            on_failure: self.on_failure(leaf).map(Box::new),
            ensure,
        })
    }

    /// Trigger gets, gated on `passed`, plus the artifact restore when the
    /// task reads artifacts. Gets use the resource names claimed in
    /// `resources`.
    #[must_use]
    pub fn initial_plan(&self, leaf: &LeafTask, passed: &[String], resources: &ResourceSet) -> Vec<Step> {
        let is_update = matches!(leaf, LeafTask::Update(_));
        let versioned = self.versioned();
        let gate_on_version = !is_update && versioned;

        let mut gets = Vec::new();
        for (i, trigger) in self.manifest.triggers.iter().enumerate() {
            let resource = resources
                .trigger_resource(i)
                .map_or_else(|| trigger.name(), str::to_string);
            match trigger {
                Trigger::Git(git) => {
                    let fetch = if git.shallow {
                        params([("depth", 1)])
                    } else {
                        Params::new()
                    };
                    gets.push(Step::get_with(resource, fetch));
                }
                Trigger::Timer(_) | Trigger::Pipeline(_) if !gate_on_version => {
                    gets.push(Step::get(resource));
                }
                Trigger::Docker(_) if !gate_on_version => {
                    gets.push(Step::get_with(resource, params([("skip_download", true)])));
                }
                Trigger::Timer(_) | Trigger::Pipeline(_) | Trigger::Docker(_) => {}
            }
        }
        if gate_on_version {
            gets.push(Step::get(VERSION));
        }

        let mut plan = Vec::new();
        if let Some(step) = Step::parallelize(gets) {
            let mut step = step.with_attempts_and_timeout(DEFAULT_ATTEMPTS, DEFAULT_STEP_TIMEOUT);
            let manual_git = self.manifest.git_is_manual();
            step.for_each_get_mut(&mut |get| {
                get.passed = passed.to_vec();
                if !leaf.is_manual_trigger() {
                    get.trigger = trigger_flag(&get.get, is_update, versioned, manual_git);
                }
            });
            plan.push(step);
        }

        if leaf.reads_from_artifacts() {
            plan.push(self.restore_artifacts());
        }
        plan
    }

    /// Task downloading the artifacts saved for this revision
    #[must_use]
    pub fn restore_artifacts(&self) -> Step {
        let mut config = TaskConfig::linux(
            ImageResource {
                kind: "registry-image".to_string(),
                source: gcr_source(self.config, GCP_RESOURCE, "stable"),
            },
            TaskRun {
                path: "/opt/resource/download".to_string(),
                args: vec![".".to_string()],
                dir: Some(ARTIFACTS_IN.to_string()),
            },
        );
        config.params = env([
            (
                "BUCKET",
                self.manifest.artifacts_bucket(&self.config.artifacts_bucket).to_string(),
            ),
            ("FOLDER", artifacts_folder(self.manifest)),
            (
                "JSON_KEY",
                self.manifest.artifacts_json_key(&self.config.artifacts_json_key).to_string(),
            ),
            ("VERSION_FILE", GIT_REF_FILE.to_string()),
        ]);
        config.inputs.push(TaskIo::named(GIT_DIR));
        config.outputs.push(TaskIo::named(ARTIFACTS_IN));

        Step::task(TaskStep {
            task: "get-artifact".to_string(),
            privileged: false,
            config,
        })
        .with_attempts_and_timeout(DEFAULT_ATTEMPTS, DEFAULT_STEP_TIMEOUT)
    }

    /// Task running a script, followed by the artifact upload
    #[must_use]
    pub fn run_steps(&self, script: &ScriptTask) -> Vec<Step> {
        let run = &script.run;
        let leaf = LeafTask::Run(run.clone());
        let mut steps = vec![self
            .script_step(run, script.privileged)
            .with_attempts_and_timeout(leaf.attempts(), leaf.timeout())];

        if leaf.saves_artifacts() {
            steps.push(
                Step::put(
                    ARTIFACTS,
                    params([("folder", ARTIFACTS_OUT), ("version_file", GIT_REF_FILE)]),
                )
                .with_attempts_and_timeout(DEFAULT_ATTEMPTS, DEFAULT_STEP_TIMEOUT),
            );
        }
        steps
    }

    fn script_step(&self, run: &Run, privileged: bool) -> Step {
        let leaf = LeafTask::Run(run.clone());
        let mut config = TaskConfig::linux(
            image_resource(&run.docker),
            TaskRun {
                path: "/bin/sh".to_string(),
                args: vec!["-c".to_string(), self.run_script(run)],
                dir: Some(self.working_dir()),
            },
        );
        config.params = run
            .common
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        config.inputs.push(TaskIo::named(GIT_DIR));
        if leaf.reads_from_artifacts() {
            config.inputs.push(TaskIo::named(ARTIFACTS_IN));
        }
        if self.versioned() {
            config.inputs.push(TaskIo::named(VERSION));
        }
        if leaf.saves_artifacts() {
            config.outputs.push(TaskIo::named(ARTIFACTS_OUT));
        }
        if leaf.saves_artifacts_on_failure() {
            config.outputs.push(TaskIo::named(ARTIFACTS_OUT_FAILURE));
        }

        Step::task(TaskStep {
            task: restrict_identifier(&leaf.name()),
            privileged,
            config,
        })
    }

    /// Shell script wrapping the task command: exports revision and
    /// version, runs the command and copies artifacts into the outputs
    #[must_use]
    pub fn run_script(&self, run: &Run) -> String {
        let base_path = self.base_path();
        let save = &run.common.save_artifacts;
        let save_on_failure = &run.common.save_artifacts_on_failure;
        let mut lines = Vec::new();

        if !save.is_empty() || !save_on_failure.is_empty() {
            lines.push(COPY_ARTIFACT_FUNCTION.to_string());
        }
        lines.push(format!("export GIT_REVISION=`cat {}`", paths::git_ref(base_path)));
        if self.versioned() {
            lines.push(format!(
                "export BUILD_VERSION=`cat {}`",
                paths::version_file(base_path)
            ));
        }
        lines.push(String::new());
        lines.push(script_command(&run.script));
        lines.push("EXIT_STATUS=$?".to_string());
        lines.push("if [ $EXIT_STATUS != 0 ] ; then".to_string());
        if !save_on_failure.is_empty() {
            lines.push("  # Artifacts to copy in case of failure".to_string());
            for artifact in save_on_failure {
                lines.push(format!(
                    "  copyArtifact {artifact} {}",
                    paths::artifact_destination(GIT_DIR, base_path, ARTIFACTS_OUT_FAILURE, artifact)
                ));
            }
        }
        lines.push("  exit 1".to_string());
        lines.push("fi".to_string());

        if !save.is_empty() {
            lines.push(String::new());
            lines.push("# Artifacts to copy from task".to_string());
            for artifact in save {
                lines.push(format!(
                    "copyArtifact {artifact} {}",
                    paths::artifact_destination(GIT_DIR, base_path, ARTIFACTS_OUT, artifact)
                ));
            }
        }
        lines.join("\n")
    }

    fn cf_path(&self, path: &str) -> String {
        path.strip_prefix(halfpipe_core::manifest::ARTIFACTS_PREFIX).map_or_else(
            || paths::join([self.working_dir().as_str(), path]),
            |artifact| paths::join([ARTIFACTS_IN, artifact]),
        )
    }

    fn cf_params(&self, cf: &DeployCf, command: &str) -> Params {
        let cli_version = if self.manifest.feature_toggles.contains(FeatureToggles::CF_V7) {
            "cf7"
        } else {
            "cf6"
        };
        let mut out = params([
            ("command", command.to_string()),
            ("manifestPath", self.cf_path(&cf.manifest)),
            ("cliVersion", cli_version.to_string()),
            ("timeout", LeafTask::DeployCf(cf.clone()).timeout().to_string()),
        ]);
        if !cf.test_domain.is_empty() && command != "halfpipe-cleanup" {
            out.insert("testDomain".to_string(), cf.test_domain.clone().into());
        }
        out
    }

    fn deploy_params(&self, cf: &DeployCf, command: &str) -> Params {
        let mut out = self.cf_params(cf, command);
        let app_path = if cf.deploy_artifact.is_empty() {
            self.working_dir()
        } else {
            self.cf_path(&cf.deploy_artifact)
        };
        out.insert("appPath".to_string(), app_path.into());
        out.insert("gitRefPath".to_string(), GIT_REF_FILE.into());
        if !cf.common.vars.is_empty() {
            let vars: serde_yaml::Mapping = cf
                .common
                .vars
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
                .collect();
            out.insert("vars".to_string(), Value::Mapping(vars));
        }
        if !cf.vars_files.is_empty() {
            let files = cf.vars_files.iter().map(|f| Value::from(self.cf_path(f))).collect();
            out.insert("varsFiles".to_string(), Value::Sequence(files));
        }
        if self.versioned() {
            out.insert("buildVersionPath".to_string(), "version/version".into());
        }
        out
    }

    /// Deploy steps of a Cloud Foundry task, plus the cleanup run in `ensure`
    ///
    /// # Errors
    /// Returns [`RenderError::InvalidIr`] for a pre-promote task that is
    /// not a script
    pub fn deploy_cf_steps(&self, cf: &DeployCf, resource: &str) -> RenderResult<(Vec<Step>, Option<Step>)> {
        let leaf = LeafTask::DeployCf(cf.clone());
        let wrap = |step: Step| step.with_attempts_and_timeout(leaf.attempts(), leaf.timeout());

        if cf.rolling {
            let deploy = Step::put_to(
                "halfpipe-rolling-deploy",
                resource,
                self.deploy_params(cf, "halfpipe-rolling-deploy"),
            );
            return Ok((vec![wrap(deploy)], None));
        }

        let mut steps = vec![wrap(Step::put_to(
            "halfpipe-push",
            resource,
            self.deploy_params(cf, "halfpipe-push"),
        ))];

        let mut pre_promote = Vec::new();
        for check in cf.pre_promote.flatten() {
            let script = convert::lower(check, self.manifest, self.config).ok_or_else(|| {
                RenderError::invalid_ir(format!(
                    "pre_promote: {} cannot run before promotion",
                    check.kind()
                ))
            })?;
            pre_promote.extend(self.run_steps(&script));
        }
        if let Some(parallel) = Step::parallelize(pre_promote) {
            steps.push(parallel);
        }

        steps.push(wrap(Step::put_to(
            "halfpipe-check",
            resource,
            self.cf_params(cf, "halfpipe-check"),
        )));
        steps.push(wrap(Step::put_to(
            "halfpipe-promote",
            resource,
            self.cf_params(cf, "halfpipe-promote"),
        )));

        let cleanup = wrap(Step::put_to(
            "halfpipe-cleanup",
            resource,
            self.cf_params(cf, "halfpipe-cleanup"),
        ));
        Ok((steps, Some(cleanup)))
    }

    /// Task deploying to Katee and waiting for the rollout
    #[must_use]
    pub fn katee_step(&self, katee: &DeployKatee) -> Step {
        let leaf = LeafTask::DeployKatee(katee.clone());
        let team = &self.manifest.team;
        let namespace = katee.namespace_or_team(team);
        let tag_variable = if katee.tag == "version" {
            "$BUILD_VERSION"
        } else {
            "$GIT_REVISION"
        };

        let mut script = vec![format!(
            "export GIT_REVISION=`cat {}`",
            paths::git_ref(self.base_path())
        )];
        if self.versioned() {
            script.push(format!(
                "export BUILD_VERSION=`cat {}`",
                paths::version_file(self.base_path())
            ));
        }
        script.extend([
            format!("export DOCKER_TAG={tag_variable}"),
            format!("export KATEE_APPLICATION_IMAGE={}:$DOCKER_TAG", katee.image),
            "/exe vela up -f $KATEE_APPFILE --publish-version $DOCKER_TAG".to_string(),
            "/exe deployment-status $KATEE_NAMESPACE $KATEE_APPLICATION_NAME $DOCKER_TAG".to_string(),
        ]);

        let mut config = TaskConfig::linux(
            ImageResource {
                kind: "registry-image".to_string(),
                source: gcr_source(self.config, "ee-katee-vela-cli", "latest"),
            },
            TaskRun {
                path: "/bin/sh".to_string(),
                args: vec!["-c".to_string(), script.join("\n")],
                dir: Some(self.working_dir()),
            },
        );
        config.params = env([
            ("KATEE_TEAM", katee.katee_team(team)),
            ("KATEE_NAMESPACE", namespace.clone()),
            ("KATEE_APPFILE", katee.vela_manifest.clone()),
            ("KATEE_APPLICATION_NAME", katee.application_name.clone()),
            (
                "KATEE_GKE_CREDENTIALS",
                format!("(({namespace}-service-account-prod.key))"),
            ),
            ("CHECK_INTERVAL", katee.check_interval.to_string()),
            ("MAX_CHECKS", katee.max_checks.to_string()),
        ]);
        for (key, value) in &katee.common.vars {
            config.params.insert(key.clone(), value.clone());
        }
        config.inputs.push(TaskIo::named(GIT_DIR));
        if self.versioned() {
            config.inputs.push(TaskIo::named(VERSION));
        }

        Step::task(TaskStep {
            task: restrict_identifier(&leaf.name()),
            privileged: false,
            config,
        })
        .with_attempts_and_timeout(leaf.attempts(), leaf.timeout())
    }

    /// Pipeline self update, version bump and optional tagging
    #[must_use]
    pub fn update_steps(&self, update: &Update) -> Vec<Step> {
        let leaf = LeafTask::Update(update.clone());
        let pipeline_name = self.manifest.pipeline_name();

        let mut config = TaskConfig::linux(
            ImageResource {
                kind: "registry-image".to_string(),
                source: gcr_source(self.config, "halfpipe-auto-update", "latest"),
            },
            TaskRun {
                path: "update-pipeline".to_string(),
                args: Vec::new(),
                dir: Some(self.working_dir()),
            },
        );
        config.params = env([
            ("CONCOURSE_URL", "((concourse.url))".to_string()),
            ("CONCOURSE_PASSWORD", "((concourse.password))".to_string()),
            ("CONCOURSE_TEAM", "((concourse.team))".to_string()),
            ("CONCOURSE_USERNAME", "((concourse.username))".to_string()),
            ("PIPELINE_NAME", pipeline_name.clone()),
            ("HALFPIPE_DOMAIN", self.config.domain.clone()),
            ("HALFPIPE_PROJECT", self.config.project.clone()),
        ]);
        config.inputs.push(TaskIo::named(GIT_DIR));

        let mut steps = vec![
            Step::task(TaskStep {
                task: "update-pipeline".to_string(),
                privileged: false,
                config,
            })
            .with_attempts_and_timeout(leaf.attempts(), leaf.timeout()),
            Step::put(VERSION, params([("bump", "minor")]))
                .with_attempts_and_timeout(leaf.attempts(), leaf.timeout()),
        ];

        if update.tag_repo {
            steps.push(
                Step::put(
                    GIT,
                    params([
                        ("repository", Value::from(GIT_DIR)),
                        ("tag", Value::from("version/version")),
                        ("tag_prefix", Value::from(format!("{pipeline_name}/v"))),
                        ("only_tag", Value::Bool(true)),
                    ]),
                )
                .with_attempts_and_timeout(leaf.attempts(), leaf.timeout()),
            );
        }
        steps
    }

    /// Artifact upload and Slack messages when the job fails
    #[must_use]
    pub fn on_failure(&self, leaf: &LeafTask) -> Option<Step> {
        let mut steps = Vec::new();
        if leaf.saves_artifacts_on_failure() {
            steps.push(Step::put(
                ARTIFACTS_ON_FAILURE,
                params([
                    ("folder", ARTIFACTS_OUT_FAILURE),
                    ("version_file", GIT_REF_FILE),
                    ("postfix", "failure"),
                ]),
            ));
        }
        if let Some(notifications) = leaf.notifications() {
            let text = notifications.failure_message_or(FAILURE_MESSAGE);
            steps.extend(
                notifications
                    .on_failure
                    .iter()
                    .map(|channel| slack_put(channel, text, "failed")),
            );
        }
        Step::parallelize(steps).map(|s| s.with_attempts_and_timeout(DEFAULT_ATTEMPTS, DEFAULT_STEP_TIMEOUT))
    }

    /// Slack messages when the job succeeds
    #[must_use]
    pub fn on_success(&self, leaf: &LeafTask) -> Option<Step> {
        let notifications: &Notifications = leaf.notifications()?;
        let text = notifications.success_message_or(SUCCESS_MESSAGE);
        let steps = notifications
            .on_success
            .iter()
            .map(|channel| slack_put(channel, text, "succeeded"))
            .collect();
        Step::parallelize(steps).map(|s| s.with_attempts_and_timeout(DEFAULT_ATTEMPTS, DEFAULT_STEP_TIMEOUT))
    }
}

/// Whether a get in the job of a task starts the job.
///
/// With versioning on, ordinary jobs trigger off the version and only the
/// update job triggers off git and the other triggers. A manual git
/// trigger never starts a job.
#[must_use]
pub fn trigger_flag(resource: &str, is_update: bool, versioned: bool, manual_git: bool) -> bool {
    let is_git = resource == GIT;
    if is_update {
        return !is_git || !manual_git;
    }
    if resource == VERSION {
        true
    } else if is_git {
        !versioned && !manual_git
    } else {
        !versioned
    }
}

fn slack_put(channel: &str, text: &str, status: &str) -> Step {
    Step::put(
        SLACK,
        params([
            ("channel", channel.to_string()),
            ("text", text.to_string()),
            (
                "icon_url",
                format!("https://concourse.halfpipe.io/public/images/favicon-{status}.png"),
            ),
            ("username", "Halfpipe".to_string()),
        ]),
    )
}

/// Image of a task container, with credentials only when both are set
#[must_use]
pub fn image_resource(docker: &Docker) -> ImageResource {
    let (repository, tag) = split_image(&docker.image);
    let mut source = params([("repository", repository), ("tag", tag)]);
    if !docker.username.is_empty() && !docker.password.is_empty() {
        source.insert("username".to_string(), docker.username.clone().into());
        source.insert("password".to_string(), docker.password.clone().into());
    }
    ImageResource {
        kind: "registry-image".to_string(),
        source,
    }
}

fn env<const N: usize>(pairs: [(&str, String); N]) -> TaskEnv {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
