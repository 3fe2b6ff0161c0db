//! Jobs of a rendered workflow
//!
//! Every leaf task becomes one job running on a hosted runner. A job checks
//! out the repository, restores artifacts when the task reads them, runs the
//! task body and uploads artifacts. Slack notifications come last.
//!
//! Actions has no step level retry, so task attempts are not rendered; only
//! the job timeout is.

use crate::schema::{Env, Job, Step};
use crate::secrets::secret_ref;
use halfpipe_core::manifest::{DeployCf, DeployKatee, Docker, DockerPush, Run, Update};
use halfpipe_core::{CompilerConfig, FeatureToggles, LeafTask, Manifest};
use halfpipe_render::convert::{self, ScriptTask, join_path, script_command, timeout_minutes};
use halfpipe_render::{RenderError, RenderResult};

/// Runner label of every job
pub const RUNNER: &str = "ubuntu-20.04";

/// Name of the artifact uploaded on success
pub const ARTIFACTS: &str = "artifacts";
/// Name of the artifact uploaded on failure
pub const ARTIFACTS_FAILED: &str = "artifacts-failed";
/// Directory restored artifacts land in, relative to the base path
pub const ARTIFACTS_DIR: &str = "../artifacts";

const CHECKOUT: &str = "actions/checkout@v2";
const UPLOAD_ARTIFACT: &str = "actions/upload-artifact@v2";
const DOWNLOAD_ARTIFACT: &str = "actions/download-artifact@v2";
const DOCKER_LOGIN: &str = "docker/login-action@v1";
const SLACK_ACTION: &str = "yukin01/slack-bot-action@v0.0.4";

const SLACK_TOKEN: &str = "${{ secrets.EE_SLACK_TOKEN }}";
const REPO_ACCESS_TOKEN: &str = "${{ secrets.EE_REPO_ACCESS_TOKEN }}";
const GCR_PRIVATE_KEY: &str = "${{ secrets.EE_GCR_PRIVATE_KEY }}";

const BUILD_VERSION: &str = "${{ env.BUILD_VERSION }}";
const GIT_REVISION: &str = "${{ env.GIT_REVISION }}";

const SUCCESS_MESSAGE: &str = "Success! ${{ github.workflow }}/${{ github.job }}\n${{ github.server_url }}/${{ github.repository }}/actions/runs/${{ github.run_id }}";
const FAILURE_MESSAGE: &str = "Failed :( ${{ github.workflow }}/${{ github.job }}\n${{ github.server_url }}/${{ github.repository }}/actions/runs/${{ github.run_id }}";

const MANIFEST_FILE: &str = ".halfpipe.io";

/// Environment shared by every job of a workflow
#[must_use]
pub fn global_env() -> Env {
    [
        ("ARTIFACTORY_PASSWORD", "${{ secrets.EE_ARTIFACTORY_PASSWORD }}"),
        ("ARTIFACTORY_URL", "${{ secrets.EE_ARTIFACTORY_URL }}"),
        ("ARTIFACTORY_USERNAME", "${{ secrets.EE_ARTIFACTORY_USERNAME }}"),
        ("BUILD_VERSION", "2.${{ github.run_number }}.0"),
        ("GCR_PRIVATE_KEY", GCR_PRIVATE_KEY),
        ("GIT_REVISION", "${{ github.sha }}"),
        ("RUNNING_IN_CI", "true"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Job id for a task name: lowercase with everything outside
/// `[a-z0-9_-]` replaced by `_`
#[must_use]
pub fn job_id(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Registry host of an image, `None` for Docker Hub images
#[must_use]
pub fn registry_host(image: &str) -> Option<&str> {
    let (first, rest) = image.split_once('/')?;
    if rest.is_empty() || !(first.contains('.') || first.contains(':') || first == "localhost") {
        return None;
    }
    Some(first)
}

fn secret_env<'v>(vars: impl IntoIterator<Item = (&'v String, &'v String)>) -> Env {
    vars.into_iter()
        .map(|(k, v)| (k.clone(), secret_ref(v)))
        .collect()
}

/// `-c "<cd>; <command>"` arguments for a shell entrypoint
fn shell_args(working_dir: &str, command: &str) -> String {
    let command = command.replace('"', "\\\"");
    if working_dir.is_empty() {
        format!("-c \"{command}\"")
    } else {
        format!("-c \"cd {working_dir}; {command}\"")
    }
}

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

    fn base_path(&self) -> &str {
        self.manifest.base_path()
    }

    /// Path relative to the repository root of `path`, which is relative
    /// to the base path. Parent segments stop at the workspace root, so
    /// `../artifacts` from the root is `artifacts`.
    fn repo_path(&self, path: &str) -> String {
        let joined = join_path([self.base_path(), path]);
        let inside: Vec<&str> = joined
            .split('/')
            .skip_while(|part| *part == "..")
            .filter(|part| !part.is_empty())
            .collect();
        if inside.is_empty() {
            ".".to_string()
        } else {
            inside.join("/")
        }
    }

    /// The complete job of `leaf`, needing the jobs in `needs`
    ///
    /// # Errors
    /// Returns [`RenderError::InvalidIr`] if a deploy task holds a
    /// pre-promote task that cannot run as a script
    pub fn job(&self, leaf: &LeafTask, needs: Vec<String>) -> RenderResult<Job> {
        let mut env = Env::new();
        let mut steps = match leaf {
            LeafTask::DockerPush(push) => {
                env = secret_env(&push.common.vars);
                self.docker_push_steps(push)
            }
            LeafTask::DeployCf(cf) => self.deploy_cf_steps(cf)?,
            LeafTask::DeployKatee(katee) => self.katee_steps(katee),
            LeafTask::Update(update) => self.update_steps(update),
            LeafTask::Run(_)
            | LeafTask::DockerCompose(_)
            | LeafTask::ConsumerIntegrationTest(_)
            | LeafTask::DeployMlZip(_)
            | LeafTask::DeployMlModules(_) => {
                let script = convert::lower(leaf, self.manifest, self.config).ok_or_else(|| {
                    RenderError::invalid_ir(format!("{} cannot be lowered to a script", leaf.kind()))
                })?;
                self.run_steps(&script)
            }
        };
        steps.extend(notify_steps(leaf));

        Ok(Job {
            name: leaf.name(),
            runs_on: RUNNER.to_string(),
            needs,
            timeout_minutes: timeout_minutes(leaf.timeout()),
            env,
            steps,
        })
    }

    /// Checkout plus the artifact restore when `leaf` reads artifacts
    #[must_use]
    pub fn prepare_steps(&self, leaf: &LeafTask) -> Vec<Step> {
        let mut steps = vec![Step::uses(CHECKOUT).with_name("Checkout code")];
        if leaf.reads_from_artifacts() {
            steps.push(self.restore_artifacts());
        }
        steps
    }

    /// Download of the artifacts saved earlier in the run
    #[must_use]
    pub fn restore_artifacts(&self) -> Step {
        Step::uses(DOWNLOAD_ARTIFACT)
            .with_name("Restore artifacts")
            .with_input("name", ARTIFACTS)
            .with_input("path", self.repo_path(ARTIFACTS_DIR))
    }

    fn upload(&self, name: &str, artifacts: &[String]) -> Step {
        let paths: Vec<String> = artifacts.iter().map(|a| self.repo_path(a)).collect();
        Step::uses(UPLOAD_ARTIFACT)
            .with_input("name", name)
            .with_input("path", paths.join("\n"))
    }

    fn save_steps(&self, run: &Run) -> Vec<Step> {
        let mut steps = Vec::new();
        if !run.common.save_artifacts.is_empty() {
            steps.push(
                self.upload(ARTIFACTS, &run.common.save_artifacts)
                    .with_name("Package artifacts"),
            );
        }
        if !run.common.save_artifacts_on_failure.is_empty() {
            steps.push(
                self.upload(ARTIFACTS_FAILED, &run.common.save_artifacts_on_failure)
                    .with_name("Package artifacts (failure)")
                    .with_if("failure()"),
            );
        }
        steps
    }

    /// Checkout, restore, registry login, the script and the uploads
    #[must_use]
    pub fn run_steps(&self, script: &ScriptTask) -> Vec<Step> {
        let run = &script.run;
        let leaf = LeafTask::Run(run.clone());
        let mut steps = self.prepare_steps(&leaf);
        if !script.privileged {
            steps.extend(docker_login(&run.docker));
        }
        steps.push(self.script_step(script));
        steps.extend(self.save_steps(run));
        steps
    }

    /// The step running the script itself.
    ///
    /// Scripts that need a docker daemon, or name no image, run on the
    /// runner; others run in their image.
    #[must_use]
    pub fn script_step(&self, script: &ScriptTask) -> Step {
        let run = &script.run;
        let command = script_command(&run.script);
        let env = secret_env(&run.common.vars);

        let step = if script.privileged || run.docker.image.is_empty() {
            Step::run(command).with_working_directory(self.base_path())
        } else {
            Step::uses(format!("docker://{}", run.docker.image))
                .with_input("entrypoint", "/bin/sh")
                .with_input("args", shell_args(self.base_path(), &command))
        };
        Step {
            env,
            ..step.with_name("run")
        }
    }

    /// Build, scan and publish of a docker image.
    ///
    /// The image is built and loaded on the runner, scanned without failing
    /// the job, then built again from cache for every platform and pushed.
    #[must_use]
    pub fn docker_push_steps(&self, push: &DockerPush) -> Vec<Step> {
        let leaf = LeafTask::DockerPush(push.clone());
        let context = self.repo_path(&push.build_path);
        let file = self.repo_path(&push.dockerfile_path);
        let candidate = format!("{}:{GIT_REVISION}", push.image);

        let mut steps = self.prepare_steps(&leaf);
        steps.push(Step::uses("docker/setup-buildx-action@v1").with_name("Set up Docker Buildx"));

        let mut login = Step::uses(DOCKER_LOGIN).with_name("Login to registry");
        if let Some(registry) = registry_host(&push.image) {
            login = login.with_input("registry", registry);
        }
        steps.push(
            login
                .with_input("username", push.username.as_str())
                .with_input("password", secret_ref(&push.password)),
        );

        let build_args: Vec<String> = push
            .common
            .vars
            .keys()
            .map(|k| format!("{k}=${{{{ env.{k} }}}}"))
            .collect();
        let with_build_args = |mut step: Step| {
            if !build_args.is_empty() {
                step = step.with_input("build-args", build_args.join("\n"));
            }
            step
        };

        steps.push(with_build_args(
            Step::uses("docker/build-push-action@v2")
                .with_name("Build Image")
                .with_input("context", context.as_str())
                .with_input("file", file.as_str())
                .with_input("push", false)
                .with_input("load", true)
                .with_input("tags", candidate.as_str()),
        ));
        steps.push(
            Step::uses("aquasecurity/trivy-action@master")
                .with_name("Run Trivy vulnerability scanner")
                .with_input("image-ref", candidate.as_str())
                .with_input("exit-code", "0")
                .with_input("ignore-unfixed", true)
                .with_input("severity", "CRITICAL,HIGH")
                .with_input("timeout", format!("{}m", push.scan_timeout)),
        );

        let mut publish = Step::uses("docker/build-push-action@v2")
            .with_name("Push Image")
            .with_input("context", context.as_str())
            .with_input("file", file.as_str())
            .with_input("push", true)
            .with_input("platforms", push.platforms.join(","))
            .with_input("tags", tags(push));
        if push.use_cache {
            publish = publish
                .with_input("cache-from", format!("type=registry,ref={}:buildcache", push.image))
                .with_input("cache-to", format!("type=registry,ref={}:buildcache,mode=max", push.image));
        }
        steps.push(with_build_args(publish));

        steps.push(
            Step::uses("peter-evans/repository-dispatch@v1")
                .with_name("Repository dispatch")
                .with_input("token", REPO_ACCESS_TOKEN)
                .with_input("event-type", docker_push_event(&push.image)),
        );
        steps
    }

    fn cf_step(&self, cf: &DeployCf, name: &str, command: &str) -> Step {
        let cli_version = if self.manifest.feature_toggles.contains(FeatureToggles::CF_V7) {
            "cf7"
        } else {
            "cf6"
        };
        let mut env: Env = [
            ("CF_API", secret_ref(&cf.api)),
            ("CF_ORG", secret_ref(&cf.org)),
            ("CF_SPACE", secret_ref(&cf.space)),
            ("CF_USERNAME", secret_ref(&cf.username)),
            ("CF_PASSWORD", secret_ref(&cf.password)),
            ("CF_CLI_VERSION", cli_version.to_string()),
            ("CF_MANIFEST_PATH", self.repo_path(&cf.manifest)),
            ("CF_TIMEOUT", LeafTask::DeployCf(cf.clone()).timeout().to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        if command == "halfpipe-push" {
            let app_path = if cf.deploy_artifact.is_empty() {
                self.repo_path("")
            } else {
                self.repo_path(&cf.deploy_artifact)
            };
            env.insert("CF_APP_PATH".to_string(), app_path);
            if !cf.vars_files.is_empty() {
                let files: Vec<String> = cf.vars_files.iter().map(|f| self.repo_path(f)).collect();
                env.insert("CF_VARS_FILES".to_string(), files.join(","));
            }
            env.extend(secret_env(&cf.common.vars));
        }
        if !cf.test_domain.is_empty() && command != "halfpipe-cleanup" {
            env.insert("CF_TEST_DOMAIN".to_string(), cf.test_domain.clone());
        }

        Step {
            env,
            ..Step::uses(format!("docker://{}", self.config.registry_image("cf-resource-v2:stable")))
                .with_name(name)
                .with_input("args", command)
        }
    }

    /// Candidate push, pre-promote checks, promotion and cleanup of a
    /// Cloud Foundry deploy
    ///
    /// # Errors
    /// Returns [`RenderError::InvalidIr`] for a pre-promote task that is
    /// not a script
    pub fn deploy_cf_steps(&self, cf: &DeployCf) -> RenderResult<Vec<Step>> {
        let leaf = LeafTask::DeployCf(cf.clone());
        let mut steps = self.prepare_steps(&leaf);
        steps.push(self.cf_step(cf, "Push", "halfpipe-push"));

        for check in cf.pre_promote.flatten() {
            let script = convert::lower(check, self.manifest, self.config).ok_or_else(|| {
                RenderError::invalid_ir(format!(
                    "pre_promote: {} cannot run before promotion",
                    check.kind()
                ))
            })?;
            let step = self.script_step(&script);
            steps.push(Step {
                name: Some(check.name()),
                ..step
            });
        }

        steps.push(self.cf_step(cf, "Check", "halfpipe-check"));
        steps.push(self.cf_step(cf, "Promote", "halfpipe-promote"));
        steps.push(self.cf_step(cf, "Cleanup", "halfpipe-cleanup").with_if("always()"));
        Ok(steps)
    }

    /// Deploy to Katee and wait for the deployment to roll out
    #[must_use]
    pub fn katee_steps(&self, katee: &DeployKatee) -> Vec<Step> {
        let leaf = LeafTask::DeployKatee(katee.clone());
        let team = &self.manifest.team;
        let namespace = katee.namespace_or_team(team);
        let image = format!("docker://{}", self.config.registry_image("ee-katee-vela-cli:latest"));
        let tag = if katee.tag == "version" {
            BUILD_VERSION
        } else {
            GIT_REVISION
        };
        let credentials = secret_ref(&format!("(({namespace}-service-account-prod.key))"));

        let mut steps = self.prepare_steps(&leaf);
        steps.push(
            Step::uses(image.as_str())
                .with_name("Deploy to Katee")
                .with_input("entrypoint", "/bin/sh")
                .with_input(
                    "args",
                    shell_args(
                        self.base_path(),
                        "/exe vela up -f $KATEE_APPFILE --publish-version $DOCKER_TAG",
                    ),
                )
                .with_envs([
                    ("BUILD_VERSION", BUILD_VERSION),
                    ("GIT_REVISION", GIT_REVISION),
                    ("DOCKER_TAG", tag),
                ])
                .with_envs([
                    ("KATEE_APPLICATION_IMAGE", format!("{}:{tag}", katee.image)),
                    ("KATEE_APPLICATION_NAME", katee.application_name.clone()),
                    ("KATEE_APPFILE", katee.vela_manifest.clone()),
                    ("KATEE_GKE_CREDENTIALS", credentials.clone()),
                    ("KATEE_TEAM", katee.katee_team(team)),
                ])
                .with_envs(secret_env(&katee.common.vars)),
        );
        steps.push(
            Step::uses(image)
                .with_name("Check Deployment Status")
                .with_input("entrypoint", "/bin/sh")
                .with_input(
                    "args",
                    shell_args(
                        self.base_path(),
                        &format!(
                            "/exe deployment-status {namespace} {} $PUBLISHED_VERSION",
                            katee.application_name
                        ),
                    ),
                )
                .with_envs([
                    ("KATEE_GKE_CREDENTIALS", credentials),
                    ("KATEE_TEAM", katee.katee_team(team)),
                    ("PUBLISHED_VERSION", tag.to_string()),
                    ("CHECK_INTERVAL", katee.check_interval.to_string()),
                    ("MAX_CHECKS", katee.max_checks.to_string()),
                ]),
        );
        steps
    }

    /// Workflow sync with the manifest, plus the optional version tag
    #[must_use]
    pub fn update_steps(&self, update: &Update) -> Vec<Step> {
        let leaf = LeafTask::Update(update.clone());
        let mut steps = self.prepare_steps(&leaf);
        steps.push(
            Step::uses(format!("docker://{}", self.config.registry_image("halfpipe-auto-update")))
                .with_name("Sync workflow with halfpipe manifest")
                .with_id("sync")
                .with_input("entrypoint", "/bin/bash")
                .with_input("args", shell_args(self.base_path(), "update-actions-workflow"))
                .with_env("HALFPIPE_FILE_PATH", self.repo_path(MANIFEST_FILE)),
        );

        if update.tag_repo {
            let tag = format!("{}/v$BUILD_VERSION", self.manifest.pipeline_name());
            steps.push(
                Step::run(format!("git tag -f {tag}\ngit push origin {tag}"))
                    .with_name(format!("Tag commit with {tag}")),
            );
        }
        steps
    }
}

/// Event type dispatched when `image` is pushed
#[must_use]
pub fn docker_push_event(image: &str) -> String {
    format!("docker-push:{image}")
}

/// Tags published for a docker push
#[must_use]
pub fn tags(push: &DockerPush) -> String {
    let tag = if push.tag == "gitref" {
        GIT_REVISION
    } else {
        BUILD_VERSION
    };
    format!("{image}:latest\n{image}:{tag}\n", image = push.image)
}

/// Login to the registry of a private task image
#[must_use]
pub fn docker_login(docker: &Docker) -> Option<Step> {
    if docker.image.is_empty() || docker.username.is_empty() {
        return None;
    }
    let mut step = Step::uses(DOCKER_LOGIN).with_name("Login to registry");
    if let Some(registry) = registry_host(&docker.image) {
        step = step.with_input("registry", registry);
    }
    Some(
        step.with_input("username", docker.username.as_str())
            .with_input("password", secret_ref(&docker.password)),
    )
}

/// Slack messages on failure, then on success
#[must_use]
pub fn notify_steps(leaf: &LeafTask) -> Vec<Step> {
    let Some(notifications) = leaf.notifications() else {
        return Vec::new();
    };

    let slack = |channel: &str, text: &str| {
        Step::uses(SLACK_ACTION)
            .with_input("status", "${{ job.status }}")
            .with_input("oauth_token", SLACK_TOKEN)
            .with_input("channel", channel)
            .with_input("text", text)
    };

    let failure = notifications.failure_message_or(FAILURE_MESSAGE);
    let success = notifications.success_message_or(SUCCESS_MESSAGE);

    let mut steps: Vec<Step> = notifications
        .on_failure
        .iter()
        .map(|channel| {
            slack(channel, failure)
                .with_name(format!("Notify slack {channel} (failure)"))
                .with_if("failure()")
        })
        .collect();
    steps.extend(
        notifications
            .on_success
            .iter()
            .map(|channel| slack(channel, success).with_name(format!("Notify slack {channel} (success)"))),
    );
    steps
}
