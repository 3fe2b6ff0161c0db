//! Docker push jobs
//!
//! The image is built once with buildx and pushed under the git revision to
//! a cache repository. After a non-blocking vulnerability scan it is
//! published under every tag in the tag list.

use crate::jobs::{GIT_DIR, image_resource};
use crate::paths;
use crate::resources::{ARTIFACTS, VERSION, gcr_source};
use crate::schema::{ImageResource, Step, TaskConfig, TaskEnv, TaskIo, TaskRun, TaskStep};
use halfpipe_core::manifest::{Docker, DockerPush};
use halfpipe_core::{CompilerConfig, LeafTask, Manifest};
use halfpipe_render::convert::split_image;

/// Build context holding the repository and restored artifacts
pub const DOCKER_BUILD_DIR: &str = "docker_build";
/// Output of the tag list task
pub const TAG_LIST_DIR: &str = "tagList";

const TAG_LIST_FILE: &str = "tagList/tagList";
const DOCKER_CONFIG: &str = "((halfpipe-gcr.docker_config))";

/// Steps of a docker push job after the initial plan
#[must_use]
pub fn steps(push: &DockerPush, manifest: &Manifest, config: &CompilerConfig) -> Vec<Step> {
    let leaf = LeafTask::DockerPush(push.clone());
    let wrap = |step: Step| step.with_attempts_and_timeout(leaf.attempts(), leaf.timeout());
    let base_path = manifest.base_path();

    let mut steps = Vec::new();
    if push.common.restore_artifacts {
        steps.push(wrap(copy_to_build_dir()));
    }
    steps.push(wrap(create_tag_list(manifest.feature_toggles.update_pipeline())));

    let full_base_path = if push.common.restore_artifacts {
        paths::join([DOCKER_BUILD_DIR, base_path])
    } else {
        paths::join([GIT_DIR, base_path])
    };
    let reads_artifacts = leaf.reads_from_artifacts();

    steps.push(wrap(build(push, config, &full_base_path, reads_artifacts)));
    steps.push(wrap(trivy(push, config, &full_base_path, base_path, reads_artifacts)));
    steps.push(wrap(publish(push, config, &full_base_path)));
    steps
}

/// Repository the image is pushed to before it is scanned
#[must_use]
pub fn cache_image(image: &str, config: &CompilerConfig) -> String {
    let (repository, _) = split_image(image);
    let name = repository
        .strip_prefix(config.docker_registry.as_str())
        .unwrap_or(repository);
    config.registry_image(&format!("cache/{name}"))
}

fn alpine() -> Docker {
    Docker {
        image: "alpine".to_string(),
        ..Docker::default()
    }
}

fn shell(lines: &[String], dir: Option<String>) -> TaskRun {
    TaskRun {
        path: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), lines.join("\n")],
        dir,
    }
}

fn copy_to_build_dir() -> Step {
    let mut config = TaskConfig::linux(
        image_resource(&alpine()),
        shell(
            &[
                format!("cp -r {GIT_DIR}/. {DOCKER_BUILD_DIR}"),
                format!("cp -r {ARTIFACTS}/. {DOCKER_BUILD_DIR}"),
            ],
            None,
        ),
    );
    config.inputs = vec![TaskIo::named(GIT_DIR), TaskIo::named(ARTIFACTS)];
    config.outputs = vec![TaskIo::named(DOCKER_BUILD_DIR)];

    Step::task(TaskStep {
        task: "copying-git-repo-and-artifacts-to-a-temporary-build-dir".to_string(),
        privileged: false,
        config,
    })
}

fn create_tag_list(versioned: bool) -> Step {
    let git_ref = format!("{GIT_DIR}/.git/ref");
    let version = format!("{VERSION}/version");
    let mut config = TaskConfig::linux(
        image_resource(&alpine()),
        shell(
            &[
                format!("GIT_REF=`[ -f {git_ref} ] && cat {git_ref} || true`"),
                format!("VERSION=`[ -f {version} ] && cat {version} || true`"),
                format!("printf \"%s %s latest\" \"$GIT_REF\" \"$VERSION\" > {TAG_LIST_FILE}"),
                format!("printf \"Image will be tagged with: %s\\n\" $(cat {TAG_LIST_FILE})"),
            ],
            None,
        ),
    );
    config.inputs.push(TaskIo::named(GIT_DIR));
    if versioned {
        config.inputs.push(TaskIo::named(VERSION));
    }
    config.outputs.push(TaskIo::named(TAG_LIST_DIR));

    Step::task(TaskStep {
        task: "create-tag-list".to_string(),
        privileged: false,
        config,
    })
}

fn buildx_image(config: &CompilerConfig) -> ImageResource {
    ImageResource {
        kind: "registry-image".to_string(),
        source: gcr_source(config, "halfpipe-buildx", "latest"),
    }
}

fn build_params(push: &DockerPush, full_base_path: &str) -> TaskEnv {
    let mut params = TaskEnv::new();
    params.insert(
        "CONTEXT".to_string(),
        paths::join([full_base_path, push.build_path.as_str()]),
    );
    params.insert(
        "DOCKERFILE".to_string(),
        paths::join([full_base_path, push.dockerfile_path.as_str()]),
    );
    params.insert("DOCKER_CONFIG_JSON".to_string(), DOCKER_CONFIG.to_string());
    for (key, value) in &push.common.vars {
        params.insert(format!("BUILD_ARG_{key}"), value.clone());
    }
    params
}

/// `docker buildx build` command pushing to the cache repository
#[must_use]
pub fn build_command(push: &DockerPush, config: &CompilerConfig) -> String {
    let cache = cache_image(&push.image, config);
    let build_cache = format!("{cache}:buildcache");

    let mut tags = vec![format!("-t {cache}:$(cat git/.git/ref)")];
    if push.use_cache {
        tags.push(format!("-t {build_cache}"));
    }

    let mut command = format!(
        "docker buildx build -f $DOCKERFILE --platform {} {} --push --provenance=false",
        push.platforms.join(","),
        tags.join(" ")
    );
    if push.use_cache {
        command.push_str(&format!(
            " --cache-from=type=registry,ref={build_cache} --cache-to=type=inline"
        ));
    }
    command.push_str(" $CONTEXT");
    command
}

fn build(push: &DockerPush, config: &CompilerConfig, full_base_path: &str, reads_artifacts: bool) -> Step {
    let mut task = TaskConfig::linux(
        buildx_image(config),
        shell(
            &[
                "echo $DOCKER_CONFIG_JSON > ~/.docker/config.json".to_string(),
                build_command(push, config),
            ],
            None,
        ),
    );
    task.params = build_params(push, full_base_path);
    task.inputs = vec![TaskIo::named(GIT_DIR), TaskIo::named(TAG_LIST_DIR)];
    if reads_artifacts {
        task.inputs.push(TaskIo::named(DOCKER_BUILD_DIR));
    }

    Step::task(TaskStep {
        task: "build".to_string(),
        privileged: true,
        config: task,
    })
}

fn trivy(
    push: &DockerPush,
    config: &CompilerConfig,
    full_base_path: &str,
    base_path: &str,
    reads_artifacts: bool,
) -> Step {
    let image = format!(
        "{}:$(cat {})",
        cache_image(&push.image, config),
        paths::git_ref(base_path)
    );
    let mut task = TaskConfig::linux(
        image_resource(&Docker {
            image: "aquasec/trivy".to_string(),
            ..Docker::default()
        }),
        shell(
            &[
                "[ -f .trivyignore ] && echo \"Ignoring the following CVE's due to .trivyignore\" || true".to_string(),
                "[ -f .trivyignore ] && cat .trivyignore; echo || true".to_string(),
                format!(
                    "trivy image --timeout {}m --ignore-unfixed --severity CRITICAL --scanners vuln --exit-code 0 {image} || true",
                    push.scan_timeout
                ),
            ],
            Some(full_base_path.to_string()),
        ),
    );
    task.params
        .insert("DOCKER_CONFIG_JSON".to_string(), DOCKER_CONFIG.to_string());
    task.inputs.push(TaskIo::named(GIT_DIR));
    if reads_artifacts {
        task.inputs.push(TaskIo::named(DOCKER_BUILD_DIR));
    }

    Step::task(TaskStep {
        task: "trivy".to_string(),
        privileged: false,
        config: task,
    })
}

fn publish(push: &DockerPush, config: &CompilerConfig, full_base_path: &str) -> Step {
    let (repository, tag) = split_image(&push.image);
    let cache = cache_image(&push.image, config);
    let mut task = TaskConfig::linux(
        buildx_image(config),
        shell(
            &[
                "echo $DOCKER_CONFIG_JSON > ~/.docker/config.json".to_string(),
                format!(
                    "for tag in $(cat {TAG_LIST_FILE}) {tag}; do docker buildx imagetools create {cache}:$(cat git/.git/ref) --tag {repository}:$tag; done"
                ),
            ],
            None,
        ),
    );
    task.params = build_params(push, full_base_path);
    task.inputs = vec![TaskIo::named(GIT_DIR), TaskIo::named(TAG_LIST_DIR)];

    Step::task(TaskStep {
        task: "publish-final-image".to_string(),
        privileged: true,
        config: task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StepKind;
    use halfpipe_core::manifest::TaskCommon;
    use halfpipe_core::FeatureToggles;

    fn push() -> DockerPush {
        DockerPush {
            image: "eu.gcr.io/halfpipe-io/team/app".to_string(),
            ..DockerPush::default()
        }
    }

    fn task_names(steps: &[Step]) -> Vec<&str> {
        steps.iter().filter_map(Step::name).collect()
    }

    #[test]
    fn test_cache_image() {
        let config = CompilerConfig::default();
        assert_eq!(
            cache_image("eu.gcr.io/halfpipe-io/team/app:1.0", &config),
            "eu.gcr.io/halfpipe-io/cache/team/app"
        );
        assert_eq!(
            cache_image("docker.io/library/nginx", &config),
            "eu.gcr.io/halfpipe-io/cache/docker.io/library/nginx"
        );
    }

    #[test]
    fn test_steps_without_restore() {
        let steps = steps(&push(), &Manifest::default(), &CompilerConfig::default());
        assert_eq!(
            task_names(&steps),
            vec!["create-tag-list", "build", "trivy", "publish-final-image"]
        );
        assert!(steps.iter().all(|s| s.timeout.as_deref() == Some("1h")));
    }

    #[test]
    fn test_steps_with_restore_use_build_dir() {
        let mut task = push();
        task.common = TaskCommon {
            restore_artifacts: true,
            ..TaskCommon::default()
        };
        task.build_path = "app".to_string();
        let manifest = Manifest {
            feature_toggles: FeatureToggles::new([FeatureToggles::UPDATE_PIPELINE]),
            ..Manifest::default()
        };

        let steps = steps(&task, &manifest, &CompilerConfig::default());
        assert_eq!(
            steps[0].name(),
            Some("copying-git-repo-and-artifacts-to-a-temporary-build-dir")
        );

        let StepKind::Task(tag_list) = &steps[1].kind else {
            panic!("expected task");
        };
        assert_eq!(tag_list.config.input_names(), vec!["git", "version"]);

        let StepKind::Task(build) = &steps[2].kind else {
            panic!("expected task");
        };
        assert!(build.privileged);
        assert_eq!(build.config.params["CONTEXT"], "docker_build/app");
        assert_eq!(build.config.params["DOCKERFILE"], "docker_build/Dockerfile");
        assert!(build.config.input_names().contains(&DOCKER_BUILD_DIR));
    }

    #[test]
    fn test_build_command() {
        let mut task = push();
        task.platforms = vec!["linux/amd64".to_string(), "linux/arm64".to_string()];
        task.use_cache = true;

        let command = build_command(&task, &CompilerConfig::default());
        assert!(command.starts_with(
            "docker buildx build -f $DOCKERFILE --platform linux/amd64,linux/arm64 -t eu.gcr.io/halfpipe-io/cache/team/app:$(cat git/.git/ref) -t eu.gcr.io/halfpipe-io/cache/team/app:buildcache --push"
        ));
        assert!(command.contains("--cache-from=type=registry,ref=eu.gcr.io/halfpipe-io/cache/team/app:buildcache"));
        assert!(command.ends_with(" $CONTEXT"));
    }

    #[test]
    fn test_trivy_never_fails() {
        let step = trivy(&push(), &CompilerConfig::default(), "git", "", false);
        let StepKind::Task(task) = &step.kind else {
            panic!("expected task");
        };
        let script = &task.config.run.args[1];
        assert!(script.contains("--exit-code 0"));
        assert!(script.trim_end().ends_with("|| true"));
        assert_eq!(task.config.run.dir.as_deref(), Some("git"));
    }
}
