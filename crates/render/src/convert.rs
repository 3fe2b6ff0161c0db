//! Task kinds that render as a script in a container
//!
//! docker-compose, consumer integration tests and the MarkLogic deploys have
//! no dedicated job shape in either backend. They are lowered into a
//! [`ScriptTask`]: a [`Run`] with a generated script, an image and extra
//! environment, plus whether the container needs to be privileged.

use halfpipe_core::duration;
use halfpipe_core::manifest::{
    ConsumerIntegrationTest, DeployMlModules, DeployMlZip, Docker, DockerCompose, Run, Vars,
};
use halfpipe_core::{CompilerConfig, LeafTask, Manifest, Platform};

/// Minutes used when a timeout does not parse
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 60;

const GCR_USERNAME: &str = "_json_key";
const GCR_PASSWORD: &str = "((halfpipe-gcr.private_key))";
const GITHUB_KEY: &str = "((halfpipe-github.private_key))";

/// Leading marker of a script that is an inline command, not a file
pub const INLINE: &str = "\\";

/// A leaf lowered to a script run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTask {
    /// The equivalent run task, carrying the original common attributes
    pub run: Run,
    /// The container needs a docker daemon
    pub privileged: bool,
}

impl ScriptTask {
    fn plain(run: Run) -> Self {
        Self {
            run,
            privileged: false,
        }
    }
}

/// Lower `leaf` to a script run, `None` for kinds with their own job shape
#[must_use]
pub fn lower(leaf: &LeafTask, manifest: &Manifest, config: &CompilerConfig) -> Option<ScriptTask> {
    match leaf {
        LeafTask::Run(run) => Some(ScriptTask::plain(run.clone())),
        LeafTask::DockerCompose(compose) => Some(docker_compose(compose, manifest, config)),
        LeafTask::ConsumerIntegrationTest(cit) => {
            Some(consumer_integration_test(cit, manifest, config))
        }
        LeafTask::DeployMlZip(ml) => Some(ScriptTask::plain(deploy_ml_zip(ml, manifest, config))),
        LeafTask::DeployMlModules(ml) => {
            Some(ScriptTask::plain(deploy_ml_modules(ml, manifest, config)))
        }
        LeafTask::DockerPush(_)
        | LeafTask::DeployCf(_)
        | LeafTask::DeployKatee(_)
        | LeafTask::Update(_) => None,
    }
}

fn gcr_image(config: &CompilerConfig, name: &str) -> Docker {
    Docker {
        image: config.registry_image(name),
        username: GCR_USERNAME.to_string(),
        password: GCR_PASSWORD.to_string(),
    }
}

/// Script running one docker-compose service
#[must_use]
pub fn docker_compose_script(compose: &DockerCompose, platform: Platform, config: &CompilerConfig) -> String {
    let mut env: Vec<String> = ["BUILD_VERSION", "GIT_REVISION"]
        .iter()
        .map(ToString::to_string)
        .collect();
    if platform.is_actions() {
        env.extend(["GITHUB_RUN_NUMBER".to_string(), "GITHUB_SHA".to_string()]);
    }
    env.extend(
        compose
            .common
            .vars
            .keys()
            .filter(|key| key.as_str() != "GCR_PRIVATE_KEY")
            .cloned(),
    );
    env.sort();

    let mut command = vec![
        "docker-compose".to_string(),
        format!("-f {}", compose.compose_file),
        "run".to_string(),
    ];
    command.extend(env.iter().map(|key| format!("-e {key}")));
    command.push(compose.service.clone());
    if !compose.command.is_empty() {
        command.push(compose.command.clone());
    }

    format!(
        "docker login -u {GCR_USERNAME} -p \"$GCR_PRIVATE_KEY\" https://{}\n{}\n",
        config.registry_host(),
        command.join(" \\\n  ")
    )
}

fn docker_compose(compose: &DockerCompose, manifest: &Manifest, config: &CompilerConfig) -> ScriptTask {
    let mut common = compose.common.clone();
    common.name = LeafTask::DockerCompose(compose.clone()).name();
    common
        .vars
        .insert("GCR_PRIVATE_KEY".to_string(), GCR_PASSWORD.to_string());

    ScriptTask {
        run: Run {
            common,
            script: format!("{INLINE}{}", docker_compose_script(compose, manifest.platform, config)),
            docker: gcr_image(config, "halfpipe-docker-compose:stable"),
        },
        privileged: true,
    }
}

/// Split `repo/path/in/repo` into the consumer repository and its subpath
fn split_consumer(consumer: &str) -> (&str, &str) {
    consumer.split_once('/').unwrap_or((consumer, ""))
}

const CONSUMER_SCRIPT: &str = r#"echo "$CONSUMER_GIT_KEY" > .gitkey
chmod 600 .gitkey
set -ex

REVISION=$(curl -fsSL "$CONSUMER_HOST/internal/version" | jq -r '.revision' || echo "")
if [ "$REVISION" = "" ]; then
  echo "Could not get the version of the consumer from $CONSUMER_HOST/internal/version, using HEAD"
  REVISION=HEAD
fi

GIT_SSH_COMMAND="ssh -o StrictHostKeychecking=no -i .gitkey" git clone $GIT_CLONE_OPTIONS $CONSUMER_GIT_URI ../consumer-repo
cd ../consumer-repo/$CONSUMER_PATH
git checkout $REVISION

docker login -u _json_key -p "$GCR_PRIVATE_KEY" https://$DOCKER_REGISTRY_HOST
docker-compose run --no-deps \
  --entrypoint "$CONSUMER_SCRIPT" \
  -e DEPENDENCY_NAME=$PROVIDER_NAME \
  -e PROVIDER_HOST \
  -e USE_COVENANT \
  $DOCKER_COMPOSE_SERVICE
"#;

fn consumer_integration_test(
    cit: &ConsumerIntegrationTest,
    manifest: &Manifest,
    config: &CompilerConfig,
) -> ScriptTask {
    let (repo, path) = split_consumer(&cit.consumer);
    let mut common = cit.common.clone();
    common.name = LeafTask::ConsumerIntegrationTest(cit.clone()).name();

    let env: Vars = [
        ("CONSUMER_GIT_URI", format!("git@github.com:springernature/{repo}")),
        ("CONSUMER_PATH", path.to_string()),
        ("CONSUMER_SCRIPT", cit.script.clone()),
        ("CONSUMER_GIT_KEY", GITHUB_KEY.to_string()),
        ("CONSUMER_HOST", cit.consumer_host.clone()),
        ("PROVIDER_NAME", manifest.pipeline.clone()),
        ("PROVIDER_HOST", cit.provider_host.clone()),
        ("DOCKER_COMPOSE_SERVICE", cit.docker_compose_service.clone()),
        ("GIT_CLONE_OPTIONS", cit.git_clone_options.clone()),
        ("USE_COVENANT", cit.use_covenant.to_string()),
        ("GCR_PRIVATE_KEY", GCR_PASSWORD.to_string()),
        ("DOCKER_REGISTRY_HOST", config.registry_host().to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    common.vars.extend(env);

    ScriptTask {
        run: Run {
            common,
            script: format!("{INLINE}{CONSUMER_SCRIPT}"),
            docker: gcr_image(config, "halfpipe-docker-compose:stable"),
        },
        privileged: true,
    }
}

fn marklogic_vars(app_name: &str, app_version: &str, targets: &[String], use_build_version: bool, manifest: &Manifest) -> Vars {
    let app_name = if app_name.is_empty() {
        manifest.pipeline.as_str()
    } else {
        app_name
    };
    [
        ("APP_NAME", app_name.to_string()),
        ("APP_VERSION", app_version.to_string()),
        ("MARKLOGIC_HOST", targets.join(",")),
        ("MARKLOGIC_USERNAME", "((halfpipe-ml-deploy.username))".to_string()),
        ("MARKLOGIC_PASSWORD", "((halfpipe-ml-deploy.password))".to_string()),
        ("USE_BUILD_VERSION", use_build_version.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn deploy_ml_zip(ml: &DeployMlZip, manifest: &Manifest, config: &CompilerConfig) -> Run {
    let mut common = ml.common.clone();
    common.name = LeafTask::DeployMlZip(ml.clone()).name();
    common.vars.extend(marklogic_vars(
        &ml.app_name,
        &ml.app_version,
        &ml.targets,
        ml.use_build_version,
        manifest,
    ));
    common
        .vars
        .insert("DEPLOY_ZIP".to_string(), ml.deploy_zip.clone());

    Run {
        common,
        script: "/ml-deploy/deploy-local-zip".to_string(),
        docker: gcr_image(config, "halfpipe-ml-deploy"),
    }
}

fn deploy_ml_modules(ml: &DeployMlModules, manifest: &Manifest, config: &CompilerConfig) -> Run {
    let mut common = ml.common.clone();
    common.name = LeafTask::DeployMlModules(ml.clone()).name();
    common.vars.extend(marklogic_vars(
        &ml.app_name,
        &ml.app_version,
        &ml.targets,
        ml.use_build_version,
        manifest,
    ));
    common
        .vars
        .insert("ML_MODULES_VERSION".to_string(), ml.ml_modules_version.clone());
    for key in ["ARTIFACTORY_URL", "ARTIFACTORY_USERNAME", "ARTIFACTORY_PASSWORD"] {
        let secret = format!("((artifactory.{}))", key.trim_start_matches("ARTIFACTORY_").to_lowercase());
        common.vars.entry(key.to_string()).or_insert(secret);
    }

    Run {
        common,
        script: "/ml-deploy/deploy-ml-modules".to_string(),
        docker: gcr_image(config, "halfpipe-ml-deploy"),
    }
}

/// Command that runs a task script.
///
/// Inline commands lose their leading `\`; paths without a leading
/// `./`, `../` or `/` are made relative to the working directory.
#[must_use]
pub fn script_command(script: &str) -> String {
    if let Some(inline) = script.strip_prefix(INLINE) {
        return inline.to_string();
    }
    if script.starts_with("./") || script.starts_with("../") || script.starts_with('/') {
        script.to_string()
    } else {
        format!("./{script}")
    }
}

/// Join path segments the way a POSIX shell would resolve them lexically.
///
/// Empty segments and `.` are dropped; `..` cancels the previous segment
/// unless there is none to cancel.
#[must_use]
pub fn join_path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parts: Vec<String> = Vec::new();
    for segment in segments {
        for part in segment.as_ref().split('/') {
            match part {
                "" | "." => {}
                ".." if parts.last().is_some_and(|last| last != "..") => {
                    parts.pop();
                }
                other => parts.push(other.to_string()),
            }
        }
    }
    parts.join("/")
}

/// Split an image reference into repository and tag, `latest` when untagged.
///
/// A `:` before the last `/` belongs to a registry port, not a tag.
#[must_use]
pub fn split_image(image: &str) -> (&str, &str) {
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].rfind(':') {
        Some(i) => (&image[..name_start + i], &image[name_start + i + 1..]),
        None => (image, "latest"),
    }
}

/// Whole minutes of a timeout, [`DEFAULT_TIMEOUT_MINUTES`] if it does not parse
#[must_use]
pub fn timeout_minutes(timeout: &str) -> u64 {
    duration::minutes(timeout).unwrap_or(DEFAULT_TIMEOUT_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use halfpipe_core::manifest::TaskCommon;

    fn compose() -> DockerCompose {
        DockerCompose {
            common: TaskCommon {
                vars: [("A".to_string(), "a".to_string()), ("GCR_PRIVATE_KEY".to_string(), "k".to_string())]
                    .into_iter()
                    .collect(),
                ..TaskCommon::default()
            },
            ..DockerCompose::default()
        }
    }

    #[test]
    fn test_split_image() {
        assert_eq!(split_image("alpine"), ("alpine", "latest"));
        assert_eq!(split_image("golang:1.22"), ("golang", "1.22"));
        assert_eq!(split_image("eu.gcr.io/halfpipe-io/app:v1"), ("eu.gcr.io/halfpipe-io/app", "v1"));
        assert_eq!(split_image("localhost:5000/app"), ("localhost:5000/app", "latest"));
        assert_eq!(split_image("localhost:5000/app:2"), ("localhost:5000/app", "2"));
    }

    #[test]
    fn test_script_command() {
        assert_eq!(script_command("build.sh"), "./build.sh");
        assert_eq!(script_command("./build.sh arg"), "./build.sh arg");
        assert_eq!(script_command("../ci/build.sh"), "../ci/build.sh");
        assert_eq!(script_command("/bin/build"), "/bin/build");
        assert_eq!(script_command("\\make test"), "make test");
    }

    #[test]
    fn test_timeout_minutes() {
        assert_eq!(timeout_minutes("1h"), 60);
        assert_eq!(timeout_minutes("90m"), 90);
        assert_eq!(timeout_minutes("not a duration"), DEFAULT_TIMEOUT_MINUTES);
    }

    #[test]
    fn test_docker_compose_script() {
        let config = CompilerConfig::default();
        let script = docker_compose_script(&compose(), Platform::Concourse, &config);
        assert!(script.starts_with("docker login -u _json_key -p \"$GCR_PRIVATE_KEY\" https://eu.gcr.io\n"));
        assert!(script.contains("-f docker-compose.yml"));
        assert!(script.contains("-e A"));
        assert!(script.contains("-e BUILD_VERSION"));
        assert!(!script.contains("-e GCR_PRIVATE_KEY"));
        assert!(!script.contains("GITHUB_SHA"));
        assert!(script.trim_end().ends_with("app"));

        let actions = docker_compose_script(&compose(), Platform::Actions, &config);
        assert!(actions.contains("-e GITHUB_SHA"));

        let own_registry = CompilerConfig::default().with_docker_registry("registry.example.com/ci/");
        let script = docker_compose_script(&compose(), Platform::Concourse, &own_registry);
        assert!(script.lines().next().is_some_and(|l| l.ends_with("https://registry.example.com")));
    }

    #[test]
    fn test_lower_docker_compose() {
        let manifest = Manifest::default();
        let lowered = lower(
            &LeafTask::DockerCompose(compose()),
            &manifest,
            &CompilerConfig::default(),
        )
        .unwrap();

        assert!(lowered.privileged);
        assert!(script_command(&lowered.run.script).starts_with("docker login"));
        assert_eq!(lowered.run.common.name, "docker-compose");
        assert_eq!(
            lowered.run.docker.image,
            "eu.gcr.io/halfpipe-io/halfpipe-docker-compose:stable"
        );
        assert_eq!(lowered.run.common.vars["GCR_PRIVATE_KEY"], GCR_PASSWORD);
    }

    #[test]
    fn test_lower_consumer_integration_test() {
        let manifest = Manifest {
            pipeline: "provider".to_string(),
            ..Manifest::default()
        };
        let cit = ConsumerIntegrationTest {
            consumer: "consumer-repo/sub/dir".to_string(),
            consumer_host: "consumer.example.com".to_string(),
            script: "ci/run-cdcs".to_string(),
            ..ConsumerIntegrationTest::default()
        };
        let lowered = lower(
            &LeafTask::ConsumerIntegrationTest(cit),
            &manifest,
            &CompilerConfig::default(),
        )
        .unwrap();

        let vars = &lowered.run.common.vars;
        assert_eq!(vars["CONSUMER_GIT_URI"], "git@github.com:springernature/consumer-repo");
        assert_eq!(vars["CONSUMER_PATH"], "sub/dir");
        assert_eq!(vars["PROVIDER_NAME"], "provider");
        assert_eq!(vars["DOCKER_COMPOSE_SERVICE"], "code");
        assert_eq!(vars["DOCKER_REGISTRY_HOST"], "eu.gcr.io");
        assert!(lowered.run.script.contains("https://$DOCKER_REGISTRY_HOST"));
        assert!(lowered.privileged);
    }

    #[test]
    fn test_lower_deploy_ml() {
        let manifest = Manifest {
            pipeline: "ml-app".to_string(),
            ..Manifest::default()
        };
        let zip = DeployMlZip {
            deploy_zip: "target/xquery.zip".to_string(),
            targets: vec!["ml1".to_string(), "ml2".to_string()],
            ..DeployMlZip::default()
        };
        let lowered = lower(&LeafTask::DeployMlZip(zip), &manifest, &CompilerConfig::default()).unwrap();

        assert_eq!(lowered.run.script, "/ml-deploy/deploy-local-zip");
        assert_eq!(lowered.run.common.vars["MARKLOGIC_HOST"], "ml1,ml2");
        assert_eq!(lowered.run.common.vars["APP_NAME"], "ml-app");
        assert!(!lowered.privileged);

        let modules = DeployMlModules {
            ml_modules_version: "2.1".to_string(),
            ..DeployMlModules::default()
        };
        let lowered =
            lower(&LeafTask::DeployMlModules(modules), &manifest, &CompilerConfig::default()).unwrap();
        assert_eq!(lowered.run.common.vars["ML_MODULES_VERSION"], "2.1");
        assert_eq!(lowered.run.common.vars["ARTIFACTORY_URL"], "((artifactory.url))");
    }

    #[test]
    fn test_kinds_with_own_jobs_are_not_lowered() {
        let manifest = Manifest::default();
        let config = CompilerConfig::default();
        assert!(lower(&LeafTask::Update(Default::default()), &manifest, &config).is_none());
        assert!(lower(&LeafTask::DockerPush(Default::default()), &manifest, &config).is_none());
    }
}
