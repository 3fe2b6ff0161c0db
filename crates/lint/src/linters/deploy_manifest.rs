use super::{docs_url, task_position};
use crate::collaborators::{Application, Collaborators, DeployInventory};
use crate::error::LintError;
use crate::linter::Linter;
use crate::result::LintResult;
use halfpipe_core::manifest::{ARTIFACTS_PREFIX, DeployCf};
use halfpipe_core::{CompilerConfig, LeafTask, Manifest};
use std::sync::Arc;
use tracing::debug;

/// Cross-checks deploy tasks against the CF manifests they deploy
pub struct DeployManifestLinter {
    docs_url: String,
    docker_registry: String,
    docker_api: String,
    inventory: Arc<dyn DeployInventory>,
}

impl DeployManifestLinter {
    /// Linter reading CF manifests through the given collaborators
    #[must_use]
    pub fn new(config: &CompilerConfig, collaborators: &Collaborators) -> Self {
        Self {
            docs_url: docs_url(config, "cf-deployment/"),
            docker_registry: config.docker_registry.clone(),
            docker_api: config.cf_docker_api.clone(),
            inventory: Arc::clone(&collaborators.inventory),
        }
    }

    fn lint_deploy(&self, task: &DeployCf, result: &mut LintResult, position: &str) {
        let path = task.manifest.as_str();
        if path.starts_with(ARTIFACTS_PREFIX) {
            debug!(manifest = path, "skipping CF manifest produced by an earlier task");
            return;
        }

        let applications =
            match self
                .inventory
                .applications(path, &task.vars_files, &task.common.vars)
            {
                Ok(applications) => applications,
                Err(err) => {
                    result.add_error(LintError::deploy_manifest(path, err.message).at(position));
                    return;
                }
            };

        let [app] = applications.as_slice() else {
            result.add_error(
                LintError::deploy_manifest(
                    path,
                    format!(
                        "halfpipe only supports exactly one application per manifest, found {}",
                        applications.len()
                    ),
                )
                .at(position),
            );
            return;
        };

        let (errors, warnings) = self.lint_application(task, app);
        result.add_errors(errors.into_iter().map(|e| e.at(position)));
        result.add_warnings(warnings.into_iter().map(|e| e.at(position)));
    }

    fn lint_application(
        &self,
        task: &DeployCf,
        app: &Application,
    ) -> (Vec<LintError>, Vec<LintError>) {
        let path = task.manifest.as_str();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if app.name.is_empty() {
            errors.push(LintError::deploy_manifest(path, "app name must be set"));
        }

        if app.no_route {
            if !app.routes.is_empty() {
                errors.push(LintError::deploy_manifest(
                    path,
                    "you cannot set both 'no-route: true' and 'routes'",
                ));
            } else if app.health_check_type != "process" {
                errors.push(LintError::deploy_manifest(
                    path,
                    "apps without routes must use 'health-check-type: process'",
                ));
            }
        } else if app.routes.is_empty() {
            errors.push(LintError::deploy_manifest(
                path,
                "app must have at least one route, or set 'no-route: true'",
            ));
        }

        for route in &app.routes {
            if route.starts_with("http://") || route.starts_with("https://") {
                errors.push(LintError::deploy_manifest(
                    path,
                    format!("route '{route}' must not contain a scheme"),
                ));
            }
        }

        if !app.buildpack.is_empty() {
            warnings.push(LintError::deploy_manifest(
                path,
                "'buildpack' is deprecated, use 'buildpacks' instead",
            ));
        }

        if !app.docker_image.is_empty() {
            if !task.deploy_artifact.is_empty() {
                errors.push(LintError::deploy_manifest(
                    path,
                    "You cannot specify both 'deploy_artifact' in the task and 'docker.image' in the CF manifest",
                ));
            } else if task.api != self.docker_api {
                errors.push(LintError::invalid(
                    "api",
                    format!("docker images can only be deployed to '{}'", self.docker_api),
                ));
            } else if !app.docker_image.starts_with(&self.docker_registry) {
                errors.push(LintError::deploy_manifest(
                    path,
                    format!("Image must come from '{}'", self.docker_registry),
                ));
            }
        }

        (errors, warnings)
    }
}

impl Linter for DeployManifestLinter {
    fn name(&self) -> &'static str {
        "CF Manifest"
    }

    fn lint(&self, manifest: &Manifest) -> LintResult {
        let mut result = LintResult::new(self.name(), &self.docs_url);
        for (path, leaf) in manifest.tasks.leaves() {
            if let LeafTask::DeployCf(cf) = leaf {
                self.lint_deploy(cf, &mut result, &task_position(&path));
            }
        }
        result
    }
}

impl std::fmt::Debug for DeployManifestLinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployManifestLinter")
            .field("docs_url", &self.docs_url)
            .field("docker_registry", &self.docker_registry)
            .field("docker_api", &self.docker_api)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryFiles, StaticGit, StaticInventory, collaborators};
    use halfpipe_core::TaskList;

    const SNPAAS: &str = "((cloudfoundry.api-snpaas))";

    fn deploy() -> DeployCf {
        DeployCf {
            api: "((cloudfoundry.api-dev))".to_string(),
            ..DeployCf::default()
        }
    }

    fn app() -> Application {
        Application {
            name: "my-app".to_string(),
            routes: vec!["my-app.example.com".to_string()],
            ..Application::default()
        }
    }

    fn lint_with(inventory: StaticInventory, tasks: Vec<DeployCf>) -> LintResult {
        let linter = DeployManifestLinter::new(
            &CompilerConfig::default(),
            &collaborators(MemoryFiles::new(), StaticGit::default(), inventory),
        );
        linter.lint(&Manifest {
            tasks: tasks.into_iter().map(Into::into).collect::<TaskList>(),
            ..Manifest::default()
        })
    }

    fn lint_app(task: DeployCf, app: Application) -> LintResult {
        lint_with(
            StaticInventory::new().with_manifest(&task.manifest.clone(), vec![app]),
            vec![task],
        )
    }

    #[test]
    fn test_no_deploy_tasks() {
        assert!(!lint_with(StaticInventory::new(), vec![]).has_errors());
    }

    #[test]
    fn test_one_valid_app() {
        let result = lint_app(deploy(), app());
        assert!(!result.has_errors());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_unreadable_manifest() {
        let result = lint_with(
            StaticInventory::new().with_error("manifest.yml", "invalid manifest error"),
            vec![deploy()],
        );
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].to_string().contains("invalid manifest error"));
    }

    #[test]
    fn test_two_apps() {
        let result = lint_with(
            StaticInventory::new().with_manifest("manifest.yml", vec![app(), app()]),
            vec![deploy()],
        );
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(
            result.errors[0].innermost(),
            LintError::DeployManifest { path, .. } if path == "manifest.yml"
        ));
    }

    #[test]
    fn test_two_deploys_with_one_app_each() {
        let other = DeployCf {
            manifest: "other.yml".to_string(),
            ..deploy()
        };
        let result = lint_with(
            StaticInventory::new()
                .with_manifest("manifest.yml", vec![app()])
                .with_manifest("other.yml", vec![app()]),
            vec![deploy(), other],
        );
        assert!(!result.has_errors());
    }

    #[test]
    fn test_app_without_route() {
        let result = lint_app(deploy(), Application { routes: vec![], ..app() });
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].to_string().contains("at least one route"));
    }

    #[test]
    fn test_app_without_name() {
        let result = lint_app(deploy(), Application { name: String::new(), ..app() });
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].to_string().contains("app name"));
    }

    #[test]
    fn test_worker_app_health_check() {
        let worker = Application {
            routes: vec![],
            no_route: true,
            ..app()
        };
        let result = lint_app(deploy(), worker.clone());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].to_string().contains("health-check-type"));

        let process = Application {
            health_check_type: "process".to_string(),
            ..worker
        };
        assert!(!lint_app(deploy(), process).has_errors());
    }

    #[test]
    fn test_no_route_and_routes() {
        let result = lint_app(
            deploy(),
            Application {
                no_route: true,
                health_check_type: "process".to_string(),
                ..app()
            },
        );
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].to_string().contains("both"));
    }

    #[test]
    fn test_manifest_from_artifacts_is_skipped() {
        let from_artifacts = DeployCf {
            manifest: "../artifacts/manifest.yml".to_string(),
            ..deploy()
        };
        let result = lint_with(StaticInventory::new(), vec![from_artifacts]);
        assert!(!result.has_errors());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_buildpack_is_deprecated() {
        let result = lint_app(
            deploy(),
            Application {
                buildpack: "java_buildpack".to_string(),
                ..app()
            },
        );
        assert!(!result.has_errors());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_routes_must_not_have_scheme() {
        let result = lint_app(
            deploy(),
            Application {
                routes: vec![
                    "http://a.example.com".to_string(),
                    "https://b.example.com".to_string(),
                    "c.example.com".to_string(),
                ],
                ..app()
            },
        );
        assert!(!result.has_warnings());
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_docker_image_and_deploy_artifact() {
        let task = DeployCf {
            api: SNPAAS.to_string(),
            deploy_artifact: "target/app.jar".to_string(),
            ..deploy()
        };
        let result = lint_app(
            task,
            Application {
                docker_image: "eu.gcr.io/halfpipe-io/app".to_string(),
                ..app()
            },
        );
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0]
            .to_string()
            .contains("You cannot specify both 'deploy_artifact' in the task"));
    }

    #[test]
    fn test_docker_image_on_other_api() {
        let result = lint_app(
            deploy(),
            Application {
                docker_image: "nginx".to_string(),
                ..app()
            },
        );
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].is_invalid("api"));
    }

    #[test]
    fn test_docker_image_from_elsewhere() {
        let task = DeployCf {
            api: SNPAAS.to_string(),
            ..deploy()
        };
        let result = lint_app(
            task,
            Application {
                docker_image: "nginx".to_string(),
                ..app()
            },
        );
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].to_string().contains("Image must come from"));
    }

    #[test]
    fn test_docker_image_all_good() {
        let task = DeployCf {
            api: SNPAAS.to_string(),
            ..deploy()
        };
        let result = lint_app(
            task,
            Application {
                docker_image: "eu.gcr.io/halfpipe-io/app".to_string(),
                ..app()
            },
        );
        assert!(!result.has_errors());
    }
}
