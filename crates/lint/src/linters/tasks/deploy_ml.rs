use crate::error::LintError;
use crate::linters::Findings;
use halfpipe_core::manifest::{DeployMlModules, DeployMlZip};

fn lint_targets(targets: &[String], errors: &mut Vec<LintError>) {
    if targets.is_empty() {
        errors.push(LintError::missing("targets"));
    }
}

/// MarkLogic zip deployments
#[must_use]
pub fn lint_deploy_ml_zip(task: &DeployMlZip) -> Findings {
    let mut errors = Vec::new();
    if task.deploy_zip.is_empty() {
        errors.push(LintError::missing("deploy_zip"));
    }
    if task.app_name.is_empty() {
        errors.push(LintError::missing("app_name"));
    }
    lint_targets(&task.targets, &mut errors);
    (errors, Vec::new())
}

/// MarkLogic module deployments
#[must_use]
pub fn lint_deploy_ml_modules(task: &DeployMlModules) -> Findings {
    let mut errors = Vec::new();
    if task.ml_modules_version.is_empty() {
        errors.push(LintError::missing("ml_modules_version"));
    }
    if task.app_name.is_empty() {
        errors.push(LintError::missing("app_name"));
    }
    lint_targets(&task.targets, &mut errors);
    (errors, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_required_fields() {
        let (errors, _) = lint_deploy_ml_zip(&DeployMlZip::default());
        assert_eq!(
            errors,
            vec![
                LintError::missing("deploy_zip"),
                LintError::missing("app_name"),
                LintError::missing("targets"),
            ]
        );
    }

    #[test]
    fn test_modules_valid() {
        let task = DeployMlModules {
            ml_modules_version: "2.1425".to_string(),
            app_name: "my-app".to_string(),
            targets: vec!["ml.dev.example.com".to_string()],
            ..DeployMlModules::default()
        };
        assert!(lint_deploy_ml_modules(&task).0.is_empty());
    }
}
