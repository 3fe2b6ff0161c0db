//! The standard linters

mod actions;
mod deploy_manifest;
mod feature_toggles;
mod manifest;
mod secrets;
pub mod tasks;
pub mod triggers;

pub use actions::ActionsLinter;
pub use deploy_manifest::DeployManifestLinter;
pub use feature_toggles::FeatureTogglesLinter;
pub use manifest::ManifestLinter;
pub use secrets::{SecretsLinter, is_secret_reference, secret_references};
pub use tasks::TasksLinter;
pub use triggers::TriggersLinter;

use halfpipe_core::CompilerConfig;

/// `(errors, warnings)` produced by a single check
pub type Findings = (Vec<crate::LintError>, Vec<crate::LintError>);

/// Dotted position of a task path, e.g. `tasks[1].tasks[0]`
#[must_use]
pub fn task_position(path: &[usize]) -> String {
    path.iter()
        .map(|i| format!("tasks[{i}]"))
        .collect::<Vec<_>>()
        .join(".")
}

fn docs_url(config: &CompilerConfig, section: &str) -> String {
    format!("https://{}/{}", config.doc_host.trim_end_matches('/'), section)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_position() {
        assert_eq!(task_position(&[2]), "tasks[2]");
        assert_eq!(task_position(&[1, 0, 3]), "tasks[1].tasks[0].tasks[3]");
    }
}
