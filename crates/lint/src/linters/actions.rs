use super::task_position;
use crate::error::LintError;
use crate::linter::Linter;
use crate::result::LintResult;
use halfpipe_core::{LeafTask, Manifest, Trigger};

const BACKEND: &str = "GitHub Actions";

/// Warns about manifest features the GitHub Actions backend ignores
#[derive(Debug, Clone, Default)]
pub struct ActionsLinter;

impl ActionsLinter {
    /// The linter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Linter for ActionsLinter {
    fn name(&self) -> &'static str {
        "GitHub Actions"
    }

    fn lint(&self, manifest: &Manifest) -> LintResult {
        let mut result = LintResult::new(
            self.name(),
            "https://ee.public.springernature.app/rel-eng/github-actions/overview/",
        );
        if !manifest.platform.is_actions() {
            return result;
        }

        for (path, leaf) in manifest.tasks.leaves() {
            let position = task_position(&path);
            let mut unsupported = Vec::new();
            if leaf.is_manual_trigger() {
                unsupported.push("manual_trigger");
            }
            match leaf {
                LeafTask::DeployCf(cf) if cf.rolling => unsupported.push("rolling"),
                LeafTask::ConsumerIntegrationTest(cit) if cit.use_covenant => {
                    unsupported.push("use_covenant");
                }
                _ => {}
            }
            result.add_warnings(
                unsupported
                    .into_iter()
                    .map(|feature| LintError::unsupported(feature, BACKEND).at(&position)),
            );
        }

        for (i, trigger) in manifest.triggers.iter().enumerate() {
            let position = format!("triggers[{i}]");
            let unsupported: Vec<&str> = match trigger {
                Trigger::Git(git) => [
                    (!git.private_key.is_empty()).then_some("private_key"),
                    (!git.uri.is_empty()).then_some("uri"),
                ]
                .into_iter()
                .flatten()
                .collect(),
                Trigger::Pipeline(_) => vec!["pipeline trigger"],
                Trigger::Timer(_) | Trigger::Docker(_) => Vec::new(),
            };
            result.add_warnings(
                unsupported
                    .into_iter()
                    .map(|feature| LintError::unsupported(feature, BACKEND).at(&position)),
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halfpipe_core::manifest::{
        ConsumerIntegrationTest, DeployCf, GitTrigger, PipelineTrigger, Run, TaskCommon,
    };
    use halfpipe_core::{Platform, TaskList, TriggerList};

    fn manifest(platform: Platform) -> Manifest {
        Manifest {
            platform,
            triggers: TriggerList::from(vec![
                Trigger::Git(GitTrigger {
                    uri: "git@github.com:springernature/halfpipe.git".to_string(),
                    private_key: "((github.private_key))".to_string(),
                    ..GitTrigger::default()
                }),
                Trigger::Pipeline(PipelineTrigger::default()),
            ]),
            tasks: TaskList::from(vec![
                Run {
                    common: TaskCommon {
                        manual_trigger: true,
                        ..TaskCommon::default()
                    },
                    ..Run::default()
                }
                .into(),
                DeployCf {
                    rolling: true,
                    ..DeployCf::default()
                }
                .into(),
                ConsumerIntegrationTest {
                    use_covenant: true,
                    ..ConsumerIntegrationTest::default()
                }
                .into(),
            ]),
            ..Manifest::default()
        }
    }

    #[test]
    fn test_concourse_is_not_checked() {
        let result = ActionsLinter::new().lint(&manifest(Platform::Concourse));
        assert!(!result.has_errors());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_unsupported_features_are_warnings() {
        let result = ActionsLinter::new().lint(&manifest(Platform::Actions));
        assert!(!result.has_errors());

        let fields: Vec<_> = result.warnings.iter().filter_map(LintError::field).collect();
        assert_eq!(
            fields,
            vec!["manual_trigger", "rolling", "use_covenant", "private_key", "uri", "pipeline trigger"]
        );
        assert_eq!(result.warnings[1].position(), Some("tasks[1]"));
        assert_eq!(result.warnings[5].position(), Some("triggers[1]"));
    }
}
