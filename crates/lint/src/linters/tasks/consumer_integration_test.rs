use crate::error::LintError;
use crate::linters::Findings;
use halfpipe_core::manifest::ConsumerIntegrationTest;

/// Contract tests against a consumer
///
/// Inside a deploy's `pre_promote` the provider host is the candidate app,
/// so it may be left out there.
#[must_use]
pub fn lint_consumer_integration_test(
    task: &ConsumerIntegrationTest,
    in_pre_promote: bool,
) -> Findings {
    let mut errors = Vec::new();

    if task.consumer.is_empty() {
        errors.push(LintError::missing("consumer"));
    }
    if task.consumer_host.is_empty() {
        errors.push(LintError::missing("consumer_host"));
    }
    if task.script.is_empty() {
        errors.push(LintError::missing("script"));
    }
    if task.provider_host.is_empty() && !in_pre_promote {
        errors.push(LintError::missing("provider_host"));
    }

    (errors, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cit() -> ConsumerIntegrationTest {
        ConsumerIntegrationTest {
            consumer: "consumer-app/sub-dir".to_string(),
            consumer_host: "consumer.example.com".to_string(),
            script: "ci/run-external-and-cdcs".to_string(),
            ..ConsumerIntegrationTest::default()
        }
    }

    #[test]
    fn test_provider_host_required_outside_pre_promote() {
        let (errors, _) = lint_consumer_integration_test(&cit(), false);
        assert_eq!(errors, vec![LintError::missing("provider_host")]);

        assert!(lint_consumer_integration_test(&cit(), true).0.is_empty());
    }

    #[test]
    fn test_required_fields() {
        let (errors, _) = lint_consumer_integration_test(&ConsumerIntegrationTest::default(), true);
        assert_eq!(errors.len(), 3);
    }
}
