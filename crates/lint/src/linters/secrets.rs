use super::{docs_url, task_position};
use crate::error::LintError;
use crate::linter::Linter;
use crate::result::LintResult;
use halfpipe_core::manifest::{LeafTask, Vars};
use halfpipe_core::{CompilerConfig, Manifest};
use regex::Regex;
use std::sync::LazyLock;

static SECRET_REFERENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\(\([a-zA-Z0-9\-_]+\.[a-zA-Z0-9\-_]+\)\)$").ok());

static EMBEDDED_REFERENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\(\([^)]*\)\)").ok());

/// Whether `value` is exactly one `((map.key))` reference
#[must_use]
pub fn is_secret_reference(value: &str) -> bool {
    SECRET_REFERENCE
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

/// Every `((...))` reference embedded in `value`
#[must_use]
pub fn secret_references(value: &str) -> Vec<&str> {
    EMBEDDED_REFERENCE
        .as_ref()
        .map(|re| re.find_iter(value).map(|m| m.as_str()).collect())
        .unwrap_or_default()
}

/// Secret references in task variables must name a map and a key
#[derive(Debug, Clone)]
pub struct SecretsLinter {
    docs_url: String,
}

impl SecretsLinter {
    /// Linter documented on the configured doc host
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            docs_url: docs_url(config, "concourse/secrets/"),
        }
    }
}

fn lint_vars(vars: &Vars) -> Vec<LintError> {
    vars.iter()
        .flat_map(|(key, value)| {
            secret_references(value)
                .into_iter()
                .filter(|reference| !is_secret_reference(reference))
                .map(move |reference| {
                    LintError::invalid(
                        format!("vars.{key}"),
                        format!("'{reference}' must be of the form '((map_name.key_name))'"),
                    )
                })
        })
        .collect()
}

impl Linter for SecretsLinter {
    fn name(&self) -> &'static str {
        "Secrets"
    }

    fn lint(&self, manifest: &Manifest) -> LintResult {
        let mut result = LintResult::new(self.name(), &self.docs_url);

        for (path, leaf) in manifest.tasks.leaves() {
            let position = task_position(&path);
            result.add_errors(lint_vars(leaf.vars()).into_iter().map(|e| e.at(&position)));

            if let LeafTask::DeployCf(cf) = leaf {
                for (i, pre) in cf.pre_promote.flatten().into_iter().enumerate() {
                    let nested = format!("{position}.pre_promote[{i}]");
                    result.add_errors(lint_vars(pre.vars()).into_iter().map(|e| e.at(&nested)));
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halfpipe_core::manifest::{DeployCf, Run, TaskCommon};
    use halfpipe_core::{Task, TaskList};

    fn run_with_vars(vars: &[(&str, &str)]) -> Task {
        Run {
            common: TaskCommon {
                vars: vars
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                ..TaskCommon::default()
            },
            ..Run::default()
        }
        .into()
    }

    #[test]
    fn test_secret_reference_shape() {
        assert!(is_secret_reference("((gitcrypt.key))"));
        assert!(is_secret_reference("((my-map.some_key))"));
        assert!(!is_secret_reference("((gitcrypt))"));
        assert!(!is_secret_reference("CLEARTEXTKEY_BADASS"));
        assert!(!is_secret_reference("((a.b.c))"));
    }

    #[test]
    fn test_embedded_references() {
        assert_eq!(
            secret_references("user=((db.user)) pass=((secret))"),
            vec!["((db.user))", "((secret))"]
        );
        assert!(secret_references("plain").is_empty());
    }

    #[test]
    fn test_bad_reference_in_vars_is_located() {
        let manifest = Manifest {
            tasks: TaskList::from(vec![
                run_with_vars(&[("OK", "((map.key))"), ("PLAIN", "value")]),
                run_with_vars(&[("BAD", "prefix-((nokey))")]),
            ]),
            ..Manifest::default()
        };

        let result = SecretsLinter::new(&CompilerConfig::default()).lint(&manifest);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].position(), Some("tasks[1]"));
        assert!(result.errors[0].is_invalid("vars.BAD"));
    }

    #[test]
    fn test_pre_promote_vars_are_checked() {
        let manifest = Manifest {
            tasks: TaskList::from(vec![
                DeployCf {
                    pre_promote: TaskList::from(vec![run_with_vars(&[("X", "((x))")])]),
                    ..DeployCf::default()
                }
                .into(),
            ]),
            ..Manifest::default()
        };

        let result = SecretsLinter::new(&CompilerConfig::default()).lint(&manifest);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].position(), Some("tasks[0].pre_promote[0]"));
    }
}
