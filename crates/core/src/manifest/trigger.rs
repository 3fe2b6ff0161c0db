use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Lowercase `input` and collapse runs of characters outside `[a-z0-9-.]`
/// into single dashes.
#[must_use]
pub fn restrict_identifier(input: &str) -> String {
    let spaced: String = input
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Source repository that drives the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitTrigger {
    /// Clone URI; empty means the origin of the working copy
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri: String,

    /// Branch to track; empty means master/main
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,

    /// SSH deploy key, normally a `((secret))` reference
    #[serde(skip_serializing_if = "String::is_empty")]
    pub private_key: String,

    /// git-crypt key reference
    #[serde(skip_serializing_if = "String::is_empty")]
    pub git_crypt_key: String,

    /// Only changes under these globs trigger
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub watched_paths: Vec<String>,

    /// Changes under these globs never trigger
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_paths: Vec<String>,

    /// Fetch with depth 1
    pub shallow: bool,

    /// Never trigger automatically off new commits
    pub manual_trigger: bool,

    /// Directory of the manifest relative to the git root, discovered at runtime
    #[serde(skip)]
    pub base_path: String,
}

impl GitTrigger {
    /// Branch that is actually tracked
    #[must_use]
    pub fn branch_or_default(&self) -> &str {
        if self.branch.is_empty() {
            "master"
        } else {
            &self.branch
        }
    }
}

/// Time based trigger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerTrigger {
    /// Five field cron expression, evaluated in UTC
    pub cron: String,
}

/// Triggers on new versions of a docker image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerTrigger {
    /// Image reference
    pub image: String,

    /// Registry username
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,

    /// Registry password
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

/// Triggers off a job in another pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineTrigger {
    /// Concourse URL of the upstream pipeline
    #[serde(skip_serializing_if = "String::is_empty")]
    pub concourse_url: String,

    /// Concourse username
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,

    /// Concourse password
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,

    /// Upstream team
    pub team: String,

    /// Upstream pipeline
    pub pipeline: String,

    /// Upstream job
    pub job: String,

    /// Build status that triggers
    pub status: String,
}

impl Default for PipelineTrigger {
    fn default() -> Self {
        Self {
            concourse_url: "((concourse.url))".to_string(),
            username: "((concourse.username))".to_string(),
            password: "((concourse.password))".to_string(),
            team: String::new(),
            pipeline: String::new(),
            job: String::new(),
            status: "succeeded".to_string(),
        }
    }
}

/// A pipeline trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    /// Commits to a git repository
    Git(GitTrigger),
    /// Cron schedule
    Timer(TimerTrigger),
    /// New docker image versions
    Docker(DockerTrigger),
    /// Upstream pipeline job
    Pipeline(PipelineTrigger),
}

impl Trigger {
    /// Resource name used for the trigger in rendered pipelines
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Git(_) => "git".to_string(),
            Self::Timer(_) => "cron".to_string(),
            Self::Docker(_) => "docker-trigger".to_string(),
            Self::Pipeline(p) => {
                restrict_identifier(&format!("{}.{}.{}", p.team, p.pipeline, p.job))
            }
        }
    }

    /// Type tag as written in the manifest
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Git(_) => "git",
            Self::Timer(_) => "timer",
            Self::Docker(_) => "docker",
            Self::Pipeline(_) => "pipeline",
        }
    }
}

/// Ordered triggers of a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerList(pub Vec<Trigger>);

impl From<Vec<Trigger>> for TriggerList {
    fn from(triggers: Vec<Trigger>) -> Self {
        Self(triggers)
    }
}

impl Deref for TriggerList {
    type Target = [Trigger];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a TriggerList {
    type Item = &'a Trigger;
    type IntoIter = std::slice::Iter<'a, Trigger>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl TriggerList {
    /// The first git trigger, if any
    #[must_use]
    pub fn git_trigger(&self) -> Option<&GitTrigger> {
        self.0.iter().find_map(|t| match t {
            Trigger::Git(git) => Some(git),
            _ => None,
        })
    }

    /// Mutable access to the first git trigger
    pub fn git_trigger_mut(&mut self) -> Option<&mut GitTrigger> {
        self.0.iter_mut().find_map(|t| match t {
            Trigger::Git(git) => Some(git),
            _ => None,
        })
    }

    /// Docker triggers in declaration order
    pub fn docker_triggers(&self) -> impl Iterator<Item = &DockerTrigger> {
        self.0.iter().filter_map(|t| match t {
            Trigger::Docker(docker) => Some(docker),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_names() {
        assert_eq!(Trigger::Git(GitTrigger::default()).name(), "git");
        assert_eq!(Trigger::Timer(TimerTrigger::default()).name(), "cron");
        assert_eq!(Trigger::Docker(DockerTrigger::default()).name(), "docker-trigger");

        let upstream = Trigger::Pipeline(PipelineTrigger {
            team: "Team A".to_string(),
            pipeline: "some_pipeline".to_string(),
            job: "deploy to prod".to_string(),
            ..PipelineTrigger::default()
        });
        assert_eq!(upstream.name(), "team-a.some-pipeline.deploy-to-prod");
    }

    #[test]
    fn test_git_trigger_lookup() {
        let triggers = TriggerList::from(vec![
            Trigger::Timer(TimerTrigger::default()),
            Trigger::Git(GitTrigger {
                branch: "develop".to_string(),
                ..GitTrigger::default()
            }),
        ]);
        assert_eq!(triggers.git_trigger().map(|g| g.branch.as_str()), Some("develop"));
        assert!(TriggerList::default().git_trigger().is_none());
    }

    #[test]
    fn test_pipeline_trigger_defaults_from_yaml() {
        let trigger: Trigger =
            serde_yaml::from_str("type: pipeline\nteam: t\npipeline: p\njob: j\n").unwrap();
        let Trigger::Pipeline(p) = trigger else {
            panic!("expected pipeline trigger");
        };
        assert_eq!(p.status, "succeeded");
        assert_eq!(p.concourse_url, "((concourse.url))");
    }
}
