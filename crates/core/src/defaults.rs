//! Defaulting pass
//!
//! A [`Mapper`] is a pure manifest-to-manifest transform. The [`Defaulter`]
//! runs a fixed chain of them between linting and rendering. Mappers take
//! the manifest by reference and build a new tree, so the caller's value is
//! never touched, and applying a mapper to its own output changes nothing.

use crate::manifest::{
    LeafTask, Manifest, Notifications, Parallel, Sequence, Task, TaskList, Update,
};
use tracing::debug;

/// A pure manifest transform
pub trait Mapper: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Produce the transformed manifest
    fn apply(&self, manifest: &Manifest) -> Manifest;
}

/// Fills unset task notifications from the pipeline level Slack defaults.
///
/// - A task whose notifications were never set gets the pipeline channel on
///   failure, and on success too when it sets `notify_on_success`.
/// - A task with author supplied notifications keeps its channels; only
///   blank messages are filled from the pipeline defaults.
/// - Pre-promote tasks of a deploy are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationsMapper;

impl NotificationsMapper {
    fn default_leaf(leaf: &LeafTask, manifest: &Manifest) -> LeafTask {
        let notifications = match leaf.notifications() {
            Some(existing) => {
                let mut filled = existing.clone();
                if filled.on_failure_message.is_empty() {
                    filled.on_failure_message.clone_from(&manifest.slack_failure_message);
                }
                if filled.on_success_message.is_empty() {
                    filled.on_success_message.clone_from(&manifest.slack_success_message);
                }
                Some(filled)
            }
            None => {
                let mut defaulted = Notifications {
                    on_failure_message: manifest.slack_failure_message.clone(),
                    on_success_message: manifest.slack_success_message.clone(),
                    ..Notifications::default()
                };
                if !manifest.slack_channel.is_empty() {
                    defaulted.on_failure = vec![manifest.slack_channel.clone()];
                    if leaf.notifies_on_success() {
                        defaulted.on_success = vec![manifest.slack_channel.clone()];
                    }
                }
                (defaulted != Notifications::default()).then_some(defaulted)
            }
        };
        leaf.clone().with_notifications(notifications)
    }

    fn default_tasks(tasks: &TaskList, manifest: &Manifest) -> TaskList {
        tasks
            .iter()
            .map(|task| match task {
                Task::Leaf(leaf) => Task::Leaf(Self::default_leaf(leaf, manifest)),
                Task::Sequence(s) => Task::Sequence(Sequence {
                    tasks: Self::default_tasks(&s.tasks, manifest),
                }),
                Task::Parallel(p) => Task::Parallel(Parallel {
                    tasks: Self::default_tasks(&p.tasks, manifest),
                }),
            })
            .collect()
    }
}

impl Mapper for NotificationsMapper {
    fn name(&self) -> &'static str {
        "notifications"
    }

    fn apply(&self, manifest: &Manifest) -> Manifest {
        Manifest {
            tasks: Self::default_tasks(&manifest.tasks, manifest),
            ..manifest.clone()
        }
    }
}

/// Prepends the self-update task when the `update-pipeline` toggle is on
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdatePipelineMapper;

impl Mapper for UpdatePipelineMapper {
    fn name(&self) -> &'static str {
        "update-pipeline"
    }

    fn apply(&self, manifest: &Manifest) -> Manifest {
        let mut updated = manifest.clone();
        if manifest.feature_toggles.update_pipeline() && !manifest.tasks.has_update_task() {
            updated
                .tasks
                .0
                .insert(0, Task::Leaf(LeafTask::Update(Update::default())));
        }
        updated
    }
}

/// The ordered chain of mappers run before rendering
pub struct Defaulter {
    mappers: Vec<Box<dyn Mapper>>,
}

impl Default for Defaulter {
    fn default() -> Self {
        Self::new(vec![
            Box::new(UpdatePipelineMapper),
            Box::new(NotificationsMapper),
        ])
    }
}

impl std::fmt::Debug for Defaulter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Defaulter")
            .field(
                "mappers",
                &self.mappers.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Defaulter {
    /// Build a defaulter running `mappers` in order
    #[must_use]
    pub fn new(mappers: Vec<Box<dyn Mapper>>) -> Self {
        Self { mappers }
    }

    /// Run every mapper over the manifest
    #[tracing::instrument(name = "defaults_apply", skip_all, fields(pipeline = %manifest.pipeline))]
    #[must_use]
    pub fn apply(&self, manifest: &Manifest) -> Manifest {
        let mut current = manifest.clone();
        for mapper in &self.mappers {
            debug!(mapper = mapper.name(), "applying mapper");
            current = mapper.apply(&current);
        }
        current
    }
}
