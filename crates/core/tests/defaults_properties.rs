//! Property tests for the defaulting pass.
//!
//! Trees are generated with arbitrary nesting of sequences and parallels,
//! arbitrary author supplied notifications and arbitrary pipeline defaults.

use halfpipe_core::manifest::{
    DeployCf, DockerPush, Notifications, Parallel, Run, Sequence, TaskCommon,
};
use halfpipe_core::{Defaulter, Manifest, Mapper, NotificationsMapper, Task, TaskList};
use proptest::prelude::*;

fn notifications() -> impl Strategy<Value = Option<Notifications>> {
    prop::option::of(
        (
            prop::collection::vec("#[a-z]{1,5}", 0..3),
            prop::collection::vec("#[a-z]{1,5}", 0..3),
            prop_oneof![Just(String::new()), "[a-z ]{1,10}"],
        )
            .prop_map(|(on_success, on_failure, on_failure_message)| Notifications {
                on_success,
                on_failure,
                on_failure_message,
                ..Notifications::default()
            }),
    )
}

fn leaf() -> impl Strategy<Value = Task> {
    (notifications(), any::<bool>(), 0..3u8).prop_map(|(notifications, notify_on_success, kind)| {
        let common = TaskCommon {
            notifications,
            notify_on_success,
            ..TaskCommon::default()
        };
        match kind {
            0 => Run { common, ..Run::default() }.into(),
            1 => DockerPush { common, ..DockerPush::default() }.into(),
            _ => DeployCf { common, ..DeployCf::default() }.into(),
        }
    })
}

fn task() -> impl Strategy<Value = Task> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4)
                .prop_map(|tasks| Task::Parallel(Parallel { tasks: tasks.into() })),
            prop::collection::vec(inner, 0..4)
                .prop_map(|tasks| Task::Sequence(Sequence { tasks: tasks.into() })),
        ]
    })
}

fn manifest() -> impl Strategy<Value = Manifest> {
    (
        prop_oneof![Just(String::new()), "#[a-z]{1,8}"],
        prop_oneof![Just(String::new()), "[a-z ]{1,10}"],
        prop_oneof![Just(String::new()), "[a-z ]{1,10}"],
        prop::collection::vec(task(), 0..5),
    )
        .prop_map(|(slack_channel, slack_success_message, slack_failure_message, tasks)| {
            Manifest {
                team: "team".to_string(),
                pipeline: "pipeline".to_string(),
                slack_channel,
                slack_success_message,
                slack_failure_message,
                tasks: TaskList::from(tasks),
                ..Manifest::default()
            }
        })
}

proptest! {
    #[test]
    fn notifications_mapper_is_idempotent(man in manifest()) {
        let once = NotificationsMapper.apply(&man);
        let twice = NotificationsMapper.apply(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn defaulter_is_idempotent(man in manifest()) {
        let defaulter = Defaulter::default();
        let once = defaulter.apply(&man);
        prop_assert_eq!(defaulter.apply(&once), once);
    }

    #[test]
    fn defaulting_never_mutates_input(man in manifest()) {
        let snapshot = man.clone();
        let _ = Defaulter::default().apply(&man);
        prop_assert_eq!(man, snapshot);
    }

    #[test]
    fn author_channels_survive(man in manifest()) {
        let updated = NotificationsMapper.apply(&man);
        let before = man.tasks.flatten();
        let after = updated.tasks.flatten();
        prop_assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            if let Some(authored) = b.notifications() {
                let defaulted = a.notifications().cloned().unwrap_or_default();
                prop_assert_eq!(&authored.on_success, &defaulted.on_success);
                prop_assert_eq!(&authored.on_failure, &defaulted.on_failure);
            }
        }
    }
}
