use crate::error::LintError;
use crate::linters::Findings;
use halfpipe_core::manifest::TimerTrigger;

/// A timer needs a five field cron expression
#[must_use]
pub fn lint_timer_trigger(trigger: &TimerTrigger) -> Findings {
    let mut errors = Vec::new();

    let fields = trigger.cron.split_whitespace().count();
    if trigger.cron.trim().is_empty() {
        errors.push(LintError::missing("cron"));
    } else if fields != 5 {
        errors.push(LintError::invalid(
            "cron",
            format!(
                "'{}' has {fields} fields, expected five: minute hour day-of-month month day-of-week",
                trigger.cron
            ),
        ));
    }

    (errors, Vec::new())
}
