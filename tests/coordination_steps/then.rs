//! Then steps for coordination BDD scenarios.

use super::world::{CoordinationWorld, run_async};
use crate::test_helpers::{agent, stage};
use atelier::engine::domain::TransitionError;
use rstest_bdd_macros::then;

#[then(r#"the task is in stage "{expected}""#)]
fn task_in_stage(world: &CoordinationWorld, expected: String) -> Result<(), eyre::Report> {
    let stored = run_async(world.coordinator.reload(world.task()?.id()))?;
    if stored.status() != &stage(&expected)? {
        return Err(eyre::eyre!(
            "expected stage {expected}, found {}",
            stored.status()
        ));
    }
    Ok(())
}

#[then(r#"the task is assigned to "{expected}""#)]
fn task_assigned_to(world: &CoordinationWorld, expected: String) -> Result<(), eyre::Report> {
    let stored = run_async(world.coordinator.reload(world.task()?.id()))?;
    if stored.assignee() != Some(&agent(&expected)?) {
        return Err(eyre::eyre!(
            "expected assignee {expected}, found {:?}",
            stored.assignee()
        ));
    }
    Ok(())
}

#[then(r#"the transition is rejected with "{message}""#)]
fn transition_rejected(world: &CoordinationWorld, message: String) -> Result<(), eyre::Report> {
    let result = world
        .last_transition
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing transition result"))?;
    match result {
        Err(TransitionError::Gate(reason)) if reason.contains(&message) => Ok(()),
        other => Err(eyre::eyre!("expected a gate rejection, got {other:?}")),
    }
}

#[then("the task has {attempts:u32} merge attempts")]
fn task_has_merge_attempts(world: &CoordinationWorld, attempts: u32) -> Result<(), eyre::Report> {
    let stored = run_async(world.coordinator.reload(world.task()?.id()))?;
    if stored.merge_attempts() != attempts {
        return Err(eyre::eyre!(
            "expected {attempts} merge attempts, found {}",
            stored.merge_attempts()
        ));
    }
    Ok(())
}

#[then("exactly {count:u64} notification is recorded")]
fn notifications_recorded(world: &CoordinationWorld, count: u64) -> Result<(), eyre::Report> {
    let sent = u64::try_from(world.coordinator.notification_count()?)?;
    if sent != count {
        return Err(eyre::eyre!("expected {count} notifications, found {sent}"));
    }
    Ok(())
}
