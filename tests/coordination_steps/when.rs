//! When steps for coordination BDD scenarios.

use super::world::{CoordinationWorld, run_async};
use crate::test_helpers::stage;
use atelier::engine::domain::TransitionRequest;
use rstest_bdd_macros::when;

#[when(r#"the task is moved to "{target}""#)]
fn task_is_moved(world: &mut CoordinationWorld, target: String) -> Result<(), eyre::Report> {
    let request = TransitionRequest::new(world.task()?.id(), stage(&target)?);
    let result = run_async(world.coordinator.engine.transition(request));
    if let Ok(ref outcome) = result {
        world.task = Some(outcome.task().clone());
    }
    world.last_transition = Some(result);
    Ok(())
}

#[when("the merge stage action runs {times:u32} times")]
fn merge_action_runs(world: &mut CoordinationWorld, times: u32) -> Result<(), eyre::Report> {
    let task_id = world.task()?.id();
    for _ in 0..times {
        run_async(world.coordinator.engine.run_auto_action(task_id))?;
    }
    Ok(())
}
