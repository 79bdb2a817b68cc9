//! Given steps for coordination BDD scenarios.

use super::world::{CoordinationWorld, run_async};
use crate::test_helpers::{TEAM, commit_work};
use atelier::merge::adapters::memory::GitOperation;
use atelier::task::services::CreateTaskRequest;
use eyre::WrapErr;
use rstest_bdd_macros::given;

#[given(r#"a task in the "{workflow}" workflow for repository "{repository}""#)]
fn task_in_workflow(
    world: &mut CoordinationWorld,
    workflow: String,
    repository: String,
) -> Result<(), eyre::Report> {
    let request = CreateTaskRequest::new(TEAM, "Add health endpoint", workflow, [repository]);
    let created = run_async(world.coordinator.lifecycle.create(request))
        .wrap_err("create task for scenario")?;
    world.task = Some(created);
    Ok(())
}

#[given(r#"worker "{worker}" already has an open task"#)]
fn worker_has_open_task(world: &mut CoordinationWorld, worker: String) -> Result<(), eyre::Report> {
    let request = CreateTaskRequest::new(
        TEAM,
        "Upgrade dependencies",
        atelier::workflow::services::STANDARD_WORKFLOW,
        ["web".to_owned()],
    )
    .with_assignee(worker);
    run_async(world.coordinator.lifecycle.create(request)).wrap_err("create competing task")?;
    Ok(())
}

#[given(r#"the task has been moved to "{target}""#)]
fn task_has_been_moved(world: &mut CoordinationWorld, target: String) -> Result<(), eyre::Report> {
    let task_id = world.task()?.id();
    let moved = run_async(world.coordinator.move_to(task_id, &target))?;
    world.task = Some(moved);
    Ok(())
}

#[given("the assignee has committed work")]
fn assignee_has_committed(world: &mut CoordinationWorld) -> Result<(), eyre::Report> {
    commit_work(&world.coordinator, &world.git, world.task()?)
}

#[given("the task is ready to merge")]
fn task_ready_to_merge(world: &mut CoordinationWorld) -> Result<(), eyre::Report> {
    let task_id = world.task()?.id();
    let in_progress = run_async(world.coordinator.move_to(task_id, "in_progress"))?;
    commit_work(&world.coordinator, &world.git, &in_progress)?;
    run_async(world.coordinator.move_to(task_id, "in_review"))?;
    let merging = run_async(world.coordinator.move_to(task_id, "merging"))?;
    world.task = Some(merging);
    Ok(())
}

#[given("rebasing fails {times:u32} times")]
fn rebasing_fails(world: &mut CoordinationWorld, times: u32) {
    world.git.fail_next(GitOperation::Rebase, times);
}
