//! Unit tests for the merge retry policy.

use crate::merge::domain::{MergeDecision, MergeFailure, MergeStep, RetryPolicy};
use crate::task::domain::{NewTask, RepoName, Task, TeamName};
use crate::workflow::domain::{StageKey, WorkflowName, WorkflowRef, WorkflowVersion};
use mockable::DefaultClock;
use rstest::{fixture, rstest};

#[fixture]
fn task() -> Task {
    Task::new(
        NewTask {
            team: TeamName::new("platform").expect("valid team"),
            title: "Merge me".to_owned(),
            description: String::new(),
            workflow: WorkflowRef::new(
                WorkflowName::new("standard").expect("valid workflow"),
                WorkflowVersion::new(1).expect("valid version"),
            ),
            status: StageKey::new("merging").expect("valid stage"),
            repositories: vec![repo()],
            dri: None,
            reviewer: None,
            assignee: None,
        },
        &DefaultClock,
    )
    .expect("task should be created")
}

fn repo() -> RepoName {
    RepoName::new("web").expect("valid repo")
}

#[rstest]
fn retryable_failures_escalate_at_the_cap(mut task: Task) {
    let policy = RetryPolicy::new(3);
    let failure = MergeFailure::retryable(repo(), MergeStep::Rebase, "git rebase timed out");

    assert_eq!(
        policy.on_failure(&mut task, &failure),
        MergeDecision::Retry { attempts: 1 }
    );
    assert_eq!(
        policy.on_failure(&mut task, &failure),
        MergeDecision::Retry { attempts: 2 }
    );
    assert_eq!(
        policy.on_failure(&mut task, &failure),
        MergeDecision::Escalate { attempts: 3 }
    );
    assert_eq!(task.merge_attempts(), 3);
}

#[rstest]
fn permanent_failure_escalates_without_counting(mut task: Task) {
    let policy = RetryPolicy::new(3);
    let failure = MergeFailure::permanent(repo(), MergeStep::Test, "tests failed");

    assert_eq!(
        policy.on_failure(&mut task, &failure),
        MergeDecision::Escalate { attempts: 0 }
    );
    assert_eq!(task.merge_attempts(), 0);
}

#[rstest]
fn single_attempt_policy_escalates_immediately(mut task: Task) {
    let failure = MergeFailure::retryable(repo(), MergeStep::Checkout, "spawn failed");
    assert_eq!(
        RetryPolicy::new(1).on_failure(&mut task, &failure),
        MergeDecision::Escalate { attempts: 1 }
    );
}
