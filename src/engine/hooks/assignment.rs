//! Workload-based agent selection.

use crate::dispatch::domain::AgentRole;
use crate::engine::domain::{HookError, HookResult};
use crate::engine::hooks::StageServices;
use crate::task::domain::{AgentName, TeamName};
use std::collections::BTreeMap;

/// Returns the agent with `role` holding the fewest open tasks, ties going
/// to the lexically first name. `excluded` is never chosen.
pub(super) async fn least_loaded(
    services: &StageServices,
    team: &TeamName,
    role: AgentRole,
    excluded: Option<&AgentName>,
) -> HookResult<Option<AgentName>> {
    let agents = services
        .agents
        .list(team)
        .await
        .map_err(|err| HookError::action(format!("failed to list agents: {err}")))?;
    let mut load: BTreeMap<AgentName, usize> = agents
        .into_iter()
        .filter(|agent| agent.role() == role && Some(agent.name()) != excluded)
        .map(|agent| (agent.name().clone(), 0))
        .collect();
    if load.is_empty() {
        return Ok(None);
    }

    let open = services
        .tasks
        .list_open(team)
        .await
        .map_err(|err| HookError::action(format!("failed to list open tasks: {err}")))?;
    for assignee in open.iter().filter_map(|task| task.assignee()) {
        if let Some(count) = load.get_mut(assignee) {
            *count = count.saturating_add(1);
        }
    }

    Ok(load
        .into_iter()
        .min_by(|(left_name, left), (right_name, right)| {
            left.cmp(right).then_with(|| left_name.cmp(right_name))
        })
        .map(|(name, _)| name))
}
